//! Types common to all things X.509.

use std::{fmt, ops, str};
use std::str::FromStr;
use bcder::decode;
use bcder::{BitString, Tag, Unsigned};
use bcder::decode::{ContentError, DecodeError, Source};
use bytes::Bytes;
use chrono::{DateTime, LocalResult, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::crypto::{
    PublicKey, RpkiSignatureAlgorithm, SignatureVerificationError,
};
use crate::util::hex;


//------------ Functions -----------------------------------------------------

/// Updates an optional value the first time.
///
/// Always runs `op` but only assigns its result to `opt` if that doesn’t hold
/// a value yet.
pub fn update_first<F, T, E>(opt: &mut Option<T>, op: F) -> Result<(), E>
where F: FnOnce() -> Result<Option<T>, E> {
    if let Some(value) = op()? {
        if opt.is_none() {
            *opt = Some(value);
        }
    }
    Ok(())
}


//------------ Serial --------------------------------------------------------

/// A certificate serial number.
//
//  We keep the serial number in 20 octets left padded.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Serial([u8; 20]);

impl Serial {
    /// Creates a serial number from an octet slice.
    pub fn from_slice(s: &[u8]) -> Result<Self, ContentError> {
        // A leading zero octet is only there to keep the value positive.
        let s = match s.split_first() {
            Some((0, rest)) if !rest.is_empty() => rest,
            Some(_) => s,
            None => {
                return Err(ContentError::from_static("empty serial number"))
            }
        };
        if s.len() > 20 {
            return Err(ContentError::from_static("serial number too long"))
        }
        let mut res = <[u8; 20]>::default();
        res[20 - s.len()..].copy_from_slice(s);
        Ok(Serial(res))
    }

    /// Converts the serial number into a bytes array.
    pub fn into_array(self) -> [u8; 20] {
        self.0
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let value = Unsigned::take_from(cons)?;
        Self::from_slice(value.as_ref()).map_err(|err| cons.content_err(err))
    }

    /// Returns the octets without left padding.
    fn significant(&self) -> &[u8] {
        let start = self.0.iter().position(|&ch| ch != 0).unwrap_or(19);
        &self.0[start..]
    }
}


//--- From and FromStr

impl From<u64> for Serial {
    fn from(value: u64) -> Self {
        let mut res = <[u8; 20]>::default();
        res[12..].copy_from_slice(&value.to_be_bytes());
        Serial(res)
    }
}

impl FromStr for Serial {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets = if s.len() % 2 == 1 {
            hex::decode(&format!("0{}", s))
        }
        else {
            hex::decode(s)
        };
        match octets {
            Some(octets) => Self::from_slice(&octets),
            None => Err(ContentError::from_static("invalid serial number"))
        }
    }
}


//--- Display and Debug

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [0u8; 40];
        f.write_str(hex::encode(self.significant(), &mut buf))
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Serial({})", self)
    }
}


//--- Deserialize and Serialize

impl Serialize for Serial {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Serial {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Serial::from_str(&s).map_err(serde::de::Error::custom)
    }
}


//------------ SignedData ----------------------------------------------------

/// The signed part of a certificate or CRL.
///
/// ```txt
/// SignedData ::= SEQUENCE {
///     tbsData              ANY,
///     signatureAlgorithm   AlgorithmIdentifier,
///     signatureValue       BIT STRING }
/// ```
///
/// Only the raw DER of the signed data and the signature value are kept.
/// Both are needed to verify the signature later with the issuer’s key.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SignedData {
    data: Bytes,

    #[serde(skip)]
    algorithm: RpkiSignatureAlgorithm,

    signature: Bytes,
}

impl SignedData {
    pub fn new(data: Bytes, signature: Bytes) -> Self {
        SignedData {
            data, algorithm: Default::default(), signature
        }
    }

    /// Returns the DER encoding of the signed data.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    /// Parses the content of a signed data sequence.
    pub fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let data = cons.capture_one()?.into_bytes();
        let algorithm = RpkiSignatureAlgorithm::x509_take_from(cons)?;
        let signature = BitString::take_from(cons)?;
        if signature.unused() != 0 {
            return Err(cons.content_err("signature with unused bits"))
        }
        Ok(SignedData {
            data,
            algorithm,
            signature: signature.octet_bytes(),
        })
    }

    pub fn verify_signature(
        &self,
        public_key: &PublicKey
    ) -> Result<(), SignatureVerificationError> {
        public_key.verify(self.data.as_ref(), self.signature.as_ref())
    }
}


//------------ Time ----------------------------------------------------------

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
#[serde(transparent)]
pub struct Time(DateTime<Utc>);

impl Time {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Creates a time value from its components in UTC.
    ///
    /// Returns `None` if the components don’t describe a valid time.
    pub fn utc(
        year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32
    ) -> Option<Self> {
        match Utc.with_ymd_and_hms(year, month, day, hour, min, sec) {
            LocalResult::Single(dt) => Some(Time(dt)),
            _ => None
        }
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive(|tag, prim| {
            match tag {
                Tag::UTC_TIME => Self::utc_from_primitive(prim),
                Tag::GENERALIZED_TIME => {
                    Self::generalized_from_primitive(prim)
                }
                _ => Err(prim.content_err("malformed time value"))
            }
        })
    }

    /// Takes an optional time value.
    ///
    /// Used for the optional `nextUpdate` of CRLs.
    pub fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let res = cons.take_opt_primitive_if(
            Tag::UTC_TIME, Self::utc_from_primitive
        )?;
        if res.is_some() {
            return Ok(res)
        }
        cons.take_opt_primitive_if(
            Tag::GENERALIZED_TIME, Self::generalized_from_primitive
        )
    }

    fn utc_from_primitive<S: decode::Source>(
        prim: &mut decode::Primitive<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        // RFC 5280 requires the format YYMMDDHHMMSSZ
        let year = read_two_char(prim)? as i32;
        let year = if year >= 50 { year + 1900 } else { year + 2000 };
        Self::from_primitive_rest(year, prim)
    }

    fn generalized_from_primitive<S: decode::Source>(
        prim: &mut decode::Primitive<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        // RFC 5280 requires the format YYYYMMDDHHMMSSZ
        let year = read_four_char(prim)? as i32;
        Self::from_primitive_rest(year, prim)
    }

    fn from_primitive_rest<S: decode::Source>(
        year: i32,
        prim: &mut decode::Primitive<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let month = read_two_char(prim)?;
        let day = read_two_char(prim)?;
        let hour = read_two_char(prim)?;
        let min = read_two_char(prim)?;
        let sec = read_two_char(prim)?;
        if prim.take_u8()? != b'Z' {
            return Err(prim.content_err("malformed time value"))
        }
        Self::utc(year, month, day, hour, min, sec).ok_or_else(|| {
            prim.content_err("malformed time value")
        })
    }
}


//--- Deref and AsRef

impl ops::Deref for Time {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<DateTime<Utc>> for Time {
    fn as_ref(&self) -> &DateTime<Utc> {
        &self.0
    }
}


//--- From

impl From<DateTime<Utc>> for Time {
    fn from(time: DateTime<Utc>) -> Self {
        Time(time)
    }
}

impl From<Time> for DateTime<Utc> {
    fn from(time: Time) -> Self {
        time.0
    }
}


//--- Add and Sub

impl ops::Add<TimeDelta> for Time {
    type Output = Self;

    fn add(self, duration: TimeDelta) -> Self::Output {
        Self::new(self.0 + duration)
    }
}

impl ops::Sub<TimeDelta> for Time {
    type Output = Self;

    fn sub(self, duration: TimeDelta) -> Self::Output {
        Self::new(self.0 - duration)
    }
}


//--- Display

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}


fn read_two_char<S: decode::Source>(
    source: &mut S
) -> Result<u32, DecodeError<S::Error>> {
    let mut s = [0u8; 2];
    s[0] = source.take_u8()?;
    s[1] = source.take_u8()?;
    parse_digits(source, &s)
}

fn read_four_char<S: decode::Source>(
    source: &mut S
) -> Result<u32, DecodeError<S::Error>> {
    let mut s = [0u8; 4];
    for ch in &mut s {
        *ch = source.take_u8()?;
    }
    parse_digits(source, &s)
}

fn parse_digits<S: decode::Source>(
    source: &S, s: &[u8]
) -> Result<u32, DecodeError<S::Error>> {
    if !s.iter().all(u8::is_ascii_digit) {
        return Err(source.content_err("malformed time value"))
    }
    str::from_utf8(s).ok().and_then(|s| u32::from_str(s).ok()).ok_or_else(|| {
        source.content_err("malformed time value")
    })
}


//------------ Validity ------------------------------------------------------

/// The validity period of a certificate.
///
/// ```txt
/// Validity ::= SEQUENCE {
///      notBefore      Time,
///      notAfter       Time  }
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Validity {
    not_before: Time,
    not_after: Time,
}

impl Validity {
    pub fn new(not_before: Time, not_after: Time) -> Self {
        Validity { not_before, not_after }
    }

    pub fn not_before(&self) -> Time {
        self.not_before
    }

    pub fn not_after(&self) -> Time {
        self.not_after
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let res = Validity::new(
                Time::take_from(cons)?,
                Time::take_from(cons)?,
            );
            if res.not_before > res.not_after {
                return Err(cons.content_err("inverted validity period"))
            }
            Ok(res)
        })
    }

    /// Returns whether `now` lies within the validity period.
    pub fn is_current(&self, now: Time) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}


//============ Tests =========================================================
