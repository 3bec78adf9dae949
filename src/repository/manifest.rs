//! RPKI Manifests.
//!
//! Manifests list all the files that are currently published by an RPKI CA.
//! They are defined in RFC 9286.
//!
//! This module defines the type [`Manifest`] that represents a decoded
//! manifest together with its EE certificate, the entries of its file list
//! in [`FileAndHash`], and the function [`mft_compare`] that picks the more
//! recent of two manifests.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use bcder::decode;
use bcder::{BitString, Mode, OctetString, Tag};
use bcder::decode::{DecodeError, Source};
use bytes::Bytes;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use crate::oid;
use crate::crypto::DigestAlgorithm;
use crate::error::{ObjectError, ParseError, Stale};
use crate::util::hex;
use super::cert::Cert;
use super::object::ObjectType;
use super::sigobj::SignedObject;
use super::x509::Time;


//------------ Manifest ------------------------------------------------------

/// A decoded RPKI manifest.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Manifest {
    /// The manifest number as an upper case hex string.
    ///
    /// These numbers are similar to the serial numbers of certificates.
    number: String,

    /// The time this iteration of the manifest was created.
    this_update: Time,

    /// The time the next iteration of the manifest is likely to be created.
    next_update: Time,

    /// The list of files.
    files: Vec<FileAndHash>,

    /// The EE certificate of the manifest.
    ee: Cert,
}

impl Manifest {
    /// Decodes and checks a manifest file.
    ///
    /// If `digest` is given, the SHA-256 digest of the whole file has to
    /// match it.
    pub fn decode(
        data: &[u8], digest: Option<&[u8]>
    ) -> Result<Self, ObjectError> {
        let (content, ee) = SignedObject::decode_checked(
            data, oid::CT_RPKI_MANIFEST, digest
        )?.into_parts();
        Ok(Self::decode_content(content.as_ref(), ee)?)
    }

    /// Decodes the content of a manifest.
    ///
    /// ```txt
    /// Manifest ::= SEQUENCE {
    ///     version     [0] INTEGER DEFAULT 0,
    ///     manifestNumber  INTEGER (0..MAX),
    ///     thisUpdate      GeneralizedTime,
    ///     nextUpdate      GeneralizedTime,
    ///     fileHashAlg     OBJECT IDENTIFIER,
    ///     fileList        SEQUENCE SIZE (0..MAX) OF FileAndHash
    /// }
    /// ```
    pub fn decode_content(
        content: &[u8], ee: Cert
    ) -> Result<Self, ParseError> {
        let (number, this_update, next_update, files) = {
            Mode::Der.decode(content, |cons| {
                cons.take_sequence(|cons| {
                    cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
                        cons.skip_u8_if(0)
                    })?;
                    let number = take_manifest_number(cons)?;
                    let this_update = Time::take_from(cons)?;
                    let next_update = Time::take_from(cons)?;
                    if this_update >= next_update {
                        return Err(cons.content_err(
                            "manifest thisUpdate not before nextUpdate"
                        ))
                    }
                    DigestAlgorithm::take_oid_from(cons)?;
                    let files = cons.take_sequence(|cons| {
                        let mut files = Vec::new();
                        while let Some(item) = FileAndHash::take_opt_from(
                            cons
                        )? {
                            files.push(item);
                        }
                        Ok(files)
                    })?;
                    Ok((number, this_update, next_update, files))
                })
            })?
        };
        let res = Manifest { number, this_update, next_update, files, ee };
        res.check_files()?;
        Ok(res)
    }

    /// Checks the file list for duplicates and the CRL entry.
    fn check_files(&self) -> Result<(), ParseError> {
        let mut names = HashSet::with_capacity(self.files.len());
        let mut crls = 0;
        for item in &self.files {
            if !names.insert(item.file.as_str()) {
                return Err(ParseError::new(
                    decode::ContentError::from_static(
                        "duplicate file in manifest"
                    )
                ))
            }
            if item.kind == Some(ObjectType::Crl) {
                crls += 1;
            }
        }
        if crls != 1 {
            return Err(ParseError::new(
                decode::ContentError::from_static(
                    "manifest must list exactly one CRL"
                )
            ))
        }
        Ok(())
    }
}

/// # Data Access
///
impl Manifest {
    /// Returns the manifest number as an upper case hex string.
    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn this_update(&self) -> Time {
        self.this_update
    }

    pub fn next_update(&self) -> Time {
        self.next_update
    }

    /// Returns the list of files.
    pub fn files(&self) -> &[FileAndHash] {
        &self.files
    }

    /// Returns the entry for the CRL of the manifest’s CA.
    pub fn crl(&self) -> Option<&FileAndHash> {
        self.files.iter().find(|item| item.kind == Some(ObjectType::Crl))
    }

    /// Returns the EE certificate.
    pub fn ee(&self) -> &Cert {
        &self.ee
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns whether the manifest is outside its validity window.
    pub fn is_stale(&self, now: Time) -> bool {
        now < self.this_update || now > self.next_update
    }

    /// Returns an error if the manifest is stale at `now`.
    pub fn check_stale(&self, now: Time) -> Result<(), Stale> {
        if self.is_stale(now) {
            Err(Stale)
        }
        else {
            Ok(())
        }
    }
}


//------------ mft_compare ---------------------------------------------------

/// Compares two manifest candidates.
///
/// Returns [`Ordering::Greater`] if `a` is to be preferred over `b`. A
/// present manifest always beats a missing one. Otherwise, the manifest
/// with the larger manifest number wins.
pub fn mft_compare(a: Option<&Manifest>, b: Option<&Manifest>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(a), Some(b)) => compare_numbers(&a.number, &b.number),
    }
}

/// Compares two manifest numbers given as hex strings.
///
/// Since the numbers never have leading zeros, a longer string is a
/// larger number. Strings of equal length compare lexicographically.
pub fn compare_numbers(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}


//------------ FileAndHash ---------------------------------------------------

/// An entry in the list of a manifest.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FileAndHash {
    /// The name of the file.
    file: String,

    /// A SHA256 hash over the file’s content.
    hash: ManifestHash,

    /// The object type inferred from the file name.
    ///
    /// This is `None` for files with an unknown extension.
    #[serde(default)]
    kind: Option<ObjectType>,
}

impl FileAndHash {
    /// Creates a new entry, inferring the type from the file name.
    pub fn new(file: String, hash: ManifestHash) -> Self {
        let kind = ObjectType::from_file_name(&file);
        FileAndHash { file, hash, kind }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn hash(&self) -> &ManifestHash {
        &self.hash
    }

    pub fn kind(&self) -> Option<ObjectType> {
        self.kind
    }

    /// Takes an optional value from the beginning of a constructed value.
    ///
    /// ```txt
    /// FileAndHash ::= SEQUENCE {
    ///     file  IA5String,
    ///     hash  BIT STRING
    /// }
    /// ```
    fn take_opt_from<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let file = cons.take_value_if(
                Tag::IA5_STRING,
                OctetString::from_content
            )?.to_bytes();
            let file = match check_file_name(&file) {
                Some(file) => file,
                None => {
                    return Err(cons.content_err(
                        "invalid file name in manifest"
                    ))
                }
            };
            let hash = BitString::take_from(cons)?;
            if hash.unused() != 0 {
                return Err(cons.content_err("invalid manifest hash"))
            }
            let hash = match ManifestHash::try_from(
                hash.octet_bytes().as_ref()
            ) {
                Ok(hash) => hash,
                Err(_) => {
                    return Err(cons.content_err("invalid manifest hash"))
                }
            };
            Ok(FileAndHash::new(file, hash))
        })
    }
}


//------------ ManifestHash --------------------------------------------------

/// A manifest hash.
///
/// This is a SHA256 hash.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct ManifestHash([u8; 32]);

impl ManifestHash {
    /// Check that `data` has the hash value of `self`.
    pub fn verify(&self, data: &[u8]) -> Result<(), ObjectError> {
        crate::crypto::verify_sha256(data, &self.0).map_err(Into::into)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<[u8; 32]> for ManifestHash {
    fn from(src: [u8; 32]) -> Self {
        ManifestHash(src)
    }
}

impl<'a> TryFrom<&'a [u8]> for ManifestHash {
    type Error = std::array::TryFromSliceError;

    fn try_from(src: &'a [u8]) -> Result<Self, Self::Error> {
        <[u8; 32]>::try_from(src).map(ManifestHash)
    }
}

impl AsRef<[u8]> for ManifestHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Display for ManifestHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [0u8; 64];
        f.write_str(hex::encode(&self.0, &mut buf))
    }
}

impl fmt::Debug for ManifestHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ManifestHash({})", self)
    }
}

impl Serialize for ManifestHash {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ManifestHash {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let octets = hex::decode(&s).ok_or_else(|| {
            de::Error::custom("invalid manifest hash")
        })?;
        ManifestHash::try_from(octets.as_slice()).map_err(|_| {
            de::Error::custom("manifest hash must be 32 octets")
        })
    }
}


//------------ Helper Functions ----------------------------------------------

/// Takes the manifest number and converts it into a hex string.
///
/// The number must not be negative, must fit into 20 octets, and must not
/// have redundant leading zero octets.
fn take_manifest_number<S: Source>(
    cons: &mut decode::Constructed<S>
) -> Result<String, DecodeError<S::Error>> {
    let bytes: Bytes = cons.take_primitive_if(Tag::INTEGER, |prim| {
        prim.take_all()
    })?;
    let octets = match bytes.as_ref() {
        [] => {
            return Err(cons.content_err("empty manifest number"))
        }
        [first, ..] if first & 0x80 != 0 => {
            return Err(cons.content_err("negative manifest number"))
        }
        [0] => &bytes[..],
        [0, second, ..] if second & 0x80 != 0 => &bytes[1..],
        [0, ..] => {
            return Err(cons.content_err(
                "manifest number with leading zero octets"
            ))
        }
        _ => &bytes[..],
    };
    if octets.len() > 20 {
        return Err(cons.content_err("manifest number too large"))
    }
    let mut res = String::with_capacity(octets.len() * 2);
    for octet in octets {
        res.push_str(&format!("{:02X}", octet));
    }
    Ok(res)
}

/// Checks that a file name is a plain name and converts it into a string.
fn check_file_name(name: &[u8]) -> Option<String> {
    if name.is_empty() || name[0] == b'.' {
        return None
    }
    if !name.iter().all(|&ch| ch.is_ascii_graphic() && ch != b'/') {
        return None
    }
    String::from_utf8(name.to_vec()).ok()
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bcder::encode;
    use bcder::encode::PrimitiveContent;
    use chrono::TimeDelta;
    use crate::repository::test::cert::{generalized_time, DerData, TestKey};
    use crate::repository::test::cms::ee_cert;

    fn ee() -> Cert {
        Cert::decode(
            ee_cert(&TestKey::rsa(1), &TestKey::rsa(2)).as_ref()
        ).unwrap()
    }

    fn file(name: &'static str, hash: u8) -> DerData {
        DerData::encode(encode::sequence((
            OctetString::new(
                Bytes::from_static(name.as_bytes())
            ).encode_as(Tag::IA5_STRING),
            BitString::new(0, Bytes::from(vec![hash; 32])).encode(),
        )))
    }

    fn content(
        number: &'static [u8], this_update: Time, next_update: Time,
        files: &[DerData]
    ) -> DerData {
        DerData::encode(encode::sequence((
            DerData::raw(number),
            generalized_time(this_update),
            generalized_time(next_update),
            oid::SHA256.encode(),
            DerData::sequence(files),
        )))
    }

    fn current(number: &'static [u8], files: &[DerData]) -> DerData {
        let now = Time::now();
        content(
            number, now - TimeDelta::hours(1), now + TimeDelta::hours(23),
            files
        )
    }

    fn decode(der: DerData) -> Result<Manifest, ParseError> {
        Manifest::decode_content(der.as_ref(), ee())
    }

    fn manifest(number: &'static [u8]) -> Manifest {
        decode(current(number, &[file("ca.crl", 1)])).unwrap()
    }

    #[test]
    fn decode_manifest() {
        let mft = decode(current(
            b"\x02\x02\x01\x0a",
            &[file("ca.crl", 1), file("a.roa", 2), file("b.cer", 3),
              file("README", 4)]
        )).unwrap();
        assert_eq!(mft.number(), "010A");
        assert_eq!(mft.len(), 4);
        assert_eq!(mft.crl().unwrap().file(), "ca.crl");
        assert_eq!(mft.files()[1].kind(), Some(ObjectType::Roa));
        assert_eq!(mft.files()[3].kind(), None);
        assert_eq!(mft.files()[2].hash().as_slice(), &[3u8; 32]);
        assert!(!mft.is_stale(Time::now()));
    }

    #[test]
    fn manifest_number_rendering() {
        assert_eq!(manifest(b"\x02\x01\x00").number(), "00");
        assert_eq!(manifest(b"\x02\x02\x00\xff").number(), "FF");
        assert!(decode(current(b"\x02\x02\x00\x01", &[file("ca.crl", 1)]))
            .is_err());
        assert!(decode(current(b"\x02\x01\x80", &[file("ca.crl", 1)]))
            .is_err());
        assert!(decode(current(
            b"\x02\x15\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\
              \x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b",
            &[file("ca.crl", 1)]
        )).is_err());
    }

    #[test]
    fn reject_bad_file_lists() {
        assert!(decode(current(b"\x02\x01\x01", &[])).is_err());
        assert!(decode(current(
            b"\x02\x01\x01", &[file("ca.crl", 1), file("other.crl", 2)]
        )).is_err());
        assert!(decode(current(
            b"\x02\x01\x01", &[file("ca.crl", 1), file("ca.crl", 2)]
        )).is_err());
        assert!(decode(current(
            b"\x02\x01\x01", &[file("ca.crl", 1), file("../a.roa", 2)]
        )).is_err());
        assert!(decode(current(
            b"\x02\x01\x01", &[file("ca.crl", 1), file(".a.roa", 2)]
        )).is_err());
    }

    #[test]
    fn reject_inverted_window() {
        let now = Time::now();
        assert!(decode(content(
            b"\x02\x01\x01", now, now - TimeDelta::hours(1),
            &[file("ca.crl", 1)]
        )).is_err());
    }

    #[test]
    fn stale_window() {
        let now = Time::now();
        let mft = decode(content(
            b"\x02\x01\x01", now - TimeDelta::days(2),
            now - TimeDelta::days(1), &[file("ca.crl", 1)]
        )).unwrap();
        assert!(mft.is_stale(now));
        assert!(mft.check_stale(now).is_err());
        assert!(!mft.is_stale(now - TimeDelta::hours(36)));
        assert!(mft.is_stale(now - TimeDelta::days(3)));
    }

    #[test]
    fn compare_manifests() {
        let short = manifest(b"\x02\x01\x7f");
        let long = manifest(b"\x02\x02\x01\x00");
        let other = manifest(b"\x02\x02\x01\x01");
        assert_eq!(mft_compare(Some(&long), Some(&short)), Ordering::Greater);
        assert_eq!(mft_compare(Some(&short), Some(&long)), Ordering::Less);
        assert_eq!(mft_compare(Some(&other), Some(&long)), Ordering::Greater);
        assert_eq!(mft_compare(Some(&long), Some(&long)), Ordering::Equal);
        assert_eq!(mft_compare(Some(&short), None), Ordering::Greater);
        assert_eq!(mft_compare(None, Some(&short)), Ordering::Less);
        assert_eq!(mft_compare(None, None), Ordering::Equal);
        assert_eq!(compare_numbers("0A", "09"), Ordering::Greater);
        assert_eq!(compare_numbers("FF", "0100"), Ordering::Less);
    }

    #[test]
    fn hash_verification() {
        let data = b"some file";
        let digest = DigestAlgorithm::default().digest(data);
        let hash = ManifestHash::try_from(digest.as_ref()).unwrap();
        assert!(hash.verify(data).is_ok());
        assert!(hash.verify(b"other file").unwrap_err().is_digest());

        let json = serde_json::to_string(&hash).unwrap();
        let back: ManifestHash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, back);
    }
}
