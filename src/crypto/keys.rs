//! Types and parameters of keys.

use std::{error, fmt, str};
use std::convert::TryFrom;
use std::str::FromStr;
use bcder::decode;
use bcder::{BitString, Mode, OctetString, Oid, Tag};
use bcder::decode::DecodeError;
use bytes::Bytes;
use ring::signature;
use ring::error::Unspecified;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::oid;
use crate::util::hex;
use super::digest::sha1_digest;


//------------ PublicKeyFormat -----------------------------------------------

/// The formats of public keys used by RPKI.
///
/// The public key formats are currently defined in section 3 of [RFC 7935]
/// for resource certificates and section 3 of [RFC 8608] for BGPsec router
/// certifcates. A variant is defined for each algorithm described in these
/// documents.
///
/// [RFC 7935]: https://tools.ietf.org/html/rfc7935
/// [RFC 8608]: https://tools.ietf.org/html/rfc8608
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PublicKeyFormat {
    /// An RSA public key.
    ///
    /// These keys must be used by all RPKI resource certificates.
    #[default]
    Rsa,

    /// An ECDSA public key for the P-256 elliptic curve.
    ///
    /// These keys must be used by all BGPsec router certificates.
    EcdsaP256,
}

impl PublicKeyFormat {
    /// Returns whether the format is acceptable for RPKI-internal certificates.
    pub fn allow_rpki_cert(self) -> bool {
        matches!(self, PublicKeyFormat::Rsa)
    }

    /// Returns whether the format is acceptable for router certificates.
    pub fn allow_router_cert(self) -> bool {
        matches!(self, PublicKeyFormat::EcdsaP256)
    }
}


/// # ASN.1 Algorithm Identifiers
///
/// The format of the public key is identified in certificates through a
/// algorithm identifier defined with this ASN.1:
///
/// ```txt
/// AlgorithmIdentifier ::= SEQUENCE {
///      algorithm          OBJECT IDENTIFIER,
///      parameters         ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// For RSA keys, the object identifier needs to be that of `rsaEncryption`
/// defined by [RFC 4055] and the parameters must be present and NULL.
/// When parsing, we generously also allow it to be absent altogether.
///
/// For ECDSA keys, the object identifer needs to be `ecPublicKey` defined
/// in [RFC 5480] with the parameter being the object identifier `secp256r1`
/// defined in the same RFC.
///
/// [RFC 4055]: https://tools.ietf.org/html/rfc4055
/// [RFC 5480]: https://tools.ietf.org/html/rfc5480
impl PublicKeyFormat {
    /// Takes and returns a algorithm identifier.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    /// Parses the algorithm identifier from the contents of its sequence.
    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let alg = Oid::take_from(cons)?;
        if alg == oid::RSA_ENCRYPTION {
            cons.take_opt_null()?;
            Ok(PublicKeyFormat::Rsa)
        }
        else if alg == oid::EC_PUBLIC_KEY {
            oid::SECP256R1.skip_if(cons)?;
            Ok(PublicKeyFormat::EcdsaP256)
        }
        else {
            Err(cons.content_err("invalid public key algorithm"))
        }
    }
}


//------------ PublicKey -----------------------------------------------------

/// A public key.
///
/// Besides the algorithm and the key bits, the value keeps the complete
/// DER encoding of the *subjectPublicKeyInfo* it was decoded from. This is
/// what trust anchor locators publish and what is compared against them.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PublicKey {
    algorithm: PublicKeyFormat,
    bits: Bytes,
    info: Bytes,
}

impl PublicKey {
    /// Creates a public key from its parts.
    pub fn new(algorithm: PublicKeyFormat, bits: Bytes, info: Bytes) -> Self {
        PublicKey { algorithm, bits, info }
    }

    /// Returns the algorithm of this public key.
    pub fn algorithm(&self) -> PublicKeyFormat {
        self.algorithm
    }

    /// Returns the bits of this public key.
    pub fn bits(&self) -> &[u8] {
        self.bits.as_ref()
    }

    /// Returns the encoded *subjectPublicKeyInfo*.
    pub fn info(&self) -> &[u8] {
        self.info.as_ref()
    }

    /// Returns whether the key is acceptable for RPKI-internal certificates.
    pub fn allow_rpki_cert(&self) -> bool {
        self.algorithm.allow_rpki_cert()
    }

    /// Returns whether the key is acceptable for BGPsec router certificates.
    pub fn allow_router_cert(&self) -> bool {
        self.algorithm.allow_router_cert()
    }

    /// Returns a key identifier for this key.
    ///
    /// The identifier will be the SHA-1 hash of the key’s bits.
    pub fn key_identifier(&self) -> KeyIdentifier {
        let digest = sha1_digest(self.bits());
        let mut res = [0u8; 20];
        res.copy_from_slice(digest.as_ref());
        KeyIdentifier(res)
    }

    /// Verifies a signature using this public key.
    pub fn verify(
        &self, message: &[u8], signature: &[u8]
    ) -> Result<(), SignatureVerificationError> {
        match self.algorithm {
            PublicKeyFormat::Rsa => {
                signature::UnparsedPublicKey::new(
                    &signature::RSA_PKCS1_2048_8192_SHA256, self.bits()
                ).verify(message, signature)?
            }
            PublicKeyFormat::EcdsaP256 => {
                signature::UnparsedPublicKey::new(
                    &signature::ECDSA_P256_SHA256_ASN1, self.bits()
                ).verify(message, signature)?
            }
        }
        Ok(())
    }
}


/// # As `SubjectPublicKeyInfo`
///
/// Public keys are included in X.509 certificates as `SubjectPublicKeyInfo`
/// structures:
///
/// ```txt
/// SubjectPublicKeyInfo  ::=  SEQUENCE  {
///      algorithm            AlgorithmIdentifier,
///      subjectPublicKey     BIT STRING  }
/// ```
impl PublicKey {
    /// Decodes a public key from an encoded *subjectPublicKeyInfo*.
    pub fn decode<S: decode::IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as decode::Source>::Error>> {
        Mode::Der.decode(source, Self::take_from)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let info = cons.capture_one()?;
        let (algorithm, bits) = Mode::Der.decode(info.as_slice(), |cons| {
            cons.take_sequence(|cons| {
                let algorithm = PublicKeyFormat::take_from(cons)?;
                let bits = BitString::take_from(cons)?;
                if bits.unused() != 0 {
                    return Err(cons.content_err(
                        "public key with unused bits"
                    ))
                }
                Ok((algorithm, bits.octet_bytes()))
            })
        }).map_err(DecodeError::convert)?;
        Ok(PublicKey {
            algorithm,
            bits,
            info: info.into_bytes(),
        })
    }
}


//------------ KeyIdentifier -------------------------------------------------

/// A key identifier.
///
/// This is the SHA-1 hash over the public key’s bits.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct KeyIdentifier([u8; 20]);

impl KeyIdentifier {
    /// Returns an octet slice of the key identifer’s value.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Returns a octet array with the hex representation of the identifier.
    pub fn into_hex(self) -> [u8; 40] {
        let mut res = [0u8; 40];
        hex::encode(self.as_slice(), &mut res);
        res
    }

    /// Takes an encoded key identifier from a constructed value.
    ///
    /// ```text
    /// KeyIdentifier ::= OCTET STRING
    /// ```
    ///
    /// The content of the octet string needs to be a SHA-1 hash, so it must
    /// be exactly 20 octets long.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_value_if(Tag::OCTET_STRING, Self::from_content)
    }

    /// Parses an encoded key identifer from a encoded content.
    pub fn from_content<S: decode::Source>(
        content: &mut decode::Content<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let octets = OctetString::from_content(content)?;
        match octets.as_slice() {
            Some(slice) => {
                Self::try_from(slice).map_err(|err| content.content_err(err))
            }
            None => {
                // Constructed encoding isn’t allowed in DER anyway.
                Err(content.content_err("invalid key identifier"))
            }
        }
    }
}


//--- TryFrom and FromStr

impl<'a> TryFrom<&'a [u8]> for KeyIdentifier {
    type Error = KeyIdentifierError;

    fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
        <[u8; 20]>::try_from(value)
            .map(KeyIdentifier)
            .map_err(|_| KeyIdentifierError)
    }
}

impl From<[u8; 20]> for KeyIdentifier {
    fn from(src: [u8; 20]) -> Self {
        KeyIdentifier(src)
    }
}

impl FromStr for KeyIdentifier {
    type Err = KeyIdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.len() != 40 {
            return Err(KeyIdentifierError)
        }
        let octets = hex::decode(value).ok_or(KeyIdentifierError)?;
        Self::try_from(octets.as_slice())
    }
}


//--- AsRef

impl AsRef<[u8]> for KeyIdentifier {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}


//--- Display and Debug

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [0u8; 40];
        f.write_str(hex::encode(self.as_slice(), &mut buf))
    }
}

impl fmt::Debug for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyIdentifier({})", self)
    }
}


//--- Deserialize and Serialize

impl Serialize for KeyIdentifier {
    fn serialize<S: Serializer>(
        &self,
        serializer: S
    ) -> Result<S::Ok, S::Error> {
        let mut buf = [0u8; 40];
        hex::encode(self.as_slice(), &mut buf).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KeyIdentifier {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        deserializer.deserialize_str(KeyIdentifierVisitor)
    }
}


//------------ KeyIdentifierVisitor -----------------------------------------

/// Private helper type for implementing deserialization of KeyIdentifier.
struct KeyIdentifierVisitor;

impl<'de> de::Visitor<'de> for KeyIdentifierVisitor {
    type Value = KeyIdentifier;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a string containing a key identifier as hex digits")
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where E: de::Error {
        KeyIdentifier::from_str(s).map_err(de::Error::custom)
    }
}


//============ Error Types ===================================================

//------------ KeyIdentifierError --------------------------------------------

/// A value was not a valid key identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyIdentifierError;

impl fmt::Display for KeyIdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("key identifier must be exactly 20 octets")
    }
}

impl error::Error for KeyIdentifierError { }

impl From<KeyIdentifierError> for bcder::decode::ContentError {
    fn from(_: KeyIdentifierError) -> Self {
        bcder::decode::ContentError::from_static(
            "key identifier must be exactly 20 octets"
        )
    }
}


//------------ SignatureVerificationError ------------------------------------

/// An error happened while verifying a signature.
///
/// No further information is provided. This is on purpose.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SignatureVerificationError;

impl From<Unspecified> for SignatureVerificationError {
    fn from(_: Unspecified) -> Self {
        SignatureVerificationError
    }
}

impl fmt::Display for SignatureVerificationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("signature verification failed")
    }
}

impl error::Error for SignatureVerificationError { }


//============ Tests =========================================================
