//! Access to decoding and cryptography.
//!
//! The validation logic never decodes objects or verifies signatures
//! itself but asks a [`Provider`]. The [`DerProvider`] does this for the
//! real DER encoded objects found in RPKI repositories.

use crate::crypto::{verify_sha256, PublicKey};
use crate::error::ObjectError;
use crate::repository::aspa::Aspa;
use crate::repository::cert::Cert;
use crate::repository::crl::Crl;
use crate::repository::gbr::Gbr;
use crate::repository::manifest::Manifest;
use crate::repository::object::{Object, ObjectType};
use crate::repository::roa::Roa;
use crate::repository::rsc::Rsc;
use crate::repository::tak::Tak;
use crate::repository::x509::SignedData;


//------------ Provider ------------------------------------------------------

/// A provider of object decoding and signature verification.
pub trait Provider {
    /// Decodes the content of a file as an object of the given type.
    ///
    /// If `digest` is given, the SHA-256 digest of the complete file must
    /// match it before anything else is looked at. For signed objects, the
    /// envelope has to be complete and self-consistent, i.e., signed by the
    /// key of the included EE certificate.
    fn decode(
        &self, kind: ObjectType, data: &[u8], digest: Option<&[u8]>
    ) -> Result<Object, ObjectError>;

    /// Verifies the signature of signed data with the given key.
    fn verify_signature(
        &self, data: &SignedData, key: &PublicKey
    ) -> Result<(), ObjectError>;

    /// Returns whether two public keys are the same key.
    fn keys_match(&self, left: &PublicKey, right: &PublicKey) -> bool {
        left.algorithm() == right.algorithm() && left.bits() == right.bits()
    }
}


//------------ DerProvider ---------------------------------------------------

/// The provider for DER encoded objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct DerProvider;

impl Provider for DerProvider {
    fn decode(
        &self, kind: ObjectType, data: &[u8], digest: Option<&[u8]>
    ) -> Result<Object, ObjectError> {
        match kind {
            ObjectType::Cer => {
                if let Some(digest) = digest {
                    verify_sha256(data, digest)?;
                }
                Ok(Object::Cert(Cert::decode(data)?))
            }
            ObjectType::Crl => {
                if let Some(digest) = digest {
                    verify_sha256(data, digest)?;
                }
                Ok(Object::Crl(Crl::decode(data)?))
            }
            ObjectType::Mft => {
                Manifest::decode(data, digest).map(Object::Mft)
            }
            ObjectType::Roa => Roa::decode(data, digest).map(Object::Roa),
            ObjectType::Aspa => Aspa::decode(data, digest).map(Object::Aspa),
            ObjectType::Gbr => Gbr::decode(data, digest).map(Object::Gbr),
            ObjectType::Rsc => Rsc::decode(data, digest).map(Object::Rsc),
            ObjectType::Tak => Tak::decode(data, digest).map(Object::Tak),
        }
    }

    fn verify_signature(
        &self, data: &SignedData, key: &PublicKey
    ) -> Result<(), ObjectError> {
        data.verify_signature(key).map_err(|_| {
            ObjectError::chain("signature verification failed")
        })
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::repository::test::cert::TestKey;
    use crate::repository::test::cms::ee_cert;

    #[test]
    fn decode_by_type() {
        let data = ee_cert(&TestKey::rsa(1), &TestKey::rsa(2)).into_bytes();
        let obj = DerProvider.decode(ObjectType::Cer, &data, None).unwrap();
        assert_eq!(obj.object_type(), ObjectType::Cer);
        assert!(
            DerProvider.decode(ObjectType::Crl, &data, None).unwrap_err()
                .is_parse()
        );
        assert!(
            DerProvider.decode(ObjectType::Cer, &data, Some(&[0; 32]))
                .unwrap_err().is_digest()
        );
    }

    #[test]
    fn bogus_signature_fails_as_chain_error() {
        let data = ee_cert(&TestKey::rsa(1), &TestKey::rsa(2)).into_bytes();
        let cert = Cert::decode(data.as_ref()).unwrap();
        let err = DerProvider.verify_signature(
            cert.signed_data(), cert.public_key()
        ).unwrap_err();
        assert!(err.is_chain());
    }

    #[test]
    fn match_keys() {
        let one = PublicKey::decode(TestKey::rsa(1).info.as_ref()).unwrap();
        let two = PublicKey::decode(TestKey::rsa(2).info.as_ref()).unwrap();
        assert!(DerProvider.keys_match(&one, &one.clone()));
        assert!(!DerProvider.keys_match(&one, &two));
    }
}
