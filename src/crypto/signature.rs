//! Signature algorithms.

use bcder::decode;
use bcder::{Oid, Tag};
use bcder::decode::DecodeError;
use crate::oid;


//------------ RpkiSignatureAlgorithm ----------------------------------------

/// A signature algorithms used by RPKI.
///
/// These are the algorithms used for verifying signatures. For RPKI,
/// [RFC 7935] allows only one algorithm, RSA PKCS #1 v1.5 with SHA-256.
/// However, there are two possible representations of the non-existant
/// algorithm parameters. The value keeps track of the representation used.
///
/// [RFC 7935]: https://tools.ietf.org/html/rfc7935
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RpkiSignatureAlgorithm {
    /// Is the parameter field present?
    has_parameter: bool
}

/// # ASN.1 Values
///
/// ```txt
/// SignatureAlgorithmIdentifier ::= AlgorithmIdentifier
/// AlgorithmIdentifier          ::= SEQUENCE {
///      algorithm                   OBJECT IDENTIFIER,
///      parameters                  ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// Sadly, different identifiers are used in different places. For X.509
/// objects, i.e., certificates and CRLs, this is `sha256WithRSAEncryption`
/// from [RFC 4055]. For signed objects, both `rsaEncryption` from
/// [RFC 3370] and `sha256WithRSAEncryption` must be accepted.
///
/// In both cases, the parameters field is either NULL or missing.
///
/// [RFC 3370]: https://tools.ietf.org/html/rfc3370
/// [RFC 4055]: https://tools.ietf.org/html/rfc4055
impl RpkiSignatureAlgorithm {
    /// Takes a signature algorithm identifier for X.509 objects.
    pub fn x509_take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            oid::SHA256_WITH_RSA_ENCRYPTION.skip_if(cons)?;
            Self::take_parameter(cons)
        })
    }

    /// Takes a signature algorithm identifier for CMS objects.
    pub fn cms_take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let oid = Oid::take_from(cons)?;
            if
                oid != oid::RSA_ENCRYPTION
                && oid != oid::SHA256_WITH_RSA_ENCRYPTION
            {
                return Err(cons.content_err("invalid signature algorithm"))
            }
            Self::take_parameter(cons)
        })
    }

    fn take_parameter<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let has_parameter = cons.take_opt_primitive_if(
            Tag::NULL, |_| Ok(())
        )?.is_some();
        Ok(RpkiSignatureAlgorithm { has_parameter })
    }

    /// Returns whether the identifier carried a NULL parameter.
    pub fn has_parameter(self) -> bool {
        self.has_parameter
    }
}


//--- Default

impl Default for RpkiSignatureAlgorithm {
    fn default() -> Self {
        RpkiSignatureAlgorithm { has_parameter: true }
    }
}


//============ Tests =========================================================
