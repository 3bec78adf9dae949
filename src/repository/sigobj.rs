//! Signed objects.
//!
//! All RPKI objects other than certificates and CRLs are wrapped into the
//! same CMS envelope defined in RFC 6488: a signed data structure that
//! carries the payload, exactly one EE certificate, and exactly one signer
//! info made with the key of that certificate. Checking the envelope only
//! establishes that the object was signed by its own EE certificate. Whether
//! that certificate is any good is decided during validation.
//
// See RFC 6488 and RFC 5652.

use std::fmt;
use bcder::decode;
use bcder::{Captured, ConstOid, Mode, OctetString, Oid, Tag};
use bcder::decode::{ContentError, DecodeError, IntoSource, Source};
use bytes::Bytes;
use crate::oid;
use crate::crypto::{
    verify_sha256, DigestAlgorithm, KeyIdentifier, RpkiSignatureAlgorithm,
};
use crate::error::{ObjectError, ParseError};
use super::cert::Cert;
use super::x509::Time;


//------------ SignedObject --------------------------------------------------

/// A signed object.
#[derive(Clone, Debug)]
pub struct SignedObject {
    //--- From SignedData
    //
    digest_algorithm: DigestAlgorithm,
    content_type: Oid<Bytes>,
    content: OctetString,
    cert: Cert,

    //--- From SignerInfo
    //
    sid: KeyIdentifier,
    signed_attrs: SignedAttrs,
    signature: Bytes,

    //--- SignedAttributes
    //
    message_digest: Bytes,
    signing_time: Option<Time>,
}

/// # Data Access
///
impl SignedObject {
    /// Returns a reference to the object’s content type.
    pub fn content_type(&self) -> &Oid<Bytes> {
        &self.content_type
    }

    /// Returns the object’s content.
    pub fn content(&self) -> Bytes {
        self.content.to_bytes()
    }

    /// Returns a reference to the certificate the object is signed with.
    pub fn cert(&self) -> &Cert {
        &self.cert
    }

    /// Returns the signing time if available.
    pub fn signing_time(&self) -> Option<Time> {
        self.signing_time
    }

    /// Converts the object into its content and EE certificate.
    pub fn into_parts(self) -> (Bytes, Cert) {
        (self.content.to_bytes(), self.cert)
    }
}

/// # Decoding and Verification
///
impl SignedObject {
    /// Decodes a signed object from the given source.
    pub fn decode<S: IntoSource>(
        source: S,
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Der.decode(source.into_source(), Self::take_from)
    }

    /// Decodes and checks a signed object of the given type.
    ///
    /// If `digest` is given, the SHA-256 digest of all of `data` has to
    /// match it before anything else is looked at. The content type of the
    /// object has to be exactly `content_type`. Finally, the object has to
    /// be correctly signed by its embedded EE certificate.
    pub fn decode_checked(
        data: &[u8],
        content_type: ConstOid,
        digest: Option<&[u8]>,
    ) -> Result<Self, ObjectError> {
        if let Some(digest) = digest {
            verify_sha256(data, digest)?;
        }
        let res = Self::decode(data).map_err(ParseError::from)?;
        if res.content_type != content_type {
            return Err(ObjectError::parse("invalid content type"))
        }
        res.verify()?;
        Ok(res)
    }

    /// Takes a signed object from an encoded constructed value.
    ///
    /// ```txt
    /// ContentInfo ::= SEQUENCE {
    ///     contentType ContentType,
    ///     content [0] EXPLICIT ANY DEFINED BY contentType }
    ///
    /// SignedData ::= SEQUENCE {
    ///     version CMSVersion,
    ///     digestAlgorithms DigestAlgorithmIdentifiers,
    ///     encapContentInfo EncapsulatedContentInfo,
    ///     certificates [0] IMPLICIT CertificateSet OPTIONAL,
    ///     crls [1] IMPLICIT RevocationInfoChoices OPTIONAL,
    ///     signerInfos SignerInfos }
    /// ```
    ///
    /// RFC 6488 requires version 3, exactly one certificate, no CRLs, and
    /// exactly one signer info.
    pub fn take_from<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| { // ContentInfo
            oid::SIGNED_DATA.skip_if(cons)?; // contentType
            cons.take_constructed_if(Tag::CTX_0, |cons| { // content
                cons.take_sequence(|cons| { // SignedData
                    cons.skip_u8_if(3)?; // version -- must be 3
                    let digest_algorithm =
                        DigestAlgorithm::take_set_from(cons)?;
                    let (content_type, content) = {
                        cons.take_sequence(|cons| { // encapContentInfo
                            Ok((
                                Oid::take_from(cons)?,
                                cons.take_constructed_if(
                                    Tag::CTX_0,
                                    OctetString::take_from
                                )?
                            ))
                        })?
                    };
                    let cert = cons.take_constructed_if( // certificates
                        Tag::CTX_0,
                        Cert::take_from
                    )?;
                    // no crls
                    let (sid, attrs, signature) = { // signerInfos
                        cons.take_set(|cons| {
                            cons.take_sequence(|cons| {
                                cons.skip_u8_if(3)?;
                                let sid = cons.take_value_if(
                                    Tag::CTX_0, KeyIdentifier::from_content
                                )?;
                                DigestAlgorithm::take_from(cons)?;
                                let attrs = SignedAttrs::take_from(cons)?;
                                if attrs.content_type != content_type {
                                    return Err(cons.content_err(
                                        "content type in signed attributes \
                                        differs"
                                    ))
                                }
                                RpkiSignatureAlgorithm::cms_take_from(cons)?;
                                let signature = OctetString::take_from(
                                    cons
                                )?.into_bytes();
                                // no unsignedAttributes
                                Ok((sid, attrs, signature))
                            })
                        })?
                    };
                    Ok(Self {
                        digest_algorithm,
                        content_type,
                        content,
                        cert,
                        sid,
                        signed_attrs: attrs.raw,
                        signature,
                        message_digest: attrs.message_digest,
                        signing_time: attrs.signing_time,
                    })
                })
            })
        })
    }

    /// Verifies that the object was signed by its EE certificate.
    ///
    /// This checks that the signer identifier matches the certificate’s
    /// key identifier, that the message digest matches the content, and
    /// that the signature over the signed attributes is correct.
    pub fn verify(&self) -> Result<(), ObjectError> {
        if self.sid != self.cert.subject_key_identifier() {
            return Err(ObjectError::parse(
                "Subject Key Identifier mismatch in signed object"
            ))
        }
        let digest = self.digest_algorithm.digest(
            self.content.to_bytes().as_ref()
        );
        if digest.as_ref() != self.message_digest.as_ref() {
            return Err(ObjectError::chain(
                "message digest mismatch in signed object"
            ))
        }
        let msg = self.signed_attrs.encode_verify();
        self.cert.public_key().verify(
            &msg, self.signature.as_ref()
        ).map_err(|_| {
            ObjectError::chain("invalid signature on signed object")
        })
    }
}


//------------ SignedAttrs ---------------------------------------------------

/// A private helper type that contains the raw signed attributes content.
///
/// These attributes, in their DER encoded form, are what the signature is
/// calculated over. Annoyingly, the encoding uses the signed attribute set
/// with a tag for SET OF, not \[0\] as it would be found in the actual data.
///
/// A `SignedAttrs` value contains the captured content of the signed
/// attributes set. That is, it does not contain the tag and length values of
/// the outer set object, only the sequences of the actual attributes.
#[derive(Clone, Debug)]
struct SignedAttrs(Captured);

/// The signed attributes and the values we extracted from them.
struct TakenAttrs {
    raw: SignedAttrs,
    message_digest: Bytes,
    content_type: Oid<Bytes>,
    signing_time: Option<Time>,
}

impl SignedAttrs {
    /// Takes the signed attributes from the beginning of a constructed value.
    ///
    /// ```txt
    /// SignedAttributes ::= SET SIZE (1..MAX) OF Attribute
    ///
    /// Attribute ::= SEQUENCE {
    ///     attrType OBJECT IDENTIFIER,
    ///     attrValues SET OF AttributeValue }
    /// ```
    ///
    /// The content type and message digest attributes must be present. The
    /// signing time and binary signing time attributes are optional. Any
    /// other attribute is rejected.
    fn take_from<S: Source>(
        cons: &mut decode::Constructed<S>,
    ) -> Result<TakenAttrs, DecodeError<S::Error>> {
        let mut message_digest = None;
        let mut content_type = None;
        let mut signing_time = None;
        let mut binary_signing_time = false;
        let raw = cons.take_constructed_if(Tag::CTX_0, |cons| {
            cons.capture(|cons| {
                while let Some(()) = cons.take_opt_sequence(|cons| {
                    let oid = Oid::take_from(cons)?;
                    if oid == oid::CONTENT_TYPE {
                        if content_type.is_some() {
                            return Err(cons.content_err(
                                "duplicate Content Type attribute"
                            ))
                        }
                        content_type = Some(
                            cons.take_set(|cons| Oid::take_from(cons))?
                        );
                    }
                    else if oid == oid::MESSAGE_DIGEST {
                        if message_digest.is_some() {
                            return Err(cons.content_err(
                                "duplicate Message Digest attribute"
                            ))
                        }
                        message_digest = Some(
                            cons.take_set(OctetString::take_from)?
                        );
                    }
                    else if oid == oid::SIGNING_TIME {
                        if signing_time.is_some() {
                            return Err(cons.content_err(
                                "duplicate Signing Time attribute"
                            ))
                        }
                        signing_time = Some(cons.take_set(Time::take_from)?);
                    }
                    else if oid == oid::AA_BINARY_SIGNING_TIME {
                        if binary_signing_time {
                            return Err(cons.content_err(
                                "duplicate Binary Signing Time attribute"
                            ))
                        }
                        binary_signing_time = true;
                        cons.take_set(|cons| cons.take_u64())?;
                    }
                    else {
                        return Err(cons.content_err(
                            InvalidSignedAttr::new(oid)
                        ))
                    }
                    Ok(())
                })? { }
                Ok(())
            })
        })?;
        if raw.len() > 0xFFFF {
            return Err(cons.content_err(
                "signed attributes over 65535 bytes not supported"
            ))
        }
        let message_digest = match message_digest {
            Some(some) => some.into_bytes(),
            None => {
                return Err(cons.content_err(
                    "missing message digest in signed attributes"
                ))
            }
        };
        let Some(content_type) = content_type else {
            return Err(cons.content_err(
                "missing content type in signed attributes",
            ))
        };
        Ok(TakenAttrs {
            raw: SignedAttrs(raw),
            message_digest,
            content_type,
            signing_time,
        })
    }

    /// Creates the message for verification.
    ///
    /// This is the content with the header of a SET in front of it. The
    /// content is limited to 65535 octets while decoding.
    fn encode_verify(&self) -> Vec<u8> {
        let len = self.0.len();
        let mut res = Vec::with_capacity(len + 4);
        res.push(0x31); // SET
        if len < 0x80 {
            res.push(len as u8)
        }
        else if len < 0x100 {
            res.push(0x81);
            res.push(len as u8);
        }
        else {
            res.push(0x82);
            res.push((len >> 8) as u8);
            res.push(len as u8);
        }
        res.extend_from_slice(self.0.as_ref());
        res
    }
}


//------------ InvalidSignedAttr ---------------------------------------------

#[derive(Clone, Debug)]
struct InvalidSignedAttr {
    oid: Oid<Bytes>,
}

impl InvalidSignedAttr {
    fn new(oid: Oid<Bytes>) -> Self {
        InvalidSignedAttr { oid }
    }
}

impl From<InvalidSignedAttr> for ContentError {
    fn from(err: InvalidSignedAttr) -> Self {
        ContentError::from_boxed(Box::new(err))
    }
}

impl fmt::Display for InvalidSignedAttr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid signed attribute {}", self.oid)
    }
}


//============ Tests =========================================================
