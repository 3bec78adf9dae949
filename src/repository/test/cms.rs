//! Test data for signed objects.

use bcder::encode;
use bcder::{ConstOid, OctetString, Tag};
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use crate::oid;
use crate::crypto::DigestAlgorithm;
use crate::repository::x509::Time;
use super::cert::{utc_time, DerData, TbsBuilder, TestKey};


//------------ SignedObjectBuilder -------------------------------------------

/// Assembles the CMS envelope of a signed object.
pub struct SignedObjectBuilder {
    content_type: ConstOid,
    attr_content_type: ConstOid,
    content: DerData,
    cert: DerData,
    sid: DerData,
    message_digest: Option<Bytes>,
}

impl SignedObjectBuilder {
    /// Starts an object with the given content.
    ///
    /// The signer identifier is taken from `signer`.
    pub fn new(
        content_type: ConstOid,
        content: DerData,
        cert: DerData,
        signer: &TestKey,
    ) -> Self {
        SignedObjectBuilder {
            content_type: content_type.clone(),
            attr_content_type: content_type,
            content,
            cert,
            sid: DerData::encode(
                OctetString::new(
                    Bytes::copy_from_slice(signer.id.as_slice())
                ).encode_as(Tag::CTX_0)
            ),
            message_digest: None,
        }
    }

    /// Overrides the content type in the signed attributes.
    pub fn attr_content_type(mut self, content_type: ConstOid) -> Self {
        self.attr_content_type = content_type;
        self
    }

    /// Overrides the message digest in the signed attributes.
    pub fn message_digest(mut self, digest: Bytes) -> Self {
        self.message_digest = Some(digest);
        self
    }

    pub fn finalize(self) -> DerData {
        let digest = self.message_digest.unwrap_or_else(|| {
            Bytes::copy_from_slice(
                DigestAlgorithm::default().digest(
                    self.content.as_ref()
                ).as_ref()
            )
        });
        let digest_algorithm = DerData::encode(
            encode::sequence(oid::SHA256.encode())
        );
        let attrs = DerData::encode(encode::sequence_as(Tag::CTX_0, (
            encode::sequence((
                oid::CONTENT_TYPE.encode(),
                encode::set(self.attr_content_type.encode()),
            )),
            encode::sequence((
                oid::MESSAGE_DIGEST.encode(),
                encode::set(OctetString::new(digest).encode()),
            )),
            encode::sequence((
                oid::SIGNING_TIME.encode(),
                encode::set(utc_time(Time::now())),
            )),
        )));
        DerData::encode(encode::sequence((
            oid::SIGNED_DATA.encode(),
            encode::sequence_as(Tag::CTX_0, encode::sequence((
                3u8.encode(),
                encode::set(digest_algorithm.clone()),
                encode::sequence((
                    self.content_type.encode(),
                    encode::sequence_as(
                        Tag::CTX_0,
                        OctetString::new(self.content.into_bytes()).encode()
                    ),
                )),
                encode::sequence_as(Tag::CTX_0, self.cert),
                encode::set(encode::sequence((
                    3u8.encode(),
                    self.sid,
                    digest_algorithm,
                    attrs,
                    encode::sequence((
                        oid::RSA_ENCRYPTION.encode(),
                        DerData::raw(b"\x05\x00"),
                    )),
                    OctetString::new(
                        Bytes::from_static(b"not a signature")
                    ).encode(),
                ))),
            ))),
        )))
    }
}


//------------ Helper Functions ----------------------------------------------

/// Creates an EE certificate inheriting all resources from its issuer.
pub fn ee_cert(key: &TestKey, issuer: &TestKey) -> DerData {
    TbsBuilder::v3(key)
        .subject_key_id(key, false)
        .authority_key_id(issuer)
        .crl_uri("rsync://example.com/module/ca/ca.crl")
        .rpki_authority_info_access("rsync://example.com/module/ca.cer")
        .key_usage_ee()
        .rpki_ee_subject_info_access("rsync://example.com/module/ca/a.roa")
        .rpki_cert_policies()
        .ip_resources(Some(DerData::raw(b"\x05\x00")), None)
        .into_cert()
}
