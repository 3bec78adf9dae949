//! Trust Anchor Key (TAK)
//!
//! In full: RPKI Signed Object for Trust Anchor Key
//!
//! These objects are designed to facilitate planned RPKI Trust Anchor
//! Key roll-overs. They serve to signal an updated TAL to Relying Parties.
//! The updated TAL is signed by the current (to become old) TA.
//!
//! See: https://datatracker.ietf.org/doc/draft-ietf-sidrops-signed-tal/

use bcder::{decode, Ia5String};
use bcder::{Mode, OctetString, Tag};
use bcder::decode::{DecodeError, Source};
use serde::{Deserialize, Serialize};
use crate::oid;
use crate::crypto::PublicKey;
use crate::error::{ObjectError, ParseError};
use super::cert::Cert;
use super::sigobj::SignedObject;
use super::tal::TalUri;


//------------ Tak -----------------------------------------------------------

/// A decoded trust anchor key object.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Tak {
    current: TaKey,
    predecessor: Option<TaKey>,
    successor: Option<TaKey>,
    ee: Cert,
}

impl Tak {
    /// Decodes and checks a TAK file.
    pub fn decode(
        data: &[u8], digest: Option<&[u8]>
    ) -> Result<Self, ObjectError> {
        let (content, ee) = SignedObject::decode_checked(
            data, oid::CT_TRUST_ANCHOR_KEY, digest
        )?.into_parts();
        Ok(Self::decode_content(content.as_ref(), ee)?)
    }

    /// Decodes the content of a TAK object.
    ///
    /// ```txt
    /// TAK ::= SEQUENCE {
    ///     version     [0] INTEGER DEFAULT 0,
    ///     current     TAKey,
    ///     predecessor [0] TAKey OPTIONAL,
    ///     successor   [1] TAKey OPTIONAL }
    /// ```
    pub fn decode_content(
        content: &[u8], ee: Cert
    ) -> Result<Self, ParseError> {
        let (current, predecessor, successor) = {
            Mode::Der.decode(content, |cons| {
                cons.take_sequence(|cons| {
                    cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
                        cons.skip_u8_if(0)
                    })?;
                    let current = TaKey::take_from(cons)?;
                    let predecessor = cons.take_opt_constructed_if(
                        Tag::CTX_0, TaKey::take_from
                    )?;
                    let successor = cons.take_opt_constructed_if(
                        Tag::CTX_1, TaKey::take_from
                    )?;
                    Ok((current, predecessor, successor))
                })
            })?
        };
        Ok(Tak { current, predecessor, successor, ee })
    }

    pub fn current(&self) -> &TaKey {
        &self.current
    }

    pub fn predecessor(&self) -> Option<&TaKey> {
        self.predecessor.as_ref()
    }

    pub fn successor(&self) -> Option<&TaKey> {
        self.successor.as_ref()
    }

    pub fn ee(&self) -> &Cert {
        &self.ee
    }
}


//------------ TaKey ---------------------------------------------------------

/// The content of a TAL as carried in a TAK object.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TaKey {
    comments: Vec<String>,
    uris: Vec<TalUri>,
    key_info: PublicKey,
}

impl TaKey {
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn uris(&self) -> &[TalUri] {
        &self.uris
    }

    pub fn key_info(&self) -> &PublicKey {
        &self.key_info
    }

    /// Takes a TA key from the beginning of a constructed value.
    ///
    /// ```txt
    /// TAKey ::= SEQUENCE {
    ///     comments        SEQUENCE SIZE (0..MAX) OF UTF8String,
    ///     certificateURIs SEQUENCE SIZE (1..MAX) OF CertificateURI,
    ///     subjectPublicKeyInfo    SubjectPublicKeyInfo }
    ///
    /// CertificateURI ::= IA5String
    /// ```
    fn take_from<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let comments = cons.take_sequence(|cons| {
                let mut res = Vec::new();
                while let Some(comment) = cons.take_opt_value_if(
                    Tag::UTF8_STRING, OctetString::from_content
                )? {
                    match String::from_utf8(comment.to_bytes().to_vec()) {
                        Ok(comment) => res.push(comment),
                        Err(_) => {
                            return Err(cons.content_err(
                                "invalid UTF-8 in TAK comment"
                            ))
                        }
                    }
                }
                Ok(res)
            })?;
            let uris = cons.take_sequence(|cons| {
                let mut res = Vec::new();
                while let Some(uri) = Ia5String::take_opt_from(cons)? {
                    match TalUri::from_bytes(uri.into_bytes()) {
                        Ok(uri) => res.push(uri),
                        Err(_) => {
                            return Err(cons.content_err(
                                "invalid certificate URI in TAK"
                            ))
                        }
                    }
                }
                if res.is_empty() {
                    return Err(cons.content_err(
                        "TAK key without certificate URIs"
                    ))
                }
                Ok(res)
            })?;
            let key_info = PublicKey::take_from(cons)?;
            Ok(TaKey { comments, uris, key_info })
        })
    }
}


//============ Tests =========================================================
