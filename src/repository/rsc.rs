//! Resource Signed Checklists.
//!
//! For more information see [rfc9323].
//!
//! [rfc9323]: https://datatracker.ietf.org/doc/rfc9323/

use bcder::{decode, Ia5String};
use bcder::{Mode, OctetString, Tag};
use bcder::decode::{DecodeError, Source};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use crate::oid;
use crate::crypto::DigestAlgorithm;
use crate::error::{ObjectError, ParseError};
use super::cert::Cert;
use super::resources::{AsResources, IpResources};
use super::sigobj::SignedObject;


//------------ Rsc -----------------------------------------------------------

/// A decoded resource signed checklist.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Rsc {
    /// The AS resources the checklist is signed for.
    #[serde(default)]
    as_resources: AsResources,

    /// The IP resources the checklist is signed for.
    #[serde(default)]
    ip_resources: IpResources,

    /// The checked files.
    check_list: Vec<FileNameAndHash>,

    /// The EE certificate.
    ee: Cert,
}

impl Rsc {
    /// Decodes and checks an RSC file.
    pub fn decode(
        data: &[u8], digest: Option<&[u8]>
    ) -> Result<Self, ObjectError> {
        let (content, ee) = SignedObject::decode_checked(
            data, oid::CT_SIGNED_CHECKLIST, digest
        )?.into_parts();
        Ok(Self::decode_content(content.as_ref(), ee)?)
    }

    /// Decodes the content of an RSC object.
    ///
    /// ```txt
    /// RpkiSignedChecklist ::= SEQUENCE {
    ///     version [0]         INTEGER DEFAULT 0,
    ///     resources           ResourceBlock,
    ///     digestAlgorithm     DigestAlgorithmIdentifier,
    ///     checkList           SEQUENCE SIZE (1..MAX) OF FileNameAndHash }
    ///
    /// ResourceBlock ::= SEQUENCE {
    ///     asID         [0]    ConstrainedASIdentifiers OPTIONAL,
    ///     ipAddrBlocks [1]    ConstrainedIPAddrBlocks OPTIONAL }
    /// ```
    ///
    /// The constrained resource types have the same encoding as the
    /// certificate extensions but do not allow inheriting.
    pub fn decode_content(
        content: &[u8], ee: Cert
    ) -> Result<Self, ParseError> {
        let (as_resources, ip_resources, check_list) = {
            Mode::Der.decode(content, |cons| {
                cons.take_sequence(|cons| {
                    cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
                        cons.skip_u8_if(0)
                    })?;
                    let (asres, ipres) = take_resources(cons)?;
                    DigestAlgorithm::take_from(cons)?;
                    let check_list = cons.take_sequence(|cons| {
                        let mut res = Vec::new();
                        while let Some(item) = FileNameAndHash::take_opt_from(
                            cons
                        )? {
                            res.push(item);
                        }
                        if res.is_empty() {
                            return Err(cons.content_err("empty RSC checklist"))
                        }
                        Ok(res)
                    })?;
                    Ok((asres, ipres, check_list))
                })
            })?
        };
        Ok(Rsc { as_resources, ip_resources, check_list, ee })
    }

    pub fn as_resources(&self) -> &AsResources {
        &self.as_resources
    }

    pub fn ip_resources(&self) -> &IpResources {
        &self.ip_resources
    }

    pub fn check_list(&self) -> &[FileNameAndHash] {
        &self.check_list
    }

    pub fn ee(&self) -> &Cert {
        &self.ee
    }
}


//------------ FileNameAndHash -----------------------------------------------

/// An entry of the checklist.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FileNameAndHash {
    file_name: Option<String>,
    hash: Bytes,
}

impl FileNameAndHash {
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn hash(&self) -> &Bytes {
        &self.hash
    }

    /// Takes an optional value from the beginning of a constructed value.
    ///
    /// ```txt
    /// FileNameAndHash ::= SEQUENCE {
    ///     fileName        PortableFilename OPTIONAL,
    ///     hash            Digest }
    /// ```
    fn take_opt_from<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let file_name = match Ia5String::take_opt_from(cons)? {
                Some(name) => {
                    let name = name.into_bytes();
                    if !is_portable_file_name(&name) {
                        return Err(cons.content_err(
                            "RSC file name is not a portable file name"
                        ))
                    }
                    Some(String::from_utf8_lossy(&name).into_owned())
                }
                None => None
            };
            let hash = OctetString::take_from(cons)?.into_bytes();
            if hash.len() != 32 {
                return Err(cons.content_err("invalid RSC file hash"))
            }
            Ok(FileNameAndHash { file_name, hash })
        })
    }
}


//------------ Helper Functions ----------------------------------------------

/// Takes the resource block.
///
/// At least one kind of resources must be present and none may inherit.
fn take_resources<S: Source>(
    cons: &mut decode::Constructed<S>
) -> Result<(AsResources, IpResources), DecodeError<S::Error>> {
    cons.take_sequence(|cons| {
        let asres = cons.take_opt_constructed_if(
            Tag::CTX_0, AsResources::take_from
        )?;
        let ipres = cons.take_opt_constructed_if(
            Tag::CTX_1, IpResources::take_from
        )?;
        if asres.is_none() && ipres.is_none() {
            return Err(cons.content_err("no resources in RSC"))
        }
        let asres = asres.unwrap_or_default();
        let ipres = ipres.unwrap_or_default();
        if asres.is_inherited() || ipres.any_inherited() {
            return Err(cons.content_err("inherited resources in RSC"))
        }
        Ok((asres, ipres))
    })
}

/// Checks whether a file name only contains the characters of RFC 9323.
fn is_portable_file_name(name: &[u8]) -> bool {
    !name.is_empty() && name.iter().all(|&ch| {
        ch == b'-' || ch == b'_' || ch == b'.' || ch.is_ascii_alphanumeric()
    })
}


//============ Tests =========================================================
