//! Certificate Revocation Lists for RPKI.
//!
//! Much like for certificates, RPKI reuses X.509 for its certifcate
//! revocation lists (CRLs), limiting the values that are allowed in the
//! various fields.
//!
//! The RPKI CRL profile is defined in RFC 6487 based on the Internet RPIX
//! profile defined in RFC 5280.

use std::collections::BTreeSet;
use bcder::decode;
use bcder::{Mode, OctetString, Oid, Tag};
use bcder::decode::{DecodeError, IntoSource, Source};
use serde::{Deserialize, Serialize};
use crate::oid;
use crate::crypto::{KeyIdentifier, RpkiSignatureAlgorithm};
use super::x509::{Serial, SignedData, Time};


//------------ Crl -----------------------------------------------------------

/// An RPKI certificate revocation list.
///
/// A value of this type is the result of parsing a CRL file found in the
/// RPKI repository. You can use the `decode` function for parsing a CRL out
/// of such a file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Crl {
    /// The outer structure of the CRL.
    #[serde(default)]
    signed_data: SignedData,

    /// The key identifier of the CA that issued the CRL.
    aki: KeyIdentifier,

    /// The CRL number.
    crl_number: Serial,

    /// The time this version of the CRL was created.
    this_update: Time,

    /// The time the next version of the CRL is to be created.
    next_update: Time,

    /// The serial numbers of the revoked certificates.
    #[serde(default)]
    revoked: BTreeSet<Serial>,
}

impl Crl {
    /// Parses a source as a certificate revocation list.
    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Der.decode(source, Self::take_from)
    }

    /// Takes an encoded CRL from the beginning of a constructed value.
    pub fn take_from<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    /// Parses the content of a certificate revocation list.
    ///
    /// ```txt
    /// TBSCertList  ::=  SEQUENCE  {
    ///      version                 Version OPTIONAL,
    ///                                   -- if present, MUST be v2
    ///      signature               AlgorithmIdentifier,
    ///      issuer                  Name,
    ///      thisUpdate              Time,
    ///      nextUpdate              Time OPTIONAL,
    ///      revokedCertificates     SEQUENCE OF SEQUENCE  {
    ///           userCertificate         CertificateSerialNumber,
    ///           revocationDate          Time,
    ///           crlEntryExtensions      Extensions OPTIONAL
    ///                                    -- if present, version MUST be v2
    ///                                }  OPTIONAL,
    ///      crlExtensions           [0]  EXPLICIT Extensions OPTIONAL
    ///                                    -- if present, version MUST be v2
    /// }
    /// ```
    ///
    /// RFC 6487 requires version 2, the nextUpdate field, and the two
    /// extensions Authority Key Identifier and CRL Number. Entry extensions
    /// are not allowed.
    pub fn from_constructed<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let signed_data = SignedData::from_constructed(cons)?;
        let tbs = Mode::Der.decode(signed_data.data().as_ref(), |cons| {
            cons.take_sequence(|cons| {
                cons.skip_u8_if(1)?; // v2 => 1
                RpkiSignatureAlgorithm::x509_take_from(cons)?;
                cons.take_sequence(|cons| cons.skip_all())?; // issuer
                let this_update = Time::take_from(cons)?;
                let next_update = match Time::take_opt_from(cons)? {
                    Some(time) => time,
                    None => {
                        return Err(cons.content_err(
                            "CRL without nextUpdate"
                        ))
                    }
                };
                if next_update <= this_update {
                    return Err(cons.content_err(
                        "CRL nextUpdate not after thisUpdate"
                    ))
                }
                let revoked = take_revoked_certs(cons)?;
                let (aki, crl_number) = cons.take_constructed_if(
                    Tag::CTX_0, take_extensions
                )?;
                Ok(Crl {
                    signed_data: SignedData::default(),
                    aki, crl_number, this_update, next_update, revoked,
                })
            })
        }).map_err(DecodeError::convert)?;
        Ok(Crl { signed_data, ..tbs })
    }

    pub fn signed_data(&self) -> &SignedData {
        &self.signed_data
    }

    /// Returns the key identifier of the issuing CA.
    pub fn authority_key_identifier(&self) -> KeyIdentifier {
        self.aki
    }

    pub fn crl_number(&self) -> Serial {
        self.crl_number
    }

    pub fn this_update(&self) -> Time {
        self.this_update
    }

    pub fn next_update(&self) -> Time {
        self.next_update
    }

    /// Returns whether the given serial number is on this revocation list.
    pub fn contains(&self, serial: Serial) -> bool {
        self.revoked.contains(&serial)
    }

    /// Returns the number of revoked serials.
    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}


//------------ Helper Functions ----------------------------------------------

/// Takes the optional list of revoked certificates.
fn take_revoked_certs<S: Source>(
    cons: &mut decode::Constructed<S>
) -> Result<BTreeSet<Serial>, DecodeError<S::Error>> {
    let mut res = BTreeSet::new();
    cons.take_opt_sequence(|cons| {
        while let Some(serial) = cons.take_opt_sequence(|cons| {
            let serial = Serial::take_from(cons)?;
            Time::take_from(cons)?;
            // crlEntryExtensions are forbidden by RFC 6487.
            Ok(serial)
        })? {
            res.insert(serial);
        }
        Ok(())
    })?;
    Ok(res)
}

/// Takes the CRL extensions.
///
/// Only two extension are allowed to be present: the authority key
/// identifier extension which contains the key identifier of the certificate
/// this CRL is associated with, and the CRL number which is the serial
/// number of this version of the CRL.
fn take_extensions<S: Source>(
    cons: &mut decode::Constructed<S>
) -> Result<(KeyIdentifier, Serial), DecodeError<S::Error>> {
    cons.take_sequence(|cons| {
        let mut authority_key_id = None;
        let mut crl_number = None;
        while let Some(()) = cons.take_opt_sequence(|cons| {
            let id = Oid::take_from(cons)?;
            let critical = cons.take_opt_bool()?.unwrap_or(false);
            let value = OctetString::take_from(cons)?;
            if critical {
                return Err(cons.content_err("critical CRL extension"))
            }
            Mode::Der.decode(value, |cons| {
                if id == oid::CE_AUTHORITY_KEY_IDENTIFIER {
                    if authority_key_id.is_some() {
                        return Err(cons.content_err(
                            "duplicate Authority Key Identifier extension"
                        ))
                    }
                    authority_key_id = Some(cons.take_sequence(|cons| {
                        cons.take_value_if(
                            Tag::CTX_0, KeyIdentifier::from_content
                        )
                    })?);
                    Ok(())
                }
                else if id == oid::CE_CRL_NUMBER {
                    if crl_number.is_some() {
                        return Err(cons.content_err(
                            "duplicate CRL Number extension"
                        ))
                    }
                    crl_number = Some(Serial::take_from(cons)?);
                    Ok(())
                }
                else {
                    // RFC 6487 says that no other extensions are
                    // allowed. So we fail even if there is only
                    // non-critical extension.
                    Err(cons.content_err("unexpected CRL extension"))
                }
            }).map_err(DecodeError::convert)
        })? { }
        let aki = authority_key_id.ok_or_else(|| {
            cons.content_err("missing Authority Key Identifier extension")
        })?;
        let number = crl_number.ok_or_else(|| {
            cons.content_err("missing CRL Number extension")
        })?;
        Ok((aki, number))
    })
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bcder::encode;
    use bcder::encode::PrimitiveContent;
    use bytes::Bytes;
    use chrono::TimeDelta;
    use crate::repository::test::cert::{
        empty_name, signature_algorithm, signed, utc_time, DerData, TestKey,
    };

    fn extension(id: bcder::ConstOid, value: DerData) -> DerData {
        DerData::encode(encode::sequence((
            id.encode(), OctetString::new(value.into_bytes()).encode()
        )))
    }

    fn crl(
        key: &TestKey, next_update: Option<Time>, revoked: &[u8],
        extra: Option<DerData>,
    ) -> DerData {
        let now = Time::now();
        let entries: Vec<_> = revoked.iter().map(|serial| {
            DerData::encode(encode::sequence((
                serial.encode(), utc_time(now - TimeDelta::hours(2))
            )))
        }).collect();
        let mut exts = vec![
            extension(
                oid::CE_AUTHORITY_KEY_IDENTIFIER,
                DerData::encode(encode::sequence(
                    OctetString::new(
                        Bytes::copy_from_slice(key.id.as_slice())
                    ).encode_as(Tag::CTX_0)
                ))
            ),
            extension(oid::CE_CRL_NUMBER, DerData::encode(7u8.encode())),
        ];
        exts.extend(extra);
        signed(DerData::encode(encode::sequence((
            1u8.encode(),
            signature_algorithm(),
            empty_name(),
            utc_time(now - TimeDelta::hours(1)),
            next_update.map(utc_time),
            if entries.is_empty() {
                None
            }
            else {
                Some(DerData::sequence(&entries))
            },
            encode::sequence_as(Tag::CTX_0, DerData::sequence(&exts)),
        ))))
    }

    #[test]
    fn decode_crl() {
        let key = TestKey::rsa(1);
        let der = crl(
            &key, Some(Time::now() + TimeDelta::days(1)), &[3, 5], None
        );
        let crl = Crl::decode(der.as_ref()).unwrap();
        assert_eq!(crl.authority_key_identifier(), key.id);
        assert_eq!(crl.crl_number(), Serial::from(7));
        assert!(crl.contains(Serial::from(3)));
        assert!(crl.contains(Serial::from(5)));
        assert!(!crl.contains(Serial::from(4)));
        assert_eq!(crl.len(), 2);
    }

    #[test]
    fn decode_empty_crl() {
        let key = TestKey::rsa(1);
        let der = crl(
            &key, Some(Time::now() + TimeDelta::days(1)), &[], None
        );
        assert!(Crl::decode(der.as_ref()).unwrap().is_empty());
    }

    #[test]
    fn reject_missing_next_update() {
        let key = TestKey::rsa(1);
        assert!(Crl::decode(crl(&key, None, &[], None).as_ref()).is_err());
    }

    #[test]
    fn reject_unknown_extension() {
        let key = TestKey::rsa(1);
        let der = crl(
            &key, Some(Time::now() + TimeDelta::days(1)), &[],
            Some(extension(
                oid::CE_KEY_USAGE, DerData::raw(b"\x03\x01\x00")
            ))
        );
        assert!(Crl::decode(der.as_ref()).is_err());
    }
}
