//! Autonomous System Provider Authorization
//!
//! See [draft-ietf-sidrops-aspa-profile].
//!
//! [draft-ietf-sidrops-aspa-profile]: https://datatracker.ietf.org/doc/draft-ietf-sidrops-aspa-profile/

use std::fmt;
use std::str::FromStr;
use bcder::decode;
use bcder::{Mode, Tag};
use bcder::decode::{DecodeError, Source};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use crate::oid;
use crate::error::{ObjectError, ParseError};
use super::cert::Cert;
use super::resources::{Afi, Asn};
use super::sigobj::SignedObject;


//------------ Aspa ----------------------------------------------------------

/// A decoded ASPA object.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Aspa {
    /// The customer AS.
    customer: Asn,

    /// The provider ASes in strictly ascending order.
    providers: Vec<ProviderAs>,

    /// The EE certificate of the object.
    ee: Cert,
}

impl Aspa {
    /// Decodes and checks an ASPA file.
    pub fn decode(
        data: &[u8], digest: Option<&[u8]>
    ) -> Result<Self, ObjectError> {
        let (content, ee) = SignedObject::decode_checked(
            data, oid::CT_ASPA, digest
        )?.into_parts();
        Ok(Self::decode_content(content.as_ref(), ee)?)
    }

    /// Decodes the content of an ASPA object.
    ///
    /// ```txt
    /// ASProviderAttestation ::= SEQUENCE {
    ///     version [0]   INTEGER DEFAULT 0,
    ///     customerASID  ASID,
    ///     providers     ProviderASSet }
    ///
    /// ProviderASSet ::= SEQUENCE (SIZE(1..MAX)) OF ProviderAS
    ///
    /// ProviderAS ::= SEQUENCE {
    ///     providerASID  ASID,
    ///     afiLimit      OCTET STRING (SIZE (2)) OPTIONAL }
    /// ```
    ///
    /// Newer versions of the profile use version 1 and list plain ASIDs
    /// as providers. Both forms are accepted.
    pub fn decode_content(
        content: &[u8], ee: Cert
    ) -> Result<Self, ParseError> {
        let (customer, providers) = Mode::Der.decode(content, |cons| {
            cons.take_sequence(|cons| {
                cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
                    let version = cons.take_u8()?;
                    if version > 1 {
                        return Err(cons.content_err(
                            "unsupported ASPA version"
                        ))
                    }
                    Ok(())
                })?;
                let customer = Asn::take_from(cons)?;
                let providers = take_providers(cons, customer)?;
                Ok((customer, providers))
            })
        })?;
        Ok(Aspa { customer, providers, ee })
    }

    pub fn customer(&self) -> Asn {
        self.customer
    }

    pub fn providers(&self) -> &[ProviderAs] {
        &self.providers
    }

    /// Returns the providers valid for the given address family.
    pub fn providers_for(
        &self, afi: Afi
    ) -> impl Iterator<Item = Asn> + '_ {
        self.providers.iter().filter(move |item| {
            item.afi_limit.map(|limit| limit == afi).unwrap_or(true)
        }).map(|item| item.provider)
    }

    pub fn ee(&self) -> &Cert {
        &self.ee
    }
}


//------------ ProviderAs ----------------------------------------------------

/// A provider AS with an optional address family limit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProviderAs {
    provider: Asn,
    afi_limit: Option<Afi>,
}

impl ProviderAs {
    pub fn new(provider: Asn, afi_limit: Option<Afi>) -> Self {
        ProviderAs { provider, afi_limit }
    }

    pub fn provider(&self) -> Asn {
        self.provider
    }

    pub fn afi_limit(&self) -> Option<Afi> {
        self.afi_limit
    }

    /// Takes an optional provider AS from the beginning of a value.
    ///
    /// This is either a bare ASID or the sequence of the older profile.
    fn take_opt_from<S: Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        if let Some(provider) = cons.take_opt_u32()? {
            return Ok(Some(ProviderAs::new(Asn::from_u32(provider), None)))
        }
        cons.take_opt_sequence(|cons| {
            let provider = Asn::take_from(cons)?;
            let afi_limit = Afi::take_opt_from(cons)?;
            Ok(ProviderAs { provider, afi_limit })
        })
    }
}


//--- FromStr and Display

impl FromStr for ProviderAs {
    type Err = <Asn as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(as_str) = s.strip_suffix("(v4)") {
            Ok(ProviderAs::new(Asn::from_str(as_str)?, Some(Afi::Ipv4)))
        }
        else if let Some(as_str) = s.strip_suffix("(v6)") {
            Ok(ProviderAs::new(Asn::from_str(as_str)?, Some(Afi::Ipv6)))
        }
        else {
            Ok(ProviderAs::new(Asn::from_str(s)?, None))
        }
    }
}

impl fmt::Display for ProviderAs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.afi_limit {
            None => write!(f, "{}", self.provider),
            Some(Afi::Ipv4) => write!(f, "{}(v4)", self.provider),
            Some(Afi::Ipv6) => write!(f, "{}(v6)", self.provider),
        }
    }
}


//--- Deserialize and Serialize

impl Serialize for ProviderAs {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProviderAs {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        let string = String::deserialize(deserializer)?;
        ProviderAs::from_str(&string).map_err(de::Error::custom)
    }
}


//------------ Helper Functions ----------------------------------------------

/// Takes the provider set.
///
/// The set must not be empty, must be in strictly ascending order, and
/// must not contain the customer.
fn take_providers<S: Source>(
    cons: &mut decode::Constructed<S>,
    customer: Asn,
) -> Result<Vec<ProviderAs>, DecodeError<S::Error>> {
    cons.take_sequence(|cons| {
        let mut res: Vec<ProviderAs> = Vec::new();
        while let Some(item) = ProviderAs::take_opt_from(cons)? {
            if item.provider == customer {
                return Err(cons.content_err(
                    "customer AS listed as its own provider"
                ))
            }
            if let Some(last) = res.last() {
                if last.provider >= item.provider {
                    return Err(cons.content_err(
                        "provider AS set is not ordered"
                    ))
                }
            }
            res.push(item);
        }
        if res.is_empty() {
            return Err(cons.content_err("empty provider AS set"))
        }
        Ok(res)
    })
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bcder::{encode, OctetString};
    use bcder::encode::PrimitiveContent;
    use crate::repository::test::cert::{as_id, DerData, TestKey};
    use crate::repository::test::cms::ee_cert;

    fn ee() -> Cert {
        Cert::decode(
            ee_cert(&TestKey::rsa(1), &TestKey::rsa(2)).as_ref()
        ).unwrap()
    }

    fn provider(asid: u32, afi: Option<&'static [u8]>) -> DerData {
        DerData::encode(encode::sequence((
            asid.encode(),
            afi.map(OctetString::encode_slice),
        )))
    }

    fn content(customer: u32, providers: &[DerData]) -> DerData {
        DerData::encode(encode::sequence((
            as_id(customer),
            DerData::sequence(providers),
        )))
    }

    fn decode(der: DerData) -> Result<Aspa, ParseError> {
        Aspa::decode_content(der.as_ref(), ee())
    }

    #[test]
    fn decode_aspa() {
        let aspa = decode(content(65000, &[
            provider(10, None),
            provider(20, Some(b"\x00\x01")),
            provider(30, Some(b"\x00\x02")),
        ])).unwrap();
        assert_eq!(aspa.customer(), Asn::from_u32(65000));
        assert_eq!(aspa.providers().len(), 3);
        assert_eq!(
            aspa.providers_for(Afi::Ipv4).collect::<Vec<_>>(),
            [Asn::from_u32(10), Asn::from_u32(20)]
        );
        assert_eq!(
            aspa.providers_for(Afi::Ipv6).collect::<Vec<_>>(),
            [Asn::from_u32(10), Asn::from_u32(30)]
        );
    }

    #[test]
    fn decode_plain_providers() {
        let der = DerData::encode(encode::sequence((
            encode::sequence_as(Tag::CTX_0, 1u8.encode()),
            as_id(65000),
            DerData::sequence(&[as_id(10), as_id(20)]),
        )));
        let aspa = decode(der).unwrap();
        assert_eq!(
            aspa.providers_for(Afi::Ipv6).collect::<Vec<_>>(),
            [Asn::from_u32(10), Asn::from_u32(20)]
        );
    }

    #[test]
    fn reject_bad_provider_sets() {
        assert!(decode(content(65000, &[])).is_err());
        assert!(decode(content(65000, &[
            provider(20, None), provider(10, None)
        ])).is_err());
        assert!(decode(content(65000, &[
            provider(10, None), provider(10, Some(b"\x00\x01"))
        ])).is_err());
        assert!(decode(content(65000, &[
            provider(10, None), provider(65000, None)
        ])).is_err());
    }

    #[test]
    fn provider_strings() {
        let item = ProviderAs::from_str("AS20(v6)").unwrap();
        assert_eq!(item.afi_limit(), Some(Afi::Ipv6));
        assert_eq!(item.to_string(), "AS20(v6)");
        assert_eq!(
            ProviderAs::from_str("AS7").unwrap(),
            ProviderAs::new(Asn::from_u32(7), None)
        );
    }
}
