//! Route Origin Authorizations.
//!
//! For details, see RFC 9582.

use std::fmt;
use bcder::decode;
use bcder::{Mode, Tag};
use bcder::decode::{DecodeError, Source};
use serde::{Deserialize, Serialize};
use crate::oid;
use crate::error::{ObjectError, ParseError};
use super::cert::Cert;
use super::resources::{Afi, Asn, Prefix, ResourceError};
use super::sigobj::SignedObject;


//------------ Roa -----------------------------------------------------------

/// A decoded route origin authorization.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Roa {
    /// The AS number authorized to originate the prefixes.
    asid: Asn,

    /// The authorized prefixes.
    prefixes: Vec<RoaPrefix>,

    /// The EE certificate of the ROA.
    ee: Cert,
}

impl Roa {
    /// Decodes and checks a ROA file.
    pub fn decode(
        data: &[u8], digest: Option<&[u8]>
    ) -> Result<Self, ObjectError> {
        let (content, ee) = SignedObject::decode_checked(
            data, oid::ROUTE_ORIGIN_AUTHZ, digest
        )?.into_parts();
        Ok(Self::decode_content(content.as_ref(), ee)?)
    }

    /// Decodes the content of a ROA.
    ///
    /// ```txt
    /// RouteOriginAttestation ::= SEQUENCE {
    ///     version [0]          INTEGER DEFAULT 0,
    ///     asID                 ASID,
    ///     ipAddrBlocks         SEQUENCE (SIZE(1..2)) OF ROAIPAddressFamily
    /// }
    ///
    /// ROAIPAddressFamily ::= SEQUENCE {
    ///     addressFamily        ADDRESS-FAMILY.&afi ({AddressFamilySet}),
    ///     addresses            ADDRESS-FAMILY.&Addresses
    ///                              ({AddressFamilySet}{@addressFamily})
    /// }
    /// ```
    pub fn decode_content(
        content: &[u8], ee: Cert
    ) -> Result<Self, ParseError> {
        let (asid, prefixes) = Mode::Der.decode(content, |cons| {
            cons.take_sequence(|cons| {
                cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
                    cons.skip_u8_if(0)
                })?;
                let asid = Asn::take_from(cons)?;
                let prefixes = take_addr_blocks(cons)?;
                Ok((asid, prefixes))
            })
        })?;
        Ok(Roa { asid, prefixes, ee })
    }

    /// Returns the AS number of the ROA.
    pub fn asid(&self) -> Asn {
        self.asid
    }

    /// Returns the prefixes of the ROA.
    ///
    /// IPv4 prefixes come before IPv6 prefixes.
    pub fn prefixes(&self) -> &[RoaPrefix] {
        &self.prefixes
    }

    pub fn ee(&self) -> &Cert {
        &self.ee
    }
}


//------------ RoaPrefix -----------------------------------------------------

/// A prefix authorized by a ROA together with its maximum length.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "RoaPrefixRepr", into = "RoaPrefixRepr")]
pub struct RoaPrefix {
    afi: Afi,
    prefix: Prefix,
    max_len: u8,
}

impl RoaPrefix {
    /// Creates a new ROA prefix.
    ///
    /// The maximum length must not be smaller than the prefix length and
    /// not be larger than the number of bits in an address of the family.
    /// If it is missing, the prefix length is used.
    pub fn new(
        afi: Afi, prefix: Prefix, max_len: Option<u8>
    ) -> Result<Self, ResourceError> {
        if prefix.len() > afi.bits() {
            return Err(ResourceError::new(
                "prefix length too large in ROA prefix"
            ))
        }
        let max_len = max_len.unwrap_or(prefix.len());
        if max_len < prefix.len() || max_len > afi.bits() {
            return Err(ResourceError::new(
                "invalid max length in ROA prefix"
            ))
        }
        Ok(RoaPrefix { afi, prefix, max_len })
    }

    pub fn afi(self) -> Afi {
        self.afi
    }

    pub fn prefix(self) -> Prefix {
        self.prefix
    }

    pub fn max_len(self) -> u8 {
        self.max_len
    }

    /// Takes an optional ROA prefix of the given family.
    ///
    /// ```txt
    /// ROAIPAddress ::= SEQUENCE {
    ///     address       IPAddress,
    ///     maxLength     INTEGER OPTIONAL }
    /// ```
    fn take_opt_from<S: Source>(
        cons: &mut decode::Constructed<S>,
        afi: Afi,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let prefix = Prefix::take_from(cons, afi)?;
            let max_len = cons.take_opt_u8()?;
            Self::new(afi, prefix, max_len).map_err(|err| {
                cons.content_err(err)
            })
        })
    }
}

impl fmt::Display for RoaPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.prefix.display(self.afi), self.max_len)
    }
}


//------------ RoaPrefixRepr -------------------------------------------------

/// The serialized form of a ROA prefix.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct RoaPrefixRepr {
    afi: Afi,
    prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_len: Option<u8>,
}

impl TryFrom<RoaPrefixRepr> for RoaPrefix {
    type Error = ResourceError;

    fn try_from(repr: RoaPrefixRepr) -> Result<Self, Self::Error> {
        RoaPrefix::new(
            repr.afi, Prefix::parse(repr.afi, &repr.prefix)?, repr.max_len
        )
    }
}

impl From<RoaPrefix> for RoaPrefixRepr {
    fn from(src: RoaPrefix) -> Self {
        RoaPrefixRepr {
            afi: src.afi,
            prefix: src.prefix.display(src.afi).to_string(),
            max_len: Some(src.max_len),
        }
    }
}


//------------ Helper Functions ----------------------------------------------

/// Takes the address blocks of a ROA.
///
/// There can be at most one block per address family and each block must
/// contain at least one prefix.
fn take_addr_blocks<S: Source>(
    cons: &mut decode::Constructed<S>
) -> Result<Vec<RoaPrefix>, DecodeError<S::Error>> {
    cons.take_sequence(|cons| {
        let mut v4 = None;
        let mut v6 = None;
        while let Some(()) = cons.take_opt_sequence(|cons| {
            let afi = Afi::take_from(cons)?;
            let block = match afi {
                Afi::Ipv4 => &mut v4,
                Afi::Ipv6 => &mut v6,
            };
            if block.is_some() {
                return Err(cons.content_err(
                    "multiple address blocks for one family in ROA"
                ))
            }
            let mut prefixes = Vec::new();
            cons.take_sequence(|cons| {
                while let Some(prefix) = RoaPrefix::take_opt_from(
                    cons, afi
                )? {
                    prefixes.push(prefix);
                }
                Ok(())
            })?;
            if prefixes.is_empty() {
                return Err(cons.content_err("empty address block in ROA"))
            }
            *block = Some(prefixes);
            Ok(())
        })? { }
        let mut res = v4.unwrap_or_default();
        res.extend(v6.unwrap_or_default());
        if res.is_empty() {
            return Err(cons.content_err("ROA without prefixes"))
        }
        Ok(res)
    })
}


//============ Tests =========================================================
