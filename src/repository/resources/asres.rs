//! Autonomous System identifier resources.
//!
//! The types herein are defined in [RFC 3779] for use with certificates in
//! general. RFC 6487 specifies how to use them with RPKI certificates. In
//! particular, it prohibits the use of RDI values. Additionally, if the
//! "inherit" value is not used, the set of identifiers must be non-empty.
//!
//! [RFC 3779]: https://tools.ietf.org/html/rfc3779
//! [RFC 6487]: https://tools.ietf.org/html/rfc6487

use std::fmt;
use std::convert::TryFrom;
use std::str::FromStr;
use bcder::decode;
use bcder::Tag;
use bcder::decode::DecodeError;
use serde::{Deserialize, Serialize};
use super::{
    MAX_RESOURCE_ENTRIES, ResourceError, check_disjoint, union_covers
};


//------------ Asn -----------------------------------------------------------

/// An AS number (ASN).
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
#[serde(transparent)]
pub struct Asn(u32);

impl Asn {
    pub const MIN: Asn = Asn(u32::MIN);
    pub const MAX: Asn = Asn(u32::MAX);

    /// Creates an AS number from a `u32`.
    pub fn from_u32(value: u32) -> Self {
        Asn(value)
    }

    /// Converts an AS number into a `u32`.
    pub fn into_u32(self) -> u32 {
        self.0
    }

    /// Returns the next AS number or `None` if this is the largest one.
    pub fn succ(self) -> Option<Self> {
        self.0.checked_add(1).map(Asn)
    }

    /// Takes an AS number from the beginning of an encoded value.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_u32().map(Asn)
    }

    /// Parses the content of an AS number value.
    pub fn parse_content<S: decode::Source>(
        content: &mut decode::Content<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        content.to_u32().map(Asn)
    }
}

impl From<u32> for Asn {
    fn from(id: u32) -> Self {
        Asn(id)
    }
}

impl FromStr for Asn {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = if s.len() > 2 && s[..2].eq_ignore_ascii_case("as") {
            &s[2..]
        } else {
            s
        };
        u32::from_str(s).map(Asn).map_err(|_| {
            ResourceError::new("invalid AS number")
        })
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}


//------------ AsEntry -------------------------------------------------------

/// A single entry of the AS resources of a certificate.
///
/// In serialized form, an entry is a string: either a single number, two
/// numbers separated by a hyphen for a range, or the word `inherit`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum AsEntry {
    /// A single AS number.
    Id(Asn),

    /// A range of AS numbers including both bounds.
    Range { min: Asn, max: Asn },

    /// The AS resources of the issuer are inherited.
    Inherit,
}

impl AsEntry {
    /// Returns the smallest and largest number if this is a concrete entry.
    ///
    /// A single number is treated as the range of just that number.
    pub fn bounds(self) -> Option<(Asn, Asn)> {
        match self {
            AsEntry::Id(id) => Some((id, id)),
            AsEntry::Range { min, max } => Some((min, max)),
            AsEntry::Inherit => None
        }
    }

    /// Takes an optional `ASIdOrRange` value.
    ///
    /// ```text
    /// ASIdOrRange       ::= CHOICE {
    ///     id                ASId,
    ///     range             ASRange }
    ///
    /// ASRange           ::= SEQUENCE {
    ///     min               ASId,
    ///     max               ASId }
    /// ```
    fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_value(|tag, content| {
            if tag == Tag::INTEGER {
                Asn::parse_content(content).map(AsEntry::Id)
            }
            else if tag == Tag::SEQUENCE {
                let cons = content.as_constructed()?;
                Ok(AsEntry::Range {
                    min: Asn::take_from(cons)?,
                    max: Asn::take_from(cons)?,
                })
            }
            else {
                Err(content.content_err("invalid AS resources"))
            }
        })
    }
}

impl FromStr for AsEntry {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "inherit" {
            return Ok(AsEntry::Inherit)
        }
        match s.find('-') {
            Some(idx) => {
                Ok(AsEntry::Range {
                    min: Asn::from_str(s[..idx].trim())?,
                    max: Asn::from_str(s[idx + 1..].trim())?,
                })
            }
            None => Asn::from_str(s).map(AsEntry::Id)
        }
    }
}

impl TryFrom<String> for AsEntry {
    type Error = ResourceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

impl From<AsEntry> for String {
    fn from(entry: AsEntry) -> Self {
        entry.to_string()
    }
}

impl fmt::Display for AsEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AsEntry::Id(id) => write!(f, "{}", id.0),
            AsEntry::Range { min, max } => write!(f, "{}-{}", min.0, max.0),
            AsEntry::Inherit => f.write_str("inherit"),
        }
    }
}


//------------ AsResources ---------------------------------------------------

/// The AS resources of an RPKI certificate.
///
/// This is the ordered list of entries from the certificate’s AS resources
/// extension. It is empty if the extension is missing.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "Vec<AsEntry>", into = "Vec<AsEntry>")]
pub struct AsResources(Vec<AsEntry>);

impl AsResources {
    /// Creates the resources from a list of entries.
    ///
    /// Fails if there are too many entries, if a range isn’t strictly
    /// ordered, if concrete entries overlap, or if there is an inherit
    /// entry together with any other entry.
    pub fn new(entries: Vec<AsEntry>) -> Result<Self, ResourceError> {
        if entries.len() > MAX_RESOURCE_ENTRIES {
            return Err(ResourceError::new("too many AS resource entries"))
        }
        let inherit = entries.iter().filter(|entry| {
            matches!(entry, AsEntry::Inherit)
        }).count();
        if inherit > 0 && entries.len() > 1 {
            return Err(ResourceError::new(
                "AS inherit combined with other entries"
            ))
        }
        for entry in &entries {
            if let AsEntry::Range { min, max } = *entry {
                if min >= max {
                    return Err(ResourceError::new("invalid AS range"))
                }
            }
        }
        check_disjoint(entries.iter().filter_map(|e| e.bounds()).collect())?;
        Ok(AsResources(entries))
    }

    /// Returns resources for a certificate without the extension.
    pub fn missing() -> Self {
        AsResources(Vec::new())
    }

    /// Returns resources that only inherit.
    pub fn inherit() -> Self {
        AsResources(vec![AsEntry::Inherit])
    }

    /// Returns the entries.
    pub fn entries(&self) -> &[AsEntry] {
        &self.0
    }

    /// Returns whether there are no entries at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether the resources are inherited from the issuer.
    pub fn is_inherited(&self) -> bool {
        self.0.iter().any(|entry| matches!(entry, AsEntry::Inherit))
    }

    /// Returns whether there is at least one concrete entry.
    pub fn has_concrete(&self) -> bool {
        self.0.iter().any(|entry| entry.bounds().is_some())
    }

    /// Returns whether the concrete entries cover `min` through `max`.
    ///
    /// Inherit entries don’t cover anything.
    pub fn covers(&self, min: Asn, max: Asn) -> bool {
        let mut ranges: Vec<_> = self.0.iter().filter_map(|entry| {
            entry.bounds()
        }).collect();
        ranges.sort_unstable();
        union_covers(&ranges, min, max, Asn::succ)
    }

    /// Takes the AS resources extension value.
    ///
    /// ```text
    /// ASIdentifiers       ::= SEQUENCE {
    ///     asnum               [0] EXPLICIT ASIdentifierChoice OPTIONAL,
    ///     rdi                 [1] EXPLICIT ASIdentifierChoice OPTIONAL }
    ///
    /// ASIdentifierChoice  ::= CHOICE {
    ///     inherit             NULL, -- inherit from issuer --
    ///     asIdsOrRanges       SEQUENCE OF ASIdOrRange }
    /// ```
    ///
    /// Section 4.8.11 of [RFC 6487] limits the `ASIdentifiers` to the
    /// `asnum` choice. If `asIdsOrRanges` is chosen, it must include a
    /// non-empty set of AS numbers.
    ///
    /// [RFC 6487]: https://tools.ietf.org/html/rfc6487
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let entries = cons.take_constructed_if(Tag::CTX_0, |cons| {
                cons.take_value(|tag, content| {
                    if tag == Tag::NULL {
                        content.to_null()?;
                        Ok(vec![AsEntry::Inherit])
                    }
                    else if tag == Tag::SEQUENCE {
                        let cons = content.as_constructed()?;
                        let mut entries = Vec::new();
                        while let Some(entry) = AsEntry::take_opt_from(cons)? {
                            if entries.len() == MAX_RESOURCE_ENTRIES {
                                return Err(cons.content_err(
                                    "too many AS resource entries"
                                ))
                            }
                            entries.push(entry);
                        }
                        if entries.is_empty() {
                            return Err(cons.content_err(
                                "empty AS resources"
                            ))
                        }
                        Ok(entries)
                    }
                    else {
                        Err(content.content_err("invalid AS resources"))
                    }
                })
            })?;
            if cons.take_opt_constructed_if(
                Tag::CTX_1, |cons| cons.skip_all()
            )?.is_some() {
                return Err(cons.content_err("RDI in AS resources"))
            }
            Self::new(entries).map_err(|err| cons.content_err(err))
        })
    }
}

impl TryFrom<Vec<AsEntry>> for AsResources {
    type Error = ResourceError;

    fn try_from(entries: Vec<AsEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<AsResources> for Vec<AsEntry> {
    fn from(res: AsResources) -> Self {
        res.0
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bcder::Mode;

    fn entries(s: &[&str]) -> Vec<AsEntry> {
        s.iter().map(|s| AsEntry::from_str(s).unwrap()).collect()
    }

    #[test]
    fn decode_ids_and_ranges() {
        // asnum [0] { SEQUENCE { 65000, SEQUENCE { 10, 20 } } }
        let der = b"\x30\x11\xa0\x0f\x30\x0d\
                    \x02\x03\x00\xfd\xe8\
                    \x30\x06\x02\x01\x0a\x02\x01\x14";
        let res = Mode::Der.decode(
            der.as_ref(), AsResources::take_from
        ).unwrap();
        assert_eq!(res.entries(), entries(&["65000", "10-20"]).as_slice());
        assert!(res.covers(Asn::from(15), Asn::from(20)));
        assert!(!res.covers(Asn::from(15), Asn::from(21)));
        assert!(!res.is_inherited());
    }

    #[test]
    fn decode_inherit() {
        let der = b"\x30\x04\xa0\x02\x05\x00";
        let res = Mode::Der.decode(
            der.as_ref(), AsResources::take_from
        ).unwrap();
        assert!(res.is_inherited());
        assert!(!res.has_concrete());
    }

    #[test]
    fn reject_overlap() {
        // [10,20] and [15,25]
        let der = b"\x30\x14\xa0\x12\x30\x10\
                    \x30\x06\x02\x01\x0a\x02\x01\x14\
                    \x30\x06\x02\x01\x0f\x02\x01\x19";
        assert!(
            Mode::Der.decode(der.as_ref(), AsResources::take_from).is_err()
        );
        assert!(AsResources::new(entries(&["10-20", "15-25"])).is_err());
    }

    #[test]
    fn reject_bad_shapes() {
        // Range with min == max.
        let der = b"\x30\x0c\xa0\x0a\x30\x08\
                    \x30\x06\x02\x01\x0a\x02\x01\x0a";
        assert!(
            Mode::Der.decode(der.as_ref(), AsResources::take_from).is_err()
        );
        // Empty asIdsOrRanges.
        let der = b"\x30\x04\xa0\x02\x30\x00";
        assert!(
            Mode::Der.decode(der.as_ref(), AsResources::take_from).is_err()
        );
        // RDI present.
        let der = b"\x30\x08\xa0\x02\x05\x00\xa1\x02\x05\x00";
        assert!(
            Mode::Der.decode(der.as_ref(), AsResources::take_from).is_err()
        );
        assert!(AsResources::new(entries(&["inherit", "10"])).is_err());
        assert!(AsResources::new(entries(&["inherit", "inherit"])).is_err());
    }

    #[test]
    fn adjacent_entries_cover_together() {
        let res = AsResources::new(entries(&["50-99", "100", "101-150"]));
        let res = res.unwrap();
        assert!(res.covers(Asn::from(60), Asn::from(140)));
        assert!(res.covers(Asn::from(100), Asn::from(100)));
        assert!(!res.covers(Asn::from(200), Asn::from(200)));
    }

    #[test]
    fn serde_strings() {
        let res: AsResources = serde_json::from_str(
            r#"["0-4294967295"]"#
        ).unwrap();
        assert!(res.covers(Asn::MIN, Asn::MAX));
        assert_eq!(
            serde_json::to_string(&res).unwrap(), r#"["0-4294967295"]"#
        );
        assert!(
            serde_json::from_str::<AsResources>(r#"["10-20","15"]"#).is_err()
        );
    }
}
