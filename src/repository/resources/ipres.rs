//! IP address resources.
//!
//! The types herein are defined in [RFC 3779] for use with certificates in
//! general. RFC 6487 specifies how to use them with RPKI certificates. In
//! particular, it prohibits the use of SAFI values in address families.
//!
//! Addresses of both families are kept in a `u128`. IPv4 addresses occupy
//! the most significant 32 bits so that prefixes of both families can be
//! treated the same way.
//!
//! [RFC 3779]: https://tools.ietf.org/html/rfc3779

use std::fmt;
use std::convert::TryFrom;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use bcder::decode;
use bcder::{BitString, OctetString, Tag};
use bcder::decode::DecodeError;
use serde::{Deserialize, Serialize};
use super::{
    MAX_RESOURCE_ENTRIES, ResourceError, check_disjoint, union_covers
};


//------------ Afi -----------------------------------------------------------

/// The address family of an IP address.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
#[serde(rename_all = "lowercase")]
pub enum Afi {
    Ipv4,
    Ipv6,
}

impl Afi {
    /// Returns the number of bits in an address of this family.
    pub fn bits(self) -> u8 {
        match self {
            Afi::Ipv4 => 32,
            Afi::Ipv6 => 128,
        }
    }

    /// Takes an address family from an encoded value.
    ///
    /// ```text
    /// addressFamily        OCTET STRING (SIZE (2..3))
    /// ```
    ///
    /// The first two octets are the AFI. Since RFC 6487 doesn’t allow a
    /// SAFI, we only accept exactly two octets.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let octets = OctetString::take_from(cons)?;
        match octets.to_bytes().as_ref() {
            [0, 1] => Ok(Afi::Ipv4),
            [0, 2] => Ok(Afi::Ipv6),
            _ => Err(cons.content_err("unknown address family"))
        }
    }

    /// Takes an optional address family from an encoded value.
    pub fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let octets = match OctetString::take_opt_from(cons)? {
            Some(octets) => octets,
            None => return Ok(None)
        };
        match octets.to_bytes().as_ref() {
            [0, 1] => Ok(Some(Afi::Ipv4)),
            [0, 2] => Ok(Some(Afi::Ipv6)),
            _ => Err(cons.content_err("unknown address family"))
        }
    }
}

impl fmt::Display for Afi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Afi::Ipv4 => "IPv4",
            Afi::Ipv6 => "IPv6",
        })
    }
}


//------------ Addr ----------------------------------------------------------

/// An IP address of either family.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq,
    PartialOrd, Serialize
)]
#[serde(transparent)]
pub struct Addr(u128);

impl Addr {
    /// Creates an address from an IPv4 address.
    pub fn from_v4(addr: Ipv4Addr) -> Self {
        Addr(u128::from(u32::from(addr)) << 96)
    }

    /// Creates an address from an IPv6 address.
    pub fn from_v6(addr: Ipv6Addr) -> Self {
        Addr(u128::from(addr))
    }

    /// Returns the raw value.
    pub fn to_bits(self) -> u128 {
        self.0
    }

    /// Returns the address with all bits after `len` cleared.
    pub fn to_min(self, len: u8) -> Self {
        match u128::MAX.checked_shr(u32::from(len)) {
            Some(mask) => Addr(self.0 & !mask),
            None => self
        }
    }

    /// Returns the address with all bits after `len` set.
    pub fn to_max(self, len: u8) -> Self {
        match u128::MAX.checked_shr(u32::from(len)) {
            Some(mask) => Addr(self.0 | mask),
            None => self
        }
    }

    /// Returns the next address or `None` if this is the largest one.
    pub fn succ(self) -> Option<Self> {
        self.0.checked_add(1).map(Addr)
    }

    /// Parses an address of the given family from a string.
    pub fn parse(afi: Afi, s: &str) -> Result<Self, ResourceError> {
        let err = || ResourceError::new("invalid IP address");
        match afi {
            Afi::Ipv4 => {
                Ipv4Addr::from_str(s).map(Self::from_v4).map_err(|_| err())
            }
            Afi::Ipv6 => {
                Ipv6Addr::from_str(s).map(Self::from_v6).map_err(|_| err())
            }
        }
    }

    /// Returns an object that displays the address for the given family.
    pub fn display(self, afi: Afi) -> AddrDisplay {
        AddrDisplay { addr: self, afi }
    }

    /// Converts a bit string into an address and its bit length.
    ///
    /// ```text
    /// IPAddress ::= BIT STRING
    /// ```
    ///
    /// The bit string may not be longer than an address of the family and
    /// its padding bits must all be zero.
    fn from_bit_string(
        bits: &BitString, afi: Afi
    ) -> Result<(Self, u8), ResourceError> {
        let octets = bits.octet_bytes();
        let unused = usize::from(bits.unused());
        if octets.is_empty() {
            return if unused == 0 {
                Ok((Addr(0), 0))
            }
            else {
                Err(ResourceError::new("invalid IP address bit string"))
            }
        }
        let len = octets.len() * 8 - unused;
        if len > usize::from(afi.bits()) {
            return Err(ResourceError::new("IP address too long for family"))
        }
        if let Some(last) = octets.last() {
            if last & ((1u8 << unused) - 1) != 0 {
                return Err(ResourceError::new("non-zero padding bits"))
            }
        }
        let mut addr = 0u128;
        for (idx, octet) in octets.iter().enumerate() {
            addr |= u128::from(*octet) << (120 - 8 * idx);
        }
        // len is at most 128 here.
        Ok((Addr(addr), len as u8))
    }
}


//------------ AddrDisplay ---------------------------------------------------

/// Helper type for displaying an address in its family’s notation.
#[derive(Clone, Copy, Debug)]
pub struct AddrDisplay {
    addr: Addr,
    afi: Afi,
}

impl fmt::Display for AddrDisplay {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.afi {
            Afi::Ipv4 => {
                Ipv4Addr::from((self.addr.0 >> 96) as u32).fmt(f)
            }
            Afi::Ipv6 => Ipv6Addr::from(self.addr.0).fmt(f),
        }
    }
}


//------------ Prefix --------------------------------------------------------

/// An IP address prefix.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
pub struct Prefix {
    addr: Addr,
    len: u8,
}

impl Prefix {
    /// Creates a new prefix.
    ///
    /// Fails if the length is too large for the family or if there are bits
    /// set after the prefix length.
    pub fn new(afi: Afi, addr: Addr, len: u8) -> Result<Self, ResourceError> {
        if len > afi.bits() {
            return Err(ResourceError::new("prefix length too large"))
        }
        if addr.to_min(len) != addr {
            return Err(ResourceError::new("host bits set in prefix"))
        }
        Ok(Prefix { addr, len })
    }

    /// Returns the address of the prefix.
    pub fn addr(self) -> Addr {
        self.addr
    }

    /// Returns the prefix length.
    pub fn len(self) -> u8 {
        self.len
    }

    /// Returns the smallest address covered by the prefix.
    pub fn min(self) -> Addr {
        self.addr
    }

    /// Returns the largest address covered by the prefix.
    pub fn max(self) -> Addr {
        self.addr.to_max(self.len)
    }

    /// Takes an encoded prefix for the given family.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        afi: Afi,
    ) -> Result<Self, DecodeError<S::Error>> {
        let bits = BitString::take_from(cons)?;
        Self::from_bit_string(&bits, afi).map_err(|err| cons.content_err(err))
    }

    fn from_bit_string(
        bits: &BitString, afi: Afi
    ) -> Result<Self, ResourceError> {
        let (addr, len) = Addr::from_bit_string(bits, afi)?;
        Ok(Prefix { addr, len })
    }

    /// Parses a prefix of the given family from a string.
    pub fn parse(afi: Afi, s: &str) -> Result<Self, ResourceError> {
        let (addr, len) = match s.find('/') {
            Some(idx) => (&s[..idx], &s[idx + 1..]),
            None => return Err(ResourceError::new("missing prefix length"))
        };
        let len = u8::from_str(len).map_err(|_| {
            ResourceError::new("invalid prefix length")
        })?;
        Self::new(afi, Addr::parse(afi, addr)?, len)
    }

    /// Returns an object that displays the prefix for the given family.
    pub fn display(self, afi: Afi) -> PrefixDisplay {
        PrefixDisplay { prefix: self, afi }
    }
}


//------------ PrefixDisplay -------------------------------------------------

/// Helper type for displaying a prefix in its family’s notation.
#[derive(Clone, Copy, Debug)]
pub struct PrefixDisplay {
    prefix: Prefix,
    afi: Afi,
}

impl fmt::Display for PrefixDisplay {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f, "{}/{}", self.prefix.addr.display(self.afi), self.prefix.len
        )
    }
}


//------------ IpEntry -------------------------------------------------------

/// A single entry of the IP resources of one address family.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IpEntry {
    /// An address prefix.
    Prefix(Prefix),

    /// A range of addresses including both bounds.
    Range { min: Addr, max: Addr },

    /// The resources of this family are inherited from the issuer.
    Inherit,
}

impl IpEntry {
    /// Returns the smallest and largest address if this is concrete.
    pub fn bounds(self) -> Option<(Addr, Addr)> {
        match self {
            IpEntry::Prefix(prefix) => Some((prefix.min(), prefix.max())),
            IpEntry::Range { min, max } => Some((min, max)),
            IpEntry::Inherit => None
        }
    }

    /// Takes an optional `IPAddressOrRange` value.
    ///
    /// ```text
    /// IPAddressOrRange ::= CHOICE {
    ///     addressPrefix        IPAddress,
    ///     addressRange         IPAddressRange }
    ///
    /// IPAddressRange ::= SEQUENCE {
    ///     min                  IPAddress,
    ///     max                  IPAddress }
    /// ```
    ///
    /// The unused bits of `min` are considered zero, those of `max` one.
    fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        afi: Afi,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_value(|tag, content| {
            if tag == Tag::BIT_STRING {
                let bits = BitString::from_content(content)?;
                Prefix::from_bit_string(&bits, afi).map(IpEntry::Prefix)
                    .map_err(|err| content.content_err(err))
            }
            else if tag == Tag::SEQUENCE {
                let cons = content.as_constructed()?;
                let min = BitString::take_from(cons)?;
                let max = BitString::take_from(cons)?;
                let (min, _) = Addr::from_bit_string(&min, afi)
                    .map_err(|err| cons.content_err(err))?;
                let (max, max_len) = Addr::from_bit_string(&max, afi)
                    .map_err(|err| cons.content_err(err))?;
                Ok(IpEntry::Range { min, max: max.to_max(max_len) })
            }
            else {
                Err(content.content_err("invalid IP resources"))
            }
        })
    }

    /// Parses an entry of the given family from a string.
    ///
    /// The string is either `inherit`, a prefix, or two addresses
    /// separated by a hyphen.
    pub fn parse(afi: Afi, s: &str) -> Result<Self, ResourceError> {
        let s = s.trim();
        if s == "inherit" {
            Ok(IpEntry::Inherit)
        }
        else if let Some(idx) = s.find('-') {
            Ok(IpEntry::Range {
                min: Addr::parse(afi, s[..idx].trim())?,
                max: Addr::parse(afi, s[idx + 1..].trim())?.to_max(afi.bits()),
            })
        }
        else {
            Prefix::parse(afi, s).map(IpEntry::Prefix)
        }
    }

    /// Returns an object that displays the entry for the given family.
    pub fn display(self, afi: Afi) -> IpEntryDisplay {
        IpEntryDisplay { entry: self, afi }
    }
}


//------------ IpEntryDisplay ------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct IpEntryDisplay {
    entry: IpEntry,
    afi: Afi,
}

impl fmt::Display for IpEntryDisplay {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.entry {
            IpEntry::Prefix(prefix) => prefix.display(self.afi).fmt(f),
            IpEntry::Range { min, max } => {
                write!(
                    f, "{}-{}",
                    min.display(self.afi), max.display(self.afi)
                )
            }
            IpEntry::Inherit => f.write_str("inherit"),
        }
    }
}


//------------ IpResources ---------------------------------------------------

/// The IP resources of an RPKI certificate.
///
/// The entries for each address family are kept in the order in which they
/// appeared. A family is empty if it wasn’t present in the extension or if
/// the extension is missing altogether.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "IpResourcesRepr", into = "IpResourcesRepr")]
pub struct IpResources {
    v4: Vec<IpEntry>,
    v6: Vec<IpEntry>,
}

impl IpResources {
    /// Creates the resources from the entries of both families.
    pub fn new(
        v4: Vec<IpEntry>, v6: Vec<IpEntry>
    ) -> Result<Self, ResourceError> {
        if v4.len() + v6.len() > MAX_RESOURCE_ENTRIES {
            return Err(ResourceError::new("too many IP resource entries"))
        }
        Self::check_family(&v4)?;
        Self::check_family(&v6)?;
        Ok(IpResources { v4, v6 })
    }

    fn check_family(entries: &[IpEntry]) -> Result<(), ResourceError> {
        let inherit = entries.iter().any(|entry| {
            matches!(entry, IpEntry::Inherit)
        });
        if inherit && entries.len() > 1 {
            return Err(ResourceError::new(
                "IP inherit combined with other entries"
            ))
        }
        for entry in entries {
            if let IpEntry::Range { min, max } = *entry {
                if min >= max {
                    return Err(ResourceError::new("invalid IP range"))
                }
            }
        }
        check_disjoint(entries.iter().filter_map(|e| e.bounds()).collect())
    }

    /// Returns resources for a certificate without the extension.
    pub fn missing() -> Self {
        Self::default()
    }

    /// Returns the entries of the given family.
    pub fn entries(&self, afi: Afi) -> &[IpEntry] {
        match afi {
            Afi::Ipv4 => &self.v4,
            Afi::Ipv6 => &self.v6,
        }
    }

    /// Returns whether there are no entries in either family.
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }

    /// Returns whether the given family is inherited from the issuer.
    pub fn is_inherited(&self, afi: Afi) -> bool {
        self.entries(afi).iter().any(|entry| {
            matches!(entry, IpEntry::Inherit)
        })
    }

    /// Returns whether either family is inherited.
    pub fn any_inherited(&self) -> bool {
        self.is_inherited(Afi::Ipv4) || self.is_inherited(Afi::Ipv6)
    }

    /// Returns whether the family has at least one concrete entry.
    pub fn has_concrete(&self, afi: Afi) -> bool {
        self.entries(afi).iter().any(|entry| entry.bounds().is_some())
    }

    /// Returns whether the concrete entries of the family cover the range.
    pub fn covers(&self, afi: Afi, min: Addr, max: Addr) -> bool {
        let mut ranges: Vec<_> = self.entries(afi).iter().filter_map(|e| {
            e.bounds()
        }).collect();
        ranges.sort_unstable();
        union_covers(&ranges, min, max, Addr::succ)
    }

    /// Takes the IP resources extension value.
    ///
    /// ```text
    /// IPAddrBlocks        ::= SEQUENCE OF IPAddressFamily
    ///
    /// IPAddressFamily     ::= SEQUENCE {    -- AFI & optional SAFI --
    ///     addressFamily        OCTET STRING (SIZE (2..3)),
    ///     ipAddressChoice      IPAddressChoice }
    ///
    /// IPAddressChoice     ::= CHOICE {
    ///     inherit              NULL, -- inherit from issuer --
    ///     addressesOrRanges    SEQUENCE OF IPAddressOrRange }
    /// ```
    ///
    /// Each family may appear at most once and at least one must be present.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let mut v4 = None;
            let mut v6 = None;
            let mut count = 0;
            while let Some(()) = cons.take_opt_sequence(|cons| {
                let afi = Afi::take_from(cons)?;
                let target = match afi {
                    Afi::Ipv4 => &mut v4,
                    Afi::Ipv6 => &mut v6,
                };
                if target.is_some() {
                    return Err(cons.content_err(
                        "duplicate address family in IP resources"
                    ))
                }
                let entries = Self::take_choice(cons, afi, &mut count)?;
                *target = Some(entries);
                Ok(())
            })? { }
            if v4.is_none() && v6.is_none() {
                return Err(cons.content_err("empty IP resources"))
            }
            Self::new(
                v4.unwrap_or_default(), v6.unwrap_or_default()
            ).map_err(|err| cons.content_err(err))
        })
    }

    fn take_choice<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        afi: Afi,
        count: &mut usize,
    ) -> Result<Vec<IpEntry>, DecodeError<S::Error>> {
        cons.take_value(|tag, content| {
            if tag == Tag::NULL {
                content.to_null()?;
                Ok(vec![IpEntry::Inherit])
            }
            else if tag == Tag::SEQUENCE {
                let cons = content.as_constructed()?;
                let mut entries = Vec::new();
                while let Some(entry) = IpEntry::take_opt_from(cons, afi)? {
                    *count += 1;
                    if *count > MAX_RESOURCE_ENTRIES {
                        return Err(cons.content_err(
                            "too many IP resource entries"
                        ))
                    }
                    entries.push(entry);
                }
                if entries.is_empty() {
                    return Err(cons.content_err("empty IP address family"))
                }
                Ok(entries)
            }
            else {
                Err(content.content_err("invalid IP resources"))
            }
        })
    }
}


//------------ IpResourcesRepr -----------------------------------------------

/// The serialized form of IP resources.
///
/// Each family is a list of strings as produced by [`IpEntry::parse`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct IpResourcesRepr {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    v4: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    v6: Vec<String>,
}

impl TryFrom<IpResourcesRepr> for IpResources {
    type Error = ResourceError;

    fn try_from(repr: IpResourcesRepr) -> Result<Self, Self::Error> {
        let parse = |afi, list: Vec<String>| {
            list.iter().map(|s| IpEntry::parse(afi, s)).collect::<Result<
                Vec<_>, _
            >>()
        };
        IpResources::new(
            parse(Afi::Ipv4, repr.v4)?, parse(Afi::Ipv6, repr.v6)?
        )
    }
}

impl From<IpResources> for IpResourcesRepr {
    fn from(res: IpResources) -> Self {
        IpResourcesRepr {
            v4: res.v4.iter().map(|e| {
                e.display(Afi::Ipv4).to_string()
            }).collect(),
            v6: res.v6.iter().map(|e| {
                e.display(Afi::Ipv6).to_string()
            }).collect(),
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bcder::Mode;

    fn v4(s: &str) -> Addr {
        Addr::parse(Afi::Ipv4, s).unwrap()
    }

    #[test]
    fn decode_families() {
        // IPv4: 10.0.0.0/8 and range 192.168.0.0 - 192.168.1.255
        // IPv6: inherit
        let der = b"\x30\x21\
                    \x30\x17\x04\x02\x00\x01\x30\x11\
                    \x03\x02\x00\x0a\
                    \x30\x0b\x03\x03\x03\xc0\xa8\x03\x04\x01\xc0\xa8\x00\
                    \x30\x06\x04\x02\x00\x02\x05\x00";
        let res = Mode::Der.decode(
            der.as_ref(), IpResources::take_from
        ).unwrap();
        assert_eq!(res.entries(Afi::Ipv4).len(), 2);
        assert!(res.is_inherited(Afi::Ipv6));
        assert!(!res.is_inherited(Afi::Ipv4));
        let prefix = Prefix::parse(Afi::Ipv4, "10.20.0.0/16").unwrap();
        assert!(res.covers(Afi::Ipv4, prefix.min(), prefix.max()));
        assert!(res.covers(
            Afi::Ipv4, v4("192.168.1.0"), v4("192.168.1.255").to_max(32)
        ));
        assert!(!res.covers(
            Afi::Ipv4, v4("192.168.2.0"), v4("192.168.2.0").to_max(32)
        ));
    }

    #[test]
    fn reject_unknown_afi() {
        let der = b"\x30\x08\x30\x06\x04\x02\x00\x03\x05\x00";
        assert!(
            Mode::Der.decode(der.as_ref(), IpResources::take_from).is_err()
        );
        // With SAFI.
        let der = b"\x30\x09\x30\x07\x04\x03\x00\x01\x01\x05\x00";
        assert!(
            Mode::Der.decode(der.as_ref(), IpResources::take_from).is_err()
        );
    }

    #[test]
    fn reject_padding_bits() {
        // 10.0.0.0/7 encoded with the padding bit set.
        let der = b"\x30\x0c\x30\x0a\x04\x02\x00\x01\x30\x04\
                    \x03\x02\x01\x0b";
        assert!(
            Mode::Der.decode(der.as_ref(), IpResources::take_from).is_err()
        );
        // Same with a clean padding bit.
        let der = b"\x30\x0c\x30\x0a\x04\x02\x00\x01\x30\x04\
                    \x03\x02\x01\x0a";
        assert!(
            Mode::Der.decode(der.as_ref(), IpResources::take_from).is_ok()
        );
    }

    #[test]
    fn reject_too_long_address() {
        // Five octets for IPv4.
        let der = b"\x30\x10\x30\x0e\x04\x02\x00\x01\x30\x08\
                    \x03\x06\x00\x0a\x00\x00\x00\x00";
        assert!(
            Mode::Der.decode(der.as_ref(), IpResources::take_from).is_err()
        );
    }

    #[test]
    fn reject_overlap_and_duplicates() {
        let res = IpResources::new(
            vec![
                IpEntry::parse(Afi::Ipv4, "10.0.0.0/8").unwrap(),
                IpEntry::parse(Afi::Ipv4, "10.1.0.0/16").unwrap(),
            ],
            Vec::new()
        );
        assert!(res.is_err());
        let res = IpResources::new(
            vec![
                IpEntry::parse(Afi::Ipv4, "10.0.0.0/8").unwrap(),
                IpEntry::Inherit,
            ],
            Vec::new()
        );
        assert!(res.is_err());
        // Two IPv4 families.
        let der = b"\x30\x10\
                    \x30\x06\x04\x02\x00\x01\x05\x00\
                    \x30\x06\x04\x02\x00\x01\x05\x00";
        assert!(
            Mode::Der.decode(der.as_ref(), IpResources::take_from).is_err()
        );
    }

    #[test]
    fn prefix_parsing() {
        let prefix = Prefix::parse(Afi::Ipv4, "10.0.0.0/24").unwrap();
        assert_eq!(prefix.len(), 24);
        assert_eq!(prefix.display(Afi::Ipv4).to_string(), "10.0.0.0/24");
        assert!(Prefix::parse(Afi::Ipv4, "10.0.0.1/24").is_err());
        assert!(Prefix::parse(Afi::Ipv4, "10.0.0.0/33").is_err());
        let prefix = Prefix::parse(Afi::Ipv6, "2001:db8::/32").unwrap();
        assert_eq!(prefix.display(Afi::Ipv6).to_string(), "2001:db8::/32");
    }

    #[test]
    fn serde_strings() {
        let res: IpResources = serde_json::from_str(
            r#"{"v4": ["0.0.0.0/0"], "v6": ["::/0"]}"#
        ).unwrap();
        let prefix = Prefix::parse(Afi::Ipv4, "10.0.0.0/24").unwrap();
        assert!(res.covers(Afi::Ipv4, prefix.min(), prefix.max()));
        let back = serde_json::to_string(&res).unwrap();
        assert_eq!(back, r#"{"v4":["0.0.0.0/0"],"v6":["::/0"]}"#);
        let range: IpResources = serde_json::from_str(
            r#"{"v4": ["10.0.0.0-10.0.0.255"]}"#
        ).unwrap();
        assert!(range.covers(Afi::Ipv4, prefix.min(), prefix.max()));
    }
}
