//! The validated payload produced by a run.
//!
//! All payload is collected into ordered sets. Inserting an item that is
//! already present keeps the earliest expiry of all contributions while
//! the counters keep track of every insertion.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use serde::{Serialize, Serializer};
use serde::ser::SerializeStruct;
use crate::crypto::{KeyIdentifier, PublicKey};
use crate::repository::resources::{Afi, Asn, Prefix};
use crate::repository::x509::Time;


//------------ Output --------------------------------------------------------

/// The collected VRPs, VAPs, and router keys.
#[derive(Clone, Debug, Default)]
pub struct Output {
    vrps: BTreeMap<VrpKey, Origin>,
    vaps: BTreeMap<VapKey, VapValue>,
    router_keys: BTreeMap<(Asn, KeyIdentifier), RouterKeyValue>,
    vrps_total: usize,
    vaps_total: usize,
    router_keys_total: usize,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a VRP.
    ///
    /// Returns whether the VRP was new.
    pub fn insert_vrp(
        &mut self,
        afi: Afi, prefix: Prefix, max_len: u8, asid: Asn,
        tal: &Arc<str>, expires: Time,
    ) -> bool {
        self.vrps_total += 1;
        let key = VrpKey { afi, prefix, max_len, asid };
        match self.vrps.get_mut(&key) {
            Some(origin) => {
                origin.merge(expires);
                false
            }
            None => {
                self.vrps.insert(key, Origin::new(tal, expires));
                true
            }
        }
    }

    /// Adds a VAP for a customer and address family.
    ///
    /// The providers are merged into the set of providers already known
    /// for the customer and family.
    ///
    /// Returns whether the VAP was new.
    pub fn insert_vap(
        &mut self,
        afi: Afi, customer: Asn, providers: impl IntoIterator<Item = Asn>,
        tal: &Arc<str>, expires: Time,
    ) -> bool {
        self.vaps_total += 1;
        let key = VapKey { afi, customer };
        match self.vaps.get_mut(&key) {
            Some(value) => {
                value.providers.extend(providers);
                value.origin.merge(expires);
                false
            }
            None => {
                self.vaps.insert(key, VapValue {
                    providers: providers.into_iter().collect(),
                    origin: Origin::new(tal, expires),
                });
                true
            }
        }
    }

    /// Adds a router key.
    ///
    /// Returns whether the router key was new.
    pub fn insert_router_key(
        &mut self,
        asid: Asn, key: &PublicKey, tal: &Arc<str>, expires: Time,
    ) -> bool {
        self.router_keys_total += 1;
        let ski = key.key_identifier();
        match self.router_keys.get_mut(&(asid, ski)) {
            Some(value) => {
                value.origin.merge(expires);
                false
            }
            None => {
                self.router_keys.insert((asid, ski), RouterKeyValue {
                    key: key.clone(),
                    origin: Origin::new(tal, expires),
                });
                true
            }
        }
    }

    /// Returns an iterator over the VRPs in order.
    pub fn vrps(&self) -> impl Iterator<Item = Vrp> + '_ {
        self.vrps.iter().map(|(key, origin)| {
            Vrp { key: *key, origin: origin.clone() }
        })
    }

    /// Returns an iterator over the VAPs in order.
    pub fn vaps(&self) -> impl Iterator<Item = Vap> + '_ {
        self.vaps.iter().map(|(key, value)| {
            Vap {
                key: *key,
                providers: value.providers.iter().copied().collect(),
                origin: value.origin.clone(),
            }
        })
    }

    /// Returns an iterator over the router keys in order.
    pub fn router_keys(&self) -> impl Iterator<Item = RouterKey> + '_ {
        self.router_keys.iter().map(|((asid, ski), value)| {
            RouterKey {
                asid: *asid,
                ski: *ski,
                key: value.key.clone(),
                origin: value.origin.clone(),
            }
        })
    }

    /// Returns the number of VRPs ever inserted.
    pub fn vrps_total(&self) -> usize {
        self.vrps_total
    }

    /// Returns the number of distinct VRPs.
    pub fn vrps_unique(&self) -> usize {
        self.vrps.len()
    }

    pub fn vaps_total(&self) -> usize {
        self.vaps_total
    }

    pub fn vaps_unique(&self) -> usize {
        self.vaps.len()
    }

    pub fn router_keys_total(&self) -> usize {
        self.router_keys_total
    }

    pub fn router_keys_unique(&self) -> usize {
        self.router_keys.len()
    }
}


//------------ Origin --------------------------------------------------------

/// Where a payload item came from and how long it stays valid.
#[derive(Clone, Debug)]
struct Origin {
    tal: Arc<str>,
    expires: Time,
}

impl Origin {
    fn new(tal: &Arc<str>, expires: Time) -> Self {
        Origin { tal: tal.clone(), expires }
    }

    fn merge(&mut self, expires: Time) {
        self.expires = self.expires.min(expires);
    }
}


//------------ VrpKey --------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
struct VrpKey {
    afi: Afi,
    prefix: Prefix,
    max_len: u8,
    asid: Asn,
}


//------------ Vrp -----------------------------------------------------------

/// A validated ROA payload.
#[derive(Clone, Debug)]
pub struct Vrp {
    key: VrpKey,
    origin: Origin,
}

impl Vrp {
    pub fn afi(&self) -> Afi {
        self.key.afi
    }

    pub fn prefix(&self) -> Prefix {
        self.key.prefix
    }

    pub fn max_len(&self) -> u8 {
        self.key.max_len
    }

    pub fn asid(&self) -> Asn {
        self.key.asid
    }

    /// Returns the name of the TAL the VRP was first derived from.
    pub fn tal(&self) -> &str {
        &self.origin.tal
    }

    pub fn expires(&self) -> Time {
        self.origin.expires
    }
}

impl fmt::Display for Vrp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{},{},{}",
            self.key.asid, self.key.prefix.display(self.key.afi),
            self.key.max_len, self.origin.tal
        )
    }
}

impl Serialize for Vrp {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Vrp", 5)?;
        s.serialize_field("asn", &self.key.asid)?;
        s.serialize_field(
            "prefix", &self.key.prefix.display(self.key.afi).to_string()
        )?;
        s.serialize_field("maxLength", &self.key.max_len)?;
        s.serialize_field("ta", &*self.origin.tal)?;
        s.serialize_field("expires", &self.origin.expires)?;
        s.end()
    }
}


//------------ VapKey and VapValue -------------------------------------------

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
struct VapKey {
    afi: Afi,
    customer: Asn,
}

#[derive(Clone, Debug)]
struct VapValue {
    providers: BTreeSet<Asn>,
    origin: Origin,
}


//------------ Vap -----------------------------------------------------------

/// A validated ASPA payload for one address family.
#[derive(Clone, Debug)]
pub struct Vap {
    key: VapKey,
    providers: Vec<Asn>,
    origin: Origin,
}

impl Vap {
    pub fn afi(&self) -> Afi {
        self.key.afi
    }

    pub fn customer(&self) -> Asn {
        self.key.customer
    }

    /// Returns the providers in ascending order.
    pub fn providers(&self) -> &[Asn] {
        &self.providers
    }

    pub fn tal(&self) -> &str {
        &self.origin.tal
    }

    pub fn expires(&self) -> Time {
        self.origin.expires
    }
}

impl fmt::Display for Vap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}):", self.key.customer, self.key.afi)?;
        for provider in &self.providers {
            write!(f, " {}", provider)?;
        }
        Ok(())
    }
}

impl Serialize for Vap {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Vap", 5)?;
        s.serialize_field("customer", &self.key.customer)?;
        s.serialize_field("afi", &self.key.afi)?;
        s.serialize_field("providers", &self.providers)?;
        s.serialize_field("ta", &*self.origin.tal)?;
        s.serialize_field("expires", &self.origin.expires)?;
        s.end()
    }
}


//------------ RouterKeyValue and RouterKey ----------------------------------

#[derive(Clone, Debug)]
struct RouterKeyValue {
    key: PublicKey,
    origin: Origin,
}

/// A validated BGPsec router key.
#[derive(Clone, Debug)]
pub struct RouterKey {
    asid: Asn,
    ski: KeyIdentifier,
    key: PublicKey,
    origin: Origin,
}

impl RouterKey {
    pub fn asid(&self) -> Asn {
        self.asid
    }

    pub fn ski(&self) -> KeyIdentifier {
        self.ski
    }

    pub fn key(&self) -> &PublicKey {
        &self.key
    }

    pub fn tal(&self) -> &str {
        &self.origin.tal
    }

    pub fn expires(&self) -> Time {
        self.origin.expires
    }
}

impl fmt::Display for RouterKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{},{}", self.asid, self.ski, self.origin.tal)
    }
}

impl Serialize for RouterKey {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RouterKey", 4)?;
        s.serialize_field("asn", &self.asid)?;
        s.serialize_field("ski", &self.ski)?;
        s.serialize_field("ta", &*self.origin.tal)?;
        s.serialize_field("expires", &self.origin.expires)?;
        s.end()
    }
}


//============ Tests =========================================================
