//! Handling of IP and AS resources.
//!
//! The types in this module implement the certificate extensions defined in
//! [RFC 3779] for including IP address and autonomous system resources in
//! certificates in the restricted form specified by [RFC 6487] for use in
//! RPKI.
//!
//! There are two such resources: [`IpResources`] implements the IP Address
//! Delegation Extension and [`AsResources`] implements the Autonomous System
//! Identifier Delegation Extension.
//!
//! Both keep the entries in the order they appeared in the certificate.
//! Each entry is either a single value, a range, or the marker that the
//! resources of the issuer are inherited. The constructors enforce the
//! structural rules: ranges are strictly ordered, entries of the same
//! family don’t overlap, and inheriting excludes any concrete entries.
//!
//! [RFC 3779]: https://tools.ietf.org/html/rfc3779
//! [RFC 6487]: https://tools.ietf.org/html/rfc6487

use std::{error, fmt};
use bcder::decode::ContentError;

pub use self::asres::{AsEntry, AsResources, Asn};
pub use self::ipres::{Addr, Afi, IpEntry, IpResources, Prefix};

mod asres;
mod ipres;


//------------ Constants -----------------------------------------------------

/// The maximum number of entries accepted in a single resource extension.
///
/// Certificates with more entries are rejected as malformed. This keeps
/// a hostile certificate from making us spend unbounded time and memory.
pub const MAX_RESOURCE_ENTRIES: usize = 200_000;


//------------ ResourceError -------------------------------------------------

/// A set of resources violated the structural rules.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResourceError(&'static str);

impl ResourceError {
    pub(crate) const fn new(msg: &'static str) -> Self {
        ResourceError(msg)
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl error::Error for ResourceError { }

impl From<ResourceError> for ContentError {
    fn from(err: ResourceError) -> Self {
        ContentError::from_static(err.0)
    }
}


//------------ Helper Functions ----------------------------------------------

/// Checks that the given ranges don’t overlap.
///
/// The ranges are given as inclusive `(min, max)` pairs in any order.
fn check_disjoint<T: Ord + Copy>(
    mut ranges: Vec<(T, T)>
) -> Result<(), ResourceError> {
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        if pair[1].0 <= pair[0].1 {
            return Err(ResourceError::new("overlapping resource entries"))
        }
    }
    Ok(())
}

/// Checks whether `[min, max]` is covered by the union of `ranges`.
///
/// The ranges must be sorted and pairwise disjoint. Ranges that are directly
/// adjacent are joined before checking. `succ` returns the value following
/// its argument or `None` for the largest possible value.
fn union_covers<T: Ord + Copy>(
    ranges: &[(T, T)], min: T, max: T, succ: impl Fn(T) -> Option<T>,
) -> bool {
    let mut iter = ranges.iter().copied();
    let mut current = match iter.next() {
        Some(first) => first,
        None => return false
    };
    loop {
        // Extend current as long as the next range is adjacent.
        let next = iter.next();
        if let Some(next) = next {
            if succ(current.1) == Some(next.0) {
                current.1 = next.1;
                continue
            }
        }
        if current.0 <= min && max <= current.1 {
            return true
        }
        match next {
            Some(next) => current = next,
            None => return false
        }
    }
}


//============ Tests =========================================================
