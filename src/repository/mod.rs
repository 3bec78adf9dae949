//! Processing the content of RPKI repositories.
//!
//! This module contains types and procedures to parse and verify all the
//! objects that can appear in an RPKI repository.

//--- Re-exports
//
pub use self::aspa::Aspa;
pub use self::cert::Cert;
pub use self::crl::Crl;
pub use self::gbr::Gbr;
pub use self::manifest::Manifest;
pub use self::object::{Object, ObjectType};
pub use self::roa::Roa;
pub use self::rsc::Rsc;
pub use self::tak::Tak;
pub use self::tal::Tal;


//--- Modules
//
pub mod aspa;
pub mod cert;
pub mod crl;
pub mod gbr;
pub mod manifest;
pub mod object;
pub mod resources;
pub mod roa;
pub mod rsc;
pub mod sigobj;
pub mod tak;
pub mod tal;
pub mod x509;

#[cfg(test)]
pub(crate) mod test;
