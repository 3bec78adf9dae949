//! An RPKI relying party validator.
//!
//! The _Resource Public Key Infrastructure_ (RPKI) is an application of
//! PKI to Internet routing security. It allows owners of IP address prefixes
//! to publish cryptographically signed associations of their prefixes to
//! autonomous systems, allowing the validation of the origin of a route
//! announcement in BGP.
//!
//! This crate walks the RPKI starting from a set of trust anchors, checks
//! every object it finds, and produces the validated payload: Validated
//! ROA Payloads (VRPs), Validated ASPA Payloads (VAPs), and BGPsec router
//! keys.
//!
//! The [`repository`] module decodes the individual objects. The
//! [`validation`] module crawls the repositories and validates the objects
//! against each other.

pub mod config;
pub mod crypto;
pub mod error;
pub mod oid;
pub mod repository;
pub mod uri;
pub mod util;
pub mod validation;
