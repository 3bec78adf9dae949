//! Validating the RPKI.
//!
//! This module contains everything needed to turn the content of RPKI
//! repositories into validated payload. A run is started via [`run`]. It
//! walks the tree of certificates starting at the trust anchors and
//! collects VRPs, VAPs, and router keys into an [`Output`] along with
//! [`Stats`] describing what happened along the way.
//!
//! Decoding and signature verification are left to a [`Provider`],
//! fetching repositories to a [`Fetcher`].

//--- Re-exports
//
pub use self::crawl::{run, Outcome, ValidationContext};
pub use self::fetch::{Fetcher, LocalFetcher, RsyncFetcher};
pub use self::output::{Output, RouterKey, Vap, Vrp};
pub use self::provider::{DerProvider, Provider};
pub use self::stats::{ObjectStats, Stats};


//--- Modules
//
pub mod auth;
pub mod covering;
pub mod crawl;
pub mod crls;
pub mod fetch;
pub mod mft;
pub mod output;
pub mod provider;
pub mod repo;
pub mod stats;
