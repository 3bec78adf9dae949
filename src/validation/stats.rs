//! Statistics of a validation run.

use std::collections::BTreeMap;
use std::fmt;
use serde::Serialize;
use crate::error::ObjectError;
use crate::repository::object::ObjectType;
use super::output::Output;


//------------ Stats ---------------------------------------------------------

/// The counters collected during a run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Stats {
    /// Counters per object type.
    objects: BTreeMap<ObjectType, ObjectStats>,

    /// Files listed on manifests with an unknown extension.
    unknown_files: usize,

    /// Repositories that were fetched successfully.
    repos_synced: usize,

    /// Repositories that fell back to the local cache.
    repos_fallback: usize,

    /// The payload counters copied from the output.
    vrps_total: usize,
    vrps_unique: usize,
    vaps_total: usize,
    vaps_unique: usize,
    router_keys_total: usize,
    router_keys_unique: usize,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of processing an object of the given type.
    pub fn record<T>(
        &mut self, kind: ObjectType, res: &Result<T, ObjectError>
    ) {
        let stats = self.objects.entry(kind).or_default();
        stats.total += 1;
        match *res {
            Ok(_) => stats.valid += 1,
            Err(ObjectError::Parse(_)) => stats.parse_failed += 1,
            Err(ObjectError::Digest(_)) => stats.digest_failed += 1,
            Err(ObjectError::Chain(_)) => stats.chain_failed += 1,
            Err(ObjectError::Stale(_)) => stats.stale += 1,
        }
    }

    /// Returns the counters for an object type.
    pub fn object(&self, kind: ObjectType) -> ObjectStats {
        self.objects.get(&kind).copied().unwrap_or_default()
    }

    pub fn unknown_file(&mut self) {
        self.unknown_files += 1
    }

    pub fn repo_synced(&mut self) {
        self.repos_synced += 1
    }

    pub fn repo_fallback(&mut self) {
        self.repos_fallback += 1
    }

    pub fn repos_synced(&self) -> usize {
        self.repos_synced
    }

    pub fn repos_fallback(&self) -> usize {
        self.repos_fallback
    }

    /// Takes over the payload counters of the output.
    pub fn set_output(&mut self, output: &Output) {
        self.vrps_total = output.vrps_total();
        self.vrps_unique = output.vrps_unique();
        self.vaps_total = output.vaps_total();
        self.vaps_unique = output.vaps_unique();
        self.router_keys_total = output.router_keys_total();
        self.router_keys_unique = output.router_keys_unique();
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (kind, stats) in &self.objects {
            writeln!(f, "{}s: {}", kind, stats)?;
        }
        if self.unknown_files > 0 {
            writeln!(f, "Unknown files: {}", self.unknown_files)?;
        }
        writeln!(f,
            "Repositories: {} synced, {} from cache",
            self.repos_synced, self.repos_fallback
        )?;
        writeln!(f,
            "VRPs: {} total, {} unique",
            self.vrps_total, self.vrps_unique
        )?;
        writeln!(f,
            "VAPs: {} total, {} unique",
            self.vaps_total, self.vaps_unique
        )?;
        write!(f,
            "Router keys: {} total, {} unique",
            self.router_keys_total, self.router_keys_unique
        )
    }
}


//------------ ObjectStats ---------------------------------------------------

/// The counters for one object type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ObjectStats {
    pub total: usize,
    pub valid: usize,
    pub parse_failed: usize,
    pub digest_failed: usize,
    pub chain_failed: usize,
    pub stale: usize,
}

impl fmt::Display for ObjectStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} total, {} valid", self.total, self.valid)?;
        if self.parse_failed > 0 {
            write!(f, ", {} malformed", self.parse_failed)?;
        }
        if self.digest_failed > 0 {
            write!(f, ", {} hash mismatch", self.digest_failed)?;
        }
        if self.chain_failed > 0 {
            write!(f, ", {} invalid", self.chain_failed)?;
        }
        if self.stale > 0 {
            write!(f, ", {} stale", self.stale)?;
        }
        Ok(())
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::{DigestMismatch, Stale};

    #[test]
    fn record_results() {
        let mut stats = Stats::new();
        stats.record(ObjectType::Roa, &Ok::<_, ObjectError>(()));
        stats.record::<()>(ObjectType::Roa, &Err(DigestMismatch.into()));
        stats.record::<()>(ObjectType::Roa, &Err(ObjectError::chain("no")));
        stats.record::<()>(ObjectType::Mft, &Err(Stale.into()));
        assert_eq!(stats.object(ObjectType::Roa), ObjectStats {
            total: 3, valid: 1, parse_failed: 0, digest_failed: 1,
            chain_failed: 1, stale: 0
        });
        assert_eq!(stats.object(ObjectType::Mft).stale, 1);
        assert_eq!(stats.object(ObjectType::Cer), ObjectStats::default());
        assert_eq!(
            stats.to_string().lines().next(),
            Some("manifests: 1 total, 0 valid, 1 stale")
        );
    }
}
