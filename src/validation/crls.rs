//! Tracking the CRLs of validated CAs.

use std::collections::HashMap;
use crate::crypto::KeyIdentifier;
use crate::repository::crl::Crl;


//------------ CrlTracker ----------------------------------------------------

/// The CRLs currently in use keyed by the key identifier of their issuer.
///
/// There is at most one CRL per issuer. The first CRL inserted for an
/// issuer stays in place.
#[derive(Clone, Debug, Default)]
pub struct CrlTracker {
    crls: HashMap<KeyIdentifier, Crl>,
}

impl CrlTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a CRL.
    ///
    /// If there already is a CRL for the same issuer, the new CRL is not
    /// inserted but handed back to the caller.
    pub fn insert(&mut self, crl: Crl) -> Option<Crl> {
        let aki = crl.authority_key_identifier();
        if self.crls.contains_key(&aki) {
            return Some(crl)
        }
        self.crls.insert(aki, crl);
        None
    }

    /// Returns the CRL of the issuer with the given key identifier.
    pub fn get(&self, aki: KeyIdentifier) -> Option<&Crl> {
        self.crls.get(&aki)
    }

    pub fn len(&self) -> usize {
        self.crls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crls.is_empty()
    }
}


//============ Tests =========================================================
