//! The tree of validated CA certificates.
//!
//! Certificates are kept in an arena and refer to their issuer by index.
//! A trust anchor is its own parent. Since an index is only ever handed out
//! for a certificate that has already been inserted, the parent links
//! cannot form cycles.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use crate::crypto::KeyIdentifier;
use crate::error::ChainValidationError;
use crate::repository::cert::Cert;
use crate::repository::x509::Time;


//------------ AuthTree ------------------------------------------------------

/// The arena of validated certificates indexed by their SKI.
#[derive(Clone, Debug, Default)]
pub struct AuthTree {
    records: Vec<Auth>,
    by_ski: HashMap<KeyIdentifier, usize>,
}

impl AuthTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a validated certificate.
    ///
    /// If `parent` is `None`, the certificate becomes a root of its own.
    /// Otherwise `parent` must be the index of a record already present.
    ///
    /// Fails if a certificate with the same SKI has been inserted before.
    pub fn insert(
        &mut self,
        cert: Cert,
        parent: Option<usize>,
        tal: Arc<str>,
    ) -> Result<usize, ChainValidationError> {
        let ski = cert.subject_key_identifier();
        if self.by_ski.contains_key(&ski) {
            return Err(ChainValidationError::new(format!(
                "duplicate subject key identifier {}", ski
            )))
        }
        let idx = self.records.len();
        let (parent, expires) = match parent {
            Some(parent) => {
                let issuer = self.records.get(parent).ok_or_else(|| {
                    ChainValidationError::new("unknown issuer index")
                })?;
                (parent, issuer.expires.min(cert.expires()))
            }
            None => (idx, cert.expires())
        };
        self.records.push(Auth { cert, parent, expires, tal });
        self.by_ski.insert(ski, idx);
        Ok(idx)
    }

    /// Returns the index of the certificate with the given SKI.
    pub fn find_by_ski(&self, ski: KeyIdentifier) -> Option<usize> {
        self.by_ski.get(&ski).copied()
    }

    /// Returns the record at the given index.
    pub fn get(&self, idx: usize) -> Option<&Auth> {
        self.records.get(idx)
    }

    /// Returns the parent record of the given index.
    ///
    /// A root is its own parent.
    pub fn parent(&self, idx: usize) -> Option<&Auth> {
        self.get(idx).and_then(|auth| self.get(auth.parent))
    }

    /// Returns an iterator over the chain starting at `idx` up to its root.
    pub fn chain(&self, idx: usize) -> Chain {
        Chain { tree: self, next: Some(idx) }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}


//------------ Auth ----------------------------------------------------------

/// A validated CA certificate and its position in the tree.
#[derive(Clone, Debug)]
pub struct Auth {
    cert: Cert,
    parent: usize,

    /// The earliest expiry of the certificate and all its ancestors.
    expires: Time,

    /// The name of the TAL this certificate was validated under.
    tal: Arc<str>,
}

impl Auth {
    pub fn cert(&self) -> &Cert {
        &self.cert
    }

    pub fn parent_idx(&self) -> usize {
        self.parent
    }

    pub fn expires(&self) -> Time {
        self.expires
    }

    pub fn tal(&self) -> &Arc<str> {
        &self.tal
    }
}


//------------ Chain ---------------------------------------------------------

/// An iterator walking from a record up to its root.
pub struct Chain<'a> {
    tree: &'a AuthTree,
    next: Option<usize>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = (usize, &'a Auth);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let auth = self.tree.get(idx)?;
        self.next = if auth.parent == idx { None } else { Some(auth.parent) };
        Some((idx, auth))
    }
}

impl fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Chain").field("next", &self.next).finish()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::validation::test::CertBuilder;

    #[test]
    fn insert_and_find() {
        let mut tree = AuthTree::new();
        let ta = CertBuilder::ca(1).as_resources(&["0-4294967295"]).build();
        let child = CertBuilder::ca(2).issuer(1).as_resources(&["65000"])
            .build();
        let ta_idx = tree.insert(ta, None, "ta".into()).unwrap();
        let child_idx = tree.insert(
            child.clone(), Some(ta_idx), "ta".into()
        ).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree.find_by_ski(child.subject_key_identifier()), Some(child_idx)
        );
        assert_eq!(tree.get(ta_idx).unwrap().parent_idx(), ta_idx);
        assert_eq!(tree.parent(child_idx).unwrap().parent_idx(), ta_idx);
        assert_eq!(
            tree.chain(child_idx).map(|(idx, _)| idx).collect::<Vec<_>>(),
            [child_idx, ta_idx]
        );
    }

    #[test]
    fn reject_duplicate_ski() {
        let mut tree = AuthTree::new();
        let ta = CertBuilder::ca(1).as_resources(&["0-4294967295"]).build();
        let ta_idx = tree.insert(ta, None, "ta".into()).unwrap();
        let first = CertBuilder::ca(2).issuer(1).as_resources(&["65000"])
            .build();
        tree.insert(first, Some(ta_idx), "ta".into()).unwrap();

        // Same key and therefore same SKI but otherwise different and with
        // perfectly fine resources.
        let second = CertBuilder::ca(2).issuer(1).as_resources(&["65001"])
            .serial(7).build();
        assert!(tree.insert(second, Some(ta_idx), "ta".into()).is_err());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn inherited_expiry() {
        let mut tree = AuthTree::new();
        let ta = CertBuilder::ca(1).not_after("2030-01-01T00:00:00Z").build();
        let child = CertBuilder::ca(2).issuer(1)
            .not_after("2040-01-01T00:00:00Z").build();
        let ta_idx = tree.insert(ta, None, "ta".into()).unwrap();
        let idx = tree.insert(child, Some(ta_idx), "ta".into()).unwrap();
        assert_eq!(
            tree.get(idx).unwrap().expires().to_string(),
            tree.get(ta_idx).unwrap().expires().to_string()
        );
    }
}
