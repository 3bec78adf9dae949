//! Processing the manifest of a CA.
//!
//! A CA’s manifest is looked for in two places: the tree just fetched from
//! the repository and the tree of previously validated objects. Both
//! candidates are validated independently together with the CRL they list.
//! The better of the valid candidates is chosen via [`mft_compare`] and
//! decides which files of the CA are processed.

use std::cmp::Ordering;
use log::{debug, warn};
use crate::error::{ObjectError, Stale};
use crate::repository::crl::Crl;
use crate::repository::manifest::{mft_compare, Manifest, ManifestHash};
use crate::repository::object::{Object, ObjectType};
use crate::uri::Rsync;
use super::covering::{validate_cert, validate_crl};
use super::crawl::ValidationContext;
use super::provider::Provider;
use super::repo::Cache;


//------------ ManifestChild -------------------------------------------------

/// A file listed on a valid manifest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestChild {
    pub kind: ObjectType,
    pub uri: Rsync,
    pub hash: ManifestHash,

    /// Whether the file should be taken from the fetched tree.
    pub fetched: bool,
}


//------------ process_manifest ----------------------------------------------

/// Processes the manifest of the CA with index `ca`.
///
/// If `fetched` is false, the repository couldn’t be fetched and only the
/// validated tree is considered.
///
/// On success, the CRL of the manifest is added to the context and the
/// files listed on the manifest are returned in dispatch order, without
/// the CRL. If the chosen manifest is stale, the CRL is still added but
/// [`Stale`] is returned and none of the files should be processed. A
/// stale manifest is never promoted into the validated tree.
pub fn process_manifest<P: Provider>(
    provider: &P,
    cache: &Cache,
    ctx: &mut ValidationContext,
    ca: usize,
    fetched: bool,
) -> Result<Vec<ManifestChild>, ObjectError> {
    let mft_uri = manifest_uri(ctx, ca)?;

    let fresh = if fetched {
        load_candidate(provider, cache, ctx, ca, &mft_uri, true)
    }
    else {
        Ok(None)
    };
    let cached = load_candidate(provider, cache, ctx, ca, &mft_uri, false);

    let (fresh, fresh_err) = split(fresh);
    let (cached, cached_err) = split(cached);
    if let Some(err) = fresh_err.as_ref() {
        if cached.is_some() {
            warn!(
                "{}: fetched manifest rejected: {}. Using cached manifest.",
                mft_uri, err
            );
        }
    }
    let chosen = match mft_compare(
        fresh.as_ref().map(|item| &item.manifest),
        cached.as_ref().map(|item| &item.manifest),
    ) {
        Ordering::Less => cached,
        _ => fresh.or(cached),
    };
    let chosen = match chosen {
        Some(chosen) => chosen,
        None => {
            return Err(fresh_err.or(cached_err).unwrap_or_else(|| {
                ObjectError::chain("manifest not found")
            }))
        }
    };

    let stale = chosen.manifest.check_stale(ctx.now);
    if chosen.fetched && stale.is_ok() {
        for uri in [&mft_uri, &chosen.crl_uri] {
            if let Err(err) = cache.promote(uri) {
                warn!("Failed to store validated {}: {}", uri, err);
            }
        }
    }
    ctx.stats.record::<()>(ObjectType::Crl, &Ok(()));
    if let Some(rejected) = ctx.crls.insert(chosen.crl) {
        debug!(
            "{}: ignoring second CRL for {}",
            chosen.crl_uri, rejected.authority_key_identifier()
        );
    }

    stale.map_err(|Stale| {
        warn!(
            "{}: stale manifest, valid from {} until {}",
            mft_uri,
            chosen.manifest.this_update(), chosen.manifest.next_update()
        );
        ObjectError::from(Stale)
    })?;

    let base = mft_uri.parent().ok_or_else(|| {
        ObjectError::chain("manifest URI without a path")
    })?;
    let mut res = Vec::with_capacity(chosen.manifest.len());
    for item in chosen.manifest.files() {
        let kind = match item.kind() {
            Some(ObjectType::Crl) => continue,
            Some(ObjectType::Mft) => {
                debug!("{}: ignoring listed manifest {}", mft_uri, item.file());
                continue
            }
            Some(kind) => kind,
            None => {
                debug!("{}: unknown file type {}", mft_uri, item.file());
                ctx.stats.unknown_file();
                continue
            }
        };
        let uri = match base.join(item.file()) {
            Ok(uri) => uri,
            Err(err) => {
                warn!("{}: bad file name {}: {}", mft_uri, item.file(), err);
                continue
            }
        };
        res.push(ManifestChild {
            kind, uri, hash: *item.hash(), fetched: chosen.fetched
        });
    }
    res.sort_by_key(|child| child.kind.dispatch_rank());
    Ok(res)
}

/// Returns the manifest URI of a CA.
fn manifest_uri(
    ctx: &ValidationContext, ca: usize
) -> Result<Rsync, ObjectError> {
    ctx.auth.get(ca).and_then(|auth| {
        auth.cert().rpki_manifest().cloned()
    }).ok_or_else(|| ObjectError::chain("CA without manifest"))
}

fn split<T>(
    res: Result<Option<T>, ObjectError>
) -> (Option<T>, Option<ObjectError>) {
    match res {
        Ok(some) => (some, None),
        Err(err) => (None, Some(err)),
    }
}


//------------ Candidate -----------------------------------------------------

/// A manifest that has been validated along with its CRL.
struct Candidate {
    manifest: Manifest,
    crl: Crl,
    crl_uri: Rsync,
    fetched: bool,
}

/// Loads and validates the manifest from one of the trees.
///
/// Returns `Ok(None)` if there is no manifest in that tree.
fn load_candidate<P: Provider>(
    provider: &P,
    cache: &Cache,
    ctx: &ValidationContext,
    ca: usize,
    mft_uri: &Rsync,
    fetched: bool,
) -> Result<Option<Candidate>, ObjectError> {
    let path = if fetched {
        cache.repo_path(mft_uri)
    }
    else {
        cache.valid_path(mft_uri)
    };
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(_) => return Ok(None)
    };
    let manifest = match provider.decode(ObjectType::Mft, &data, None)? {
        Object::Mft(manifest) => manifest,
        _ => return Err(ObjectError::parse("not a manifest"))
    };
    let crl_item = manifest.crl().ok_or_else(|| {
        ObjectError::chain("manifest without CRL")
    })?;
    let crl_uri = mft_uri.parent().and_then(|base| {
        base.join(crl_item.file()).ok()
    }).ok_or_else(|| ObjectError::parse("invalid CRL file name"))?;
    let crl_path = if fetched {
        cache.repo_path(&crl_uri)
    }
    else {
        cache.valid_path(&crl_uri)
    };
    let crl_data = std::fs::read(crl_path).map_err(|_| {
        ObjectError::chain(format!("CRL {} not found", crl_uri))
    })?;
    let crl = match provider.decode(
        ObjectType::Crl, &crl_data, Some(crl_item.hash().as_slice())
    )? {
        Object::Crl(crl) => crl,
        _ => return Err(ObjectError::parse("not a CRL"))
    };
    validate_crl(provider, &ctx.auth, &crl, ca, ctx.now)?;
    if manifest.ee().is_ca() || manifest.ee().is_router() {
        return Err(ObjectError::chain("manifest signed by non-EE certificate"))
    }
    validate_cert(provider, &ctx.auth, manifest.ee(), ca, &crl, ctx.now)?;
    Ok(Some(Candidate { manifest, crl, crl_uri, fetched }))
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::repository::x509::Time;
    use crate::validation::test::{
        file_and_hash, manifest, CertBuilder, CrlBuilder, JsonProvider,
        TestDir,
    };

    const REPO: &str = "repo/example.net/repo/ca1";
    const VALID: &str = "valid/example.net/repo/ca1";

    struct Setup {
        dir: TestDir,
        cache: Cache,
        ctx: ValidationContext,
        ca: usize,
    }

    fn setup() -> Setup {
        let dir = TestDir::new();
        let cache = Cache::new(dir.path());
        cache.prepare().unwrap();
        let mut ctx = ValidationContext::new(Time::now());
        let ca = ctx.auth.insert(
            CertBuilder::ca(1).as_resources(&["65000-65100"]).build(),
            None, "ta".into()
        ).unwrap();
        Setup { dir, cache, ctx, ca }
    }

    /// Writes a manifest with the given number into a tree.
    fn publish(
        setup: &Setup, tree: &str, number: &str, next_update: &str,
        files: &[(&str, &str)],
    ) {
        let crl = CrlBuilder::new(1).to_vec();
        let mut items = vec![file_and_hash("ca1.crl", &crl)];
        items.extend(files.iter().map(|(name, data)| {
            file_and_hash(name, data.as_bytes())
        }));
        let ee = CertBuilder::ee(11).issuer(1);
        setup.dir.write(format!("{}/ca1.crl", tree), &crl);
        setup.dir.write(
            format!("{}/ca1.mft", tree),
            &manifest(number, "2020-01-01T00:00:00Z", next_update, items, &ee)
        );
        for (name, data) in files {
            setup.dir.write(format!("{}/{}", tree, name), data.as_bytes());
        }
    }

    fn process(setup: &mut Setup, fetched: bool) -> Result<
        Vec<ManifestChild>, ObjectError
    > {
        process_manifest(
            &JsonProvider, &setup.cache, &mut setup.ctx, setup.ca, fetched
        )
    }

    #[test]
    fn dispatch_order() {
        let mut setup = setup();
        publish(&setup, REPO, "01", "2100-01-01T00:00:00Z", &[
            ("b.roa", "roa"), ("c.gbr", "gbr"), ("a.cer", "cer"),
            ("x.txt", "txt"), ("d.asa", "asa"),
        ]);
        let children = process(&mut setup, true).unwrap();
        let kinds: Vec<_> = children.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            [ObjectType::Cer, ObjectType::Roa, ObjectType::Gbr,
             ObjectType::Aspa]
        );
        assert_eq!(
            children[0].uri.to_string(), "rsync://example.net/repo/ca1/a.cer"
        );
        assert!(children.iter().all(|child| child.fetched));
        assert_eq!(setup.ctx.stats.object(ObjectType::Crl).valid, 1);
        assert_eq!(setup.ctx.crls.len(), 1);

        // Manifest and CRL have been promoted.
        assert!(setup.dir.path().join(VALID).join("ca1.mft").exists());
        assert!(setup.dir.path().join(VALID).join("ca1.crl").exists());
    }

    #[test]
    fn prefer_newer_cached_manifest() {
        let mut setup = setup();
        publish(&setup, REPO, "01", "2100-01-01T00:00:00Z", &[
            ("old.roa", "old")
        ]);
        publish(&setup, VALID, "0A", "2100-01-01T00:00:00Z", &[
            ("new.roa", "new")
        ]);
        let children = process(&mut setup, true).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].uri.file_name(), "new.roa");
        assert!(!children[0].fetched);
    }

    #[test]
    fn fall_back_to_cache() {
        let mut setup = setup();
        publish(&setup, VALID, "01", "2100-01-01T00:00:00Z", &[
            ("a.roa", "a")
        ]);
        setup.dir.write(format!("{}/ca1.mft", REPO), b"garbage");
        let children = process(&mut setup, true).unwrap();
        assert_eq!(children.len(), 1);
        assert!(!children[0].fetched);
    }

    #[test]
    fn ignore_fetched_tree_after_failed_fetch() {
        let mut setup = setup();
        publish(&setup, REPO, "01", "2100-01-01T00:00:00Z", &[]);
        assert!(process(&mut setup, false).unwrap_err().is_chain());
        assert!(setup.ctx.crls.is_empty());
    }

    #[test]
    fn crl_hash_mismatch() {
        let mut setup = setup();
        publish(&setup, REPO, "01", "2100-01-01T00:00:00Z", &[]);
        setup.dir.write(
            format!("{}/ca1.crl", REPO), &CrlBuilder::new(1).number(2).to_vec()
        );
        assert!(process(&mut setup, true).unwrap_err().is_digest());
    }

    #[test]
    fn stale_manifest() {
        let mut setup = setup();
        publish(&setup, REPO, "01", "2021-01-01T00:00:00Z", &[
            ("a.roa", "a")
        ]);
        assert!(process(&mut setup, true).unwrap_err().is_stale());
        assert_eq!(setup.ctx.crls.len(), 1);

        // Neither the manifest nor its CRL end up in the validated tree.
        assert!(!setup.dir.path().join(VALID).join("ca1.mft").exists());
        assert!(!setup.dir.path().join(VALID).join("ca1.crl").exists());
    }

    #[test]
    fn stale_manifest_keeps_cached_one() {
        let mut setup = setup();
        publish(&setup, VALID, "01", "2100-01-01T00:00:00Z", &[
            ("a.roa", "a")
        ]);
        let cached = std::fs::read(
            setup.dir.path().join(VALID).join("ca1.mft")
        ).unwrap();
        publish(&setup, REPO, "02", "2021-01-01T00:00:00Z", &[
            ("b.roa", "b")
        ]);
        assert!(process(&mut setup, true).unwrap_err().is_stale());
        assert_eq!(
            std::fs::read(setup.dir.path().join(VALID).join("ca1.mft"))
                .unwrap(),
            cached
        );
    }
}
