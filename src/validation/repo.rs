//! Repositories and the local cache.
//!
//! The cache directory holds the trees as fetched from repositories, the
//! tree of objects that have been successfully validated before, the trust
//! anchor certificates, and the RRDP session state:
//!
//! ```text
//! <cache>/repo/<host>/<module>/...      fetched
//! <cache>/valid/<host>/<module>/...     validated
//! <cache>/ta/<tal>.cer
//! <cache>/rrdp/<sha256 of notify URI>.state
//! ```
//!
//! The [`RepoTable`] keeps track of which repositories are being fetched
//! and which objects are waiting for that.

use std::{error, fmt, fs, io};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;
use crate::crypto::DigestAlgorithm;
use crate::uri::{Https, Rsync, RsyncModule};
use crate::util::hex;


//------------ Cache ---------------------------------------------------------

/// The local cache directory.
#[derive(Clone, Debug)]
pub struct Cache {
    base: PathBuf,
}

impl Cache {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Cache { base: base.into() }
    }

    /// Creates the directory structure if it doesn’t exist yet.
    pub fn prepare(&self) -> Result<(), io::Error> {
        for dir in ["repo", "valid", "ta", "rrdp"] {
            fs::create_dir_all(self.base.join(dir))?;
        }
        Ok(())
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns the directory a module is fetched into.
    pub fn repo_dir(&self, module: &RsyncModule) -> PathBuf {
        self.base.join("repo").join(module.cache_path())
    }

    /// Returns the path of a fetched file.
    pub fn repo_path(&self, uri: &Rsync) -> PathBuf {
        self.base.join("repo").join(uri.cache_path())
    }

    /// Returns the path of a validated file.
    pub fn valid_path(&self, uri: &Rsync) -> PathBuf {
        self.base.join("valid").join(uri.cache_path())
    }

    /// Returns the path of the certificate of the named trust anchor.
    pub fn ta_path(&self, tal: &str) -> PathBuf {
        self.base.join("ta").join(format!("{}.cer", tal))
    }

    /// Returns the path of the session state of an RRDP repository.
    pub fn session_path(&self, notify: &Https) -> PathBuf {
        let digest = DigestAlgorithm::default().digest(
            notify.to_string().as_bytes()
        );
        self.base.join("rrdp").join(
            format!("{}.state", hex::encode_string(digest.as_ref()))
        )
    }

    /// Reads a file from the fetched or validated tree.
    ///
    /// If `fetched` is true, the fetched tree is tried first. Returns the
    /// content and whether it came from the fetched tree. Returns `None` if
    /// the file is in neither tree.
    pub fn read(
        &self, uri: &Rsync, fetched: bool
    ) -> Option<(Vec<u8>, bool)> {
        if fetched {
            if let Some(data) = read_existing(&self.repo_path(uri)) {
                return Some((data, true))
            }
        }
        read_existing(&self.valid_path(uri)).map(|data| (data, false))
    }

    /// Copies a fetched file into the validated tree.
    pub fn promote(&self, uri: &Rsync) -> Result<(), io::Error> {
        let data = fs::read(self.repo_path(uri))?;
        write_atomic(&self.valid_path(uri), &data)
    }

    /// Reads the session state for an RRDP repository.
    ///
    /// A missing or broken state file results in `None`.
    pub fn read_session(&self, notify: &Https) -> Option<SessionState> {
        let path = self.session_path(notify);
        let data = read_existing(&path)?;
        match std::str::from_utf8(&data).ok()?.parse() {
            Ok(state) => Some(state),
            Err(err) => {
                debug!("Ignoring session state {}: {}", path.display(), err);
                None
            }
        }
    }

    /// Replaces the session state for an RRDP repository.
    pub fn write_session(
        &self, notify: &Https, state: &SessionState
    ) -> Result<(), io::Error> {
        write_atomic(
            &self.session_path(notify), state.to_string().as_bytes()
        )
    }
}

fn read_existing(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Some(data),
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                debug!("Failed to read {}: {}", path.display(), err);
            }
            None
        }
    }
}

/// Writes a file by writing a temporary file and renaming it.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}


//------------ SessionState --------------------------------------------------

/// The state of an RRDP session.
///
/// It is stored as three lines: the session ID, the serial number, and
/// the last-modified value of the notification file which may be empty.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub serial: u64,
    pub last_modified: Option<String>,
}

impl FromStr for SessionState {
    type Err = SessionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s.lines();
        let session_id = lines.next().ok_or(SessionStateError)?
            .trim().parse().map_err(|_| SessionStateError)?;
        let serial = lines.next().ok_or(SessionStateError)?
            .trim().parse().map_err(|_| SessionStateError)?;
        let last_modified = lines.next().map(str::trim).filter(|line| {
            !line.is_empty()
        }).map(Into::into);
        if lines.any(|line| !line.trim().is_empty()) {
            return Err(SessionStateError)
        }
        Ok(SessionState { session_id, serial, last_modified })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.session_id)?;
        writeln!(f, "{}", self.serial)?;
        writeln!(f, "{}", self.last_modified.as_deref().unwrap_or(""))
    }
}


//------------ RepoKey -------------------------------------------------------

/// Identifies something that needs to be fetched.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum RepoKey {
    /// The certificate of the named trust anchor.
    Ta(String),

    /// An rsync module or the RRDP repository publishing it.
    Module(RsyncModule),
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RepoKey::Ta(ref name) => write!(f, "trust anchor {}", name),
            RepoKey::Module(ref module) => module.fmt(f),
        }
    }
}


//------------ RepoState -----------------------------------------------------

/// The state of a repository during a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RepoState {
    /// A fetch is in progress and has to finish before the deadline.
    Fetching { deadline: Instant },

    /// Fetching has finished.
    ///
    /// If it failed, `fetched` is false and only the validated tree can be
    /// used.
    Done { fetched: bool },
}


//------------ RepoTable -----------------------------------------------------

/// All repositories of a run with the items waiting for them.
#[derive(Debug)]
pub struct RepoTable<T> {
    repos: HashMap<RepoKey, Repo<T>>,
}

#[derive(Debug)]
struct Repo<T> {
    state: RepoState,
    waiting: Vec<T>,
}

impl<T> RepoTable<T> {
    pub fn new() -> Self {
        RepoTable { repos: HashMap::new() }
    }

    /// Returns the state of a repository or `None` if it is unknown.
    pub fn state(&self, key: &RepoKey) -> Option<RepoState> {
        self.repos.get(key).map(|repo| repo.state)
    }

    /// Marks a repository as being fetched.
    ///
    /// Returns `false` if the repository was known already.
    pub fn start(&mut self, key: RepoKey, deadline: Instant) -> bool {
        if self.repos.contains_key(&key) {
            return false
        }
        self.repos.insert(key, Repo {
            state: RepoState::Fetching { deadline },
            waiting: Vec::new(),
        });
        true
    }

    /// Moves the deadline of a repository that is still being fetched.
    pub fn restart(&mut self, key: &RepoKey, deadline: Instant) {
        if let Some(repo) = self.repos.get_mut(key) {
            if let RepoState::Fetching { .. } = repo.state {
                repo.state = RepoState::Fetching { deadline }
            }
        }
    }

    /// Adds an item to the wait list of a repository.
    ///
    /// Returns the item back if the repository is not being fetched.
    pub fn wait(&mut self, key: &RepoKey, item: T) -> Option<T> {
        match self.repos.get_mut(key) {
            Some(repo) if matches!(repo.state, RepoState::Fetching { .. }) => {
                repo.waiting.push(item);
                None
            }
            _ => Some(item)
        }
    }

    /// Marks a repository as done and returns its wait list.
    ///
    /// Returns `None` if the repository wasn’t being fetched.
    pub fn finish(
        &mut self, key: &RepoKey, fetched: bool
    ) -> Option<Vec<T>> {
        let repo = self.repos.get_mut(key)?;
        if !matches!(repo.state, RepoState::Fetching { .. }) {
            return None
        }
        repo.state = RepoState::Done { fetched };
        Some(std::mem::take(&mut repo.waiting))
    }

    /// Returns the earliest deadline of all repositories being fetched.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.repos.values().filter_map(|repo| match repo.state {
            RepoState::Fetching { deadline } => Some(deadline),
            RepoState::Done { .. } => None,
        }).min()
    }

    /// Returns the repositories whose deadline has passed at `now`.
    pub fn expired(&self, now: Instant) -> Vec<RepoKey> {
        self.repos.iter().filter_map(|(key, repo)| match repo.state {
            RepoState::Fetching { deadline } if deadline <= now => {
                Some(key.clone())
            }
            _ => None
        }).collect()
    }
}

impl<T> Default for RepoTable<T> {
    fn default() -> Self {
        Self::new()
    }
}


//------------ SessionStateError ---------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionStateError;

impl fmt::Display for SessionStateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid RRDP session state")
    }
}

impl error::Error for SessionStateError { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use crate::validation::test::TestDir;

    fn module(s: &str) -> RepoKey {
        RepoKey::Module(Rsync::from_str(s).unwrap().module().clone())
    }

    #[test]
    fn cache_paths() {
        let cache = Cache::new("/var/cache/rpki");
        let uri = Rsync::from_str("rsync://Example.net/repo/ca/a.roa")
            .unwrap();
        assert_eq!(
            cache.repo_path(&uri),
            Path::new("/var/cache/rpki/repo/example.net/repo/ca/a.roa")
        );
        assert_eq!(
            cache.valid_path(&uri),
            Path::new("/var/cache/rpki/valid/example.net/repo/ca/a.roa")
        );
        assert_eq!(
            cache.repo_dir(uri.module()),
            Path::new("/var/cache/rpki/repo/example.net/repo")
        );
        assert_eq!(
            cache.ta_path("arin"), Path::new("/var/cache/rpki/ta/arin.cer")
        );
        let notify = Https::from_str(
            "https://rrdp.example.net/notification.xml"
        ).unwrap();
        let path = cache.session_path(&notify);
        assert!(path.starts_with("/var/cache/rpki/rrdp"));
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap().len(), 64 + 6
        );
    }

    #[test]
    fn read_and_promote() {
        let dir = TestDir::new();
        let cache = Cache::new(dir.path());
        cache.prepare().unwrap();
        let uri = Rsync::from_str("rsync://example.net/repo/a.roa").unwrap();
        assert!(cache.read(&uri, true).is_none());

        dir.write("valid/example.net/repo/a.roa", b"old");
        assert_eq!(cache.read(&uri, true), Some((b"old".to_vec(), false)));

        dir.write("repo/example.net/repo/a.roa", b"new");
        assert_eq!(cache.read(&uri, true), Some((b"new".to_vec(), true)));
        assert_eq!(cache.read(&uri, false), Some((b"old".to_vec(), false)));

        cache.promote(&uri).unwrap();
        assert_eq!(cache.read(&uri, false), Some((b"new".to_vec(), false)));
    }

    #[test]
    fn session_state() {
        let text = "7a8a3ab7-a5a7-4c46-9bf7-1c2a5d4d3a11\n12\n\
                    Tue, 01 Oct 2024 10:00:00 GMT\n";
        let state = SessionState::from_str(text).unwrap();
        assert_eq!(state.serial, 12);
        assert_eq!(
            state.last_modified.as_deref(),
            Some("Tue, 01 Oct 2024 10:00:00 GMT")
        );
        assert_eq!(state.to_string(), text);

        let state = SessionState::from_str(
            "7a8a3ab7-a5a7-4c46-9bf7-1c2a5d4d3a11\n12\n\n"
        ).unwrap();
        assert_eq!(state.last_modified, None);
        assert!(SessionState::from_str("nope\n12\n\n").is_err());
        assert!(
            SessionState::from_str(
                "7a8a3ab7-a5a7-4c46-9bf7-1c2a5d4d3a11\n"
            ).is_err()
        );

        let dir = TestDir::new();
        let cache = Cache::new(dir.path());
        cache.prepare().unwrap();
        let notify = Https::from_str("https://example.net/rrdp.xml").unwrap();
        assert_eq!(cache.read_session(&notify), None);
        cache.write_session(&notify, &state).unwrap();
        assert_eq!(cache.read_session(&notify), Some(state));
    }

    #[test]
    fn wait_lists() {
        let mut table = RepoTable::new();
        let key = module("rsync://example.net/repo/");
        let deadline = Instant::now() + Duration::from_secs(60);
        assert_eq!(table.state(&key), None);
        assert_eq!(table.wait(&key, 0), Some(0));

        assert!(table.start(key.clone(), deadline));
        assert!(!table.start(key.clone(), deadline));
        assert_eq!(table.next_deadline(), Some(deadline));
        assert_eq!(table.wait(&key, 1), None);
        assert_eq!(table.wait(&key, 2), None);

        assert_eq!(table.finish(&key, true), Some(vec![1, 2]));
        assert_eq!(table.state(&key), Some(RepoState::Done { fetched: true }));
        assert_eq!(table.finish(&key, false), None);
        assert_eq!(table.wait(&key, 3), Some(3));
        assert_eq!(table.next_deadline(), None);
    }

    #[test]
    fn expire_repos() {
        let mut table = RepoTable::<u8>::new();
        let now = Instant::now();
        let early = module("rsync://example.net/early/");
        let late = module("rsync://example.net/late/");
        table.start(early.clone(), now);
        table.start(late.clone(), now + Duration::from_secs(60));
        assert_eq!(table.next_deadline(), Some(now));
        assert_eq!(table.expired(now), vec![early.clone()]);
        table.finish(&early, false);
        assert_eq!(
            table.next_deadline(), Some(now + Duration::from_secs(60))
        );
        table.restart(&late, now + Duration::from_secs(120));
        assert_eq!(
            table.next_deadline(), Some(now + Duration::from_secs(120))
        );
    }
}
