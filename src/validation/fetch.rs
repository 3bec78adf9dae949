//! Fetching repositories.
//!
//! The crawler never fetches anything itself. Instead it sends a
//! [`FetchRequest`] to the fetch task started via [`serve`] and eventually
//! receives exactly one [`FetchResponse`] for it. The actual work is done
//! by a [`Fetcher`].
//!
//! When the crawler closes the request channel, the fetch task cancels
//! the fetcher and waits for all outstanding jobs to be dropped.

use std::{fs, thread};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use crate::config::Config;
use crate::uri::{Https, Rsync};
use super::repo::{RepoKey, SessionState};


//------------ FetchSource ---------------------------------------------------

/// Where to fetch from.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FetchSource {
    /// An rsync module or a single file via rsync.
    Rsync(Rsync),

    /// A single file via HTTPS.
    Https(Https),

    /// An RRDP repository given by its notification URI.
    Rrdp(Https),
}

impl FetchSource {
    pub fn is_rrdp(&self) -> bool {
        matches!(*self, FetchSource::Rrdp(_))
    }
}


//------------ FetchRequest --------------------------------------------------

/// A request to fetch a repository or trust anchor certificate.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FetchRequest {
    /// The repository this request is for.
    pub repo: RepoKey,

    /// The source to fetch from.
    pub source: FetchSource,

    /// The local path to fetch into.
    ///
    /// For a module this is a directory, for a trust anchor certificate a
    /// file.
    pub target: PathBuf,

    /// The last known RRDP session state.
    pub session: Option<SessionState>,
}


//------------ FetchResponse -------------------------------------------------

/// The outcome of a fetch request.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FetchResponse {
    /// The repository the request was for.
    pub repo: RepoKey,

    /// The source that was used.
    pub source: FetchSource,

    /// Whether the target now contains the fetched data.
    pub succeeded: bool,

    /// The new RRDP session state after a successful RRDP fetch.
    pub session: Option<SessionState>,
}

impl FetchResponse {
    pub fn success(
        request: &FetchRequest, session: Option<SessionState>
    ) -> Self {
        FetchResponse {
            repo: request.repo.clone(),
            source: request.source.clone(),
            succeeded: true,
            session,
        }
    }

    pub fn failure(request: &FetchRequest) -> Self {
        FetchResponse {
            repo: request.repo.clone(),
            source: request.source.clone(),
            succeeded: false,
            session: None,
        }
    }
}


//------------ Fetcher -------------------------------------------------------

/// Something that can fetch repositories.
///
/// Fetching is blocking and runs on a thread of its own.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, request: &FetchRequest) -> FetchResponse;

    /// Stops all fetches currently running.
    ///
    /// Called once when the validation run ends. Fetches still running
    /// should return a failure as soon as possible. Any later fetch may
    /// fail right away.
    fn cancel(&self) { }
}


//------------ LocalFetcher --------------------------------------------------

/// A fetcher that trusts whatever is in the cache already.
///
/// Every request succeeds and the RRDP session state is kept as it is.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFetcher;

impl Fetcher for LocalFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchResponse {
        debug!("Using cached {}", request.repo);
        FetchResponse::success(request, request.session.clone())
    }
}


//------------ RsyncFetcher --------------------------------------------------

/// A fetcher that runs an external rsync command.
///
/// Only rsync sources are supported. All other requests fail, so that the
/// crawler falls back to rsync or to the cache.
///
/// Once cancelled, running rsync processes are killed and no new ones are
/// started.
#[derive(Debug)]
pub struct RsyncFetcher {
    command: String,
    args: Vec<String>,
    cancelled: AtomicBool,
}

impl RsyncFetcher {
    /// How often a running rsync process is checked on.
    const POLL_INTERVAL: Duration = Duration::from_millis(50);

    pub fn new(command: String, args: Vec<String>) -> Self {
        RsyncFetcher { command, args, cancelled: AtomicBool::new(false) }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.rsync_command.clone(), config.rsync_args.clone())
    }

    fn rsync(&self, uri: &Rsync, request: &FetchRequest) -> bool {
        let is_dir = uri.path().is_empty() || uri.path().ends_with('/');
        let dir = if is_dir {
            Some(request.target.as_path())
        }
        else {
            request.target.parent()
        };
        if let Some(dir) = dir {
            if let Err(err) = fs::create_dir_all(dir) {
                error!("Failed to create {}: {}", dir.display(), err);
                return false
            }
        }
        info!("rsyncing from {}.", uri);
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args).arg(uri.to_string());
        if is_dir {
            let mut target = request.target.clone().into_os_string();
            target.push("/");
            cmd.arg(target);
        }
        else {
            cmd.arg(&request.target);
        }
        if self.is_cancelled() {
            debug!("Not rsyncing from {}, fetching was cancelled.", uri);
            return false
        }
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!("Failed to run rsync command {}: {}", self.command, err);
                return false
            }
        };
        match self.wait(child) {
            Ok(Some(status)) if status.success() => true,
            Ok(Some(status)) => {
                warn!("rsync {} failed with {}", uri, status);
                false
            }
            Ok(None) => {
                warn!("rsync {} killed, fetching was cancelled.", uri);
                false
            }
            Err(err) => {
                error!("Failed to wait for rsync {}: {}", uri, err);
                false
            }
        }
    }

    /// Waits for an rsync process to finish.
    ///
    /// Returns `Ok(None)` if the process had to be killed because the
    /// fetcher was cancelled.
    fn wait(
        &self, mut child: Child
    ) -> Result<Option<ExitStatus>, std::io::Error> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status))
            }
            if self.is_cancelled() {
                child.kill()?;
                child.wait()?;
                return Ok(None)
            }
            thread::sleep(Self::POLL_INTERVAL);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Fetcher for RsyncFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchResponse {
        match request.source {
            FetchSource::Rsync(ref uri) => {
                if self.rsync(uri, request) {
                    FetchResponse::success(request, None)
                }
                else {
                    FetchResponse::failure(request)
                }
            }
            FetchSource::Https(ref uri) | FetchSource::Rrdp(ref uri) => {
                debug!("No HTTPS support, not fetching {}", uri);
                FetchResponse::failure(request)
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed)
    }
}


//------------ serve ---------------------------------------------------------

/// Runs the fetch task.
///
/// Every request is handed to the fetcher on a blocking thread of its own
/// and the response is sent back once it finishes. The task ends when the
/// request channel is closed. It then cancels the fetcher and drops all
/// jobs that haven’t finished yet.
pub async fn serve(
    fetcher: Arc<dyn Fetcher>,
    mut requests: UnboundedReceiver<FetchRequest>,
    responses: UnboundedSender<FetchResponse>,
) {
    let mut jobs = JoinSet::new();
    loop {
        let request = tokio::select! {
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
            Some(_) = jobs.join_next(), if !jobs.is_empty() => continue,
        };
        let fetcher = fetcher.clone();
        let responses = responses.clone();
        jobs.spawn(async move {
            let failed = FetchResponse::failure(&request);
            let response = match tokio::task::spawn_blocking(move || {
                fetcher.fetch(&request)
            }).await {
                Ok(response) => response,
                Err(err) => {
                    error!("Fetching {} panicked: {}", failed.repo, err);
                    failed
                }
            };
            if responses.send(response).is_err() {
                debug!("Fetch response dropped, crawler has finished.");
            }
        });
    }
    if !jobs.is_empty() {
        debug!("Cancelling {} outstanding fetches.", jobs.len());
    }
    fetcher.cancel();
    jobs.shutdown().await;
}


//============ Tests =========================================================
