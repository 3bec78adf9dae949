//! Configuration of a validation run.

use std::path::PathBuf;
use std::time::Duration;
use serde::Deserialize;


//------------ Config --------------------------------------------------------

/// The configuration of a validation run.
///
/// All fields have defaults, so a configuration can be deserialized from
/// any serde format providing only the values that differ.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The directory of the local cache.
    pub cache_dir: PathBuf,

    /// The directory containing the trust anchor locators.
    pub tal_dir: PathBuf,

    /// The maximum duration of the whole run.
    pub watchdog: Duration,

    /// The maximum time to wait for a single repository.
    ///
    /// After it has passed, the repository falls back to the cache.
    pub repo_timeout: Duration,

    /// Whether to use RRDP for repositories that announce it.
    pub prefer_rrdp: bool,

    /// The command to run for rsync.
    pub rsync_command: String,

    /// Additional arguments for the rsync command.
    pub rsync_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_dir: PathBuf::from("cache"),
            tal_dir: PathBuf::from("tals"),
            watchdog: Duration::from_secs(60 * 60),
            repo_timeout: Duration::from_secs(15 * 60),
            prefer_rrdp: false,
            rsync_command: "rsync".into(),
            rsync_args: vec!["-rt".into(), "--delete".into()],
        }
    }
}


//============ Tests =========================================================
