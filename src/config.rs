//! # Engine Configuration
//!
//! [`Config`] carries every tunable the engine reads. It is a plain value
//! passed into the pipeline; nothing inside the engine consults process
//! environment on its own. [`Config::from_env`] is the single place where
//! the environment-provided compatibility flag is read, and only the CLI
//! calls it.

use std::env;
use std::time::Duration;

/// Environment variable that, when set to a non-empty value, forces
/// full-history clones.
pub const FULL_HISTORY_ENV: &str = "OSC_VERSION";

/// Default number of deepen rounds before a commit is reported missing.
pub const DEFAULT_DEEPEN_LIMIT: u32 = 8;

/// Default number of commits fetched by the first deepen round.
pub const DEFAULT_INITIAL_DEEPEN: u32 = 32;

/// Settings for one invocation of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Retrieve the complete history instead of a shallow clone.
    pub full_history: bool,
    /// Deepen rounds attempted when a commit is missing from a shallow clone.
    pub deepen_limit: u32,
    /// Commits added by the first deepen round; doubled on every round.
    pub initial_deepen: u32,
    /// Worker threads used while scanning packages in project mode.
    pub jobs: usize,
    /// Wall-clock budget for all git operations.
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            full_history: false,
            deepen_limit: DEFAULT_DEEPEN_LIMIT,
            initial_deepen: DEFAULT_INITIAL_DEEPEN,
            jobs: default_jobs(),
            timeout: None,
        }
    }
}

impl Config {
    /// Build the default configuration, honouring the compatibility flag in
    /// the process environment.
    pub fn from_env() -> Self {
        Self {
            full_history: compat_flag_set(env::var_os(FULL_HISTORY_ENV).as_deref()),
            ..Self::default()
        }
    }

    /// Override the scanner worker count. Zero is clamped to one.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The flag is on when the variable is present with any non-empty value.
fn compat_flag_set(value: Option<&std::ffi::OsStr>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
