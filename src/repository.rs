//! # Version-Control Capability
//!
//! The engine never talks to `git` directly. It goes through the
//! [`GitOperations`] trait, which names the primitives the fetcher and the
//! scanner need: clone, fetch, deepen, checkout, submodule update, LFS pull
//! and a few read-only queries.
//!
//! [`DefaultGitOperations`] wraps the system `git` command (see
//! [`crate::git`]) and threads a [`Cancellation`] token through every call.
//! Tests swap in scripted implementations to exercise the fetcher's
//! decision logic without spawning processes.
//!
//! Primitives that run a git command return a [`GitOutput`]; a non-zero
//! exit is reported through `GitOutput::success` so the caller can map it
//! to the failure kind of the phase it belongs to. `Err` is reserved for
//! failures to run git at all and for cancellation.

use std::collections::BTreeMap;
use std::path::Path;

use semver::Version;

use crate::cancel::Cancellation;
use crate::error::Result;
use crate::git::{self, CloneOptions, GitOutput};

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// The installed git version, if known.
    fn version(&self) -> Result<Option<Version>>;

    /// Clone `url` into `dest`.
    fn clone_repo(&self, url: &str, dest: &Path, options: &CloneOptions<'_>) -> Result<GitOutput>;

    /// Whether `commit` is present locally.
    fn has_commit(&self, repo: &Path, commit: &str) -> Result<bool>;

    /// Fetch one commit by id.
    fn fetch_commit(&self, repo: &Path, commit: &str, shallow: bool) -> Result<GitOutput>;

    /// Extend shallow history by `by` commits.
    fn deepen(&self, repo: &Path, by: u32) -> Result<GitOutput>;

    /// Detached checkout of `rev`.
    fn checkout(&self, repo: &Path, rev: &str) -> Result<GitOutput>;

    /// Cone-mode sparse checkout of `subdir`.
    fn sparse_checkout(&self, repo: &Path, subdir: &str) -> Result<GitOutput>;

    /// Recursive submodule update to the pinned commits.
    fn submodule_update(&self, repo: &Path, paths: &[&str], allow_file: bool) -> Result<GitOutput>;

    /// Materialize large-file content.
    fn lfs_pull(&self, repo: &Path, recursive: bool) -> Result<GitOutput>;

    /// Commit at `HEAD`.
    fn head_commit(&self, repo: &Path) -> Result<String>;

    /// Whether history is truncated.
    fn is_shallow(&self, repo: &Path) -> Result<bool>;

    /// Submodule commits pinned by `HEAD` directly below `prefix`.
    fn gitlinks(&self, repo: &Path, prefix: Option<&str>) -> Result<BTreeMap<String, String>>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
#[derive(Debug, Clone, Default)]
pub struct DefaultGitOperations {
    cancel: Cancellation,
    /// Label used in diagnostics for commands not tied to a clone URL.
    url: String,
}

impl DefaultGitOperations {
    pub fn new(cancel: Cancellation) -> Self {
        Self {
            cancel,
            url: String::new(),
        }
    }

    /// Label diagnostics of repository-local commands with `url`.
    pub fn for_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    fn label<'a>(&'a self, repo: &'a Path) -> std::borrow::Cow<'a, str> {
        if self.url.is_empty() {
            repo.to_string_lossy()
        } else {
            std::borrow::Cow::Borrowed(self.url.as_str())
        }
    }
}

impl GitOperations for DefaultGitOperations {
    fn version(&self) -> Result<Option<Version>> {
        git::version(&self.cancel)
    }

    fn clone_repo(&self, url: &str, dest: &Path, options: &CloneOptions<'_>) -> Result<GitOutput> {
        git::clone(url, dest, options, &self.cancel)
    }

    fn has_commit(&self, repo: &Path, commit: &str) -> Result<bool> {
        git::has_commit(repo, commit, &self.cancel, &self.label(repo))
    }

    fn fetch_commit(&self, repo: &Path, commit: &str, shallow: bool) -> Result<GitOutput> {
        git::fetch_commit(repo, commit, shallow, &self.cancel, &self.label(repo))
    }

    fn deepen(&self, repo: &Path, by: u32) -> Result<GitOutput> {
        git::deepen(repo, by, &self.cancel, &self.label(repo))
    }

    fn checkout(&self, repo: &Path, rev: &str) -> Result<GitOutput> {
        git::checkout_detached(repo, rev, &self.cancel, &self.label(repo))
    }

    fn sparse_checkout(&self, repo: &Path, subdir: &str) -> Result<GitOutput> {
        git::sparse_checkout(repo, subdir, &self.cancel, &self.label(repo))
    }

    fn submodule_update(&self, repo: &Path, paths: &[&str], allow_file: bool) -> Result<GitOutput> {
        git::submodule_update(repo, paths, allow_file, &self.cancel, &self.label(repo))
    }

    fn lfs_pull(&self, repo: &Path, recursive: bool) -> Result<GitOutput> {
        git::lfs_pull(repo, recursive, &self.cancel, &self.label(repo))
    }

    fn head_commit(&self, repo: &Path) -> Result<String> {
        git::head_commit(repo, &self.cancel, &self.label(repo))
    }

    fn is_shallow(&self, repo: &Path) -> Result<bool> {
        git::is_shallow(repo, &self.cancel, &self.label(repo))
    }

    fn gitlinks(&self, repo: &Path, prefix: Option<&str>) -> Result<BTreeMap<String, String>> {
        git::gitlinks(repo, prefix, &self.cancel, &self.label(repo))
    }
}
