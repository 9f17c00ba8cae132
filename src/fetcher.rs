//! # Repository Fetcher
//!
//! Resolves a [`Target`] into a working tree pinned at an exact commit.
//!
//! ## Process
//!
//! 1.  **Clone**: `git clone` at the depth chosen by the strategy. Named
//!     refs are passed as `--branch`, so branches and tags are checked out by
//!     the clone itself. A name the remote rejects there (a SHA-256 commit
//!     id, say) is fetched explicitly after cloning the default branch.
//! 2.  **Commit resolution**: for a commit id, fetch it directly and, if the
//!     history is shallow and the commit is still missing, deepen the fetch
//!     round by round until it appears or the schedule runs out. The commit
//!     is then checked out detached.
//! 3.  **Sparse subdir**: when a subdir is requested outside project mode,
//!     the working tree is narrowed to it if the local git supports
//!     cone-mode sparse checkout.
//! 4.  **Submodules**: updated recursively to the commits the containing
//!     tree records, never to a submodule's branch tip.
//! 5.  **Large files**: clones always leave LFS pointers in place; the
//!     content is pulled afterwards unless the target opted out.
//!
//! `HEAD` is read after all of the above, so [`CloneResult::head_commit`]
//! always reflects the post-checkout state of the full repository.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use semver::Version;

use crate::error::{Error, Result};
use crate::git::{describe_clone_failure, is_missing_ref, CloneOptions, GitOutput};
use crate::lfs;
use crate::reference::{is_object_id, LfsMode, RefSpec, Target};
use crate::repository::GitOperations;
use crate::strategy::CloneStrategy;
use crate::submodules::GITMODULES;

/// Oldest git whose cone-mode sparse checkout we rely on.
pub const MIN_SPARSE_GIT: Version = Version::new(2, 27, 0);

/// A working tree produced by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneResult {
    pub working_tree_path: PathBuf,
    /// Commit at `HEAD` after checkout.
    pub head_commit: String,
    pub is_shallow: bool,
}

/// Drives a [`GitOperations`] implementation through clone, ref resolution,
/// submodule and LFS materialization.
pub struct RepositoryFetcher<'a> {
    git: &'a dyn GitOperations,
    materialize: bool,
}

impl<'a> RepositoryFetcher<'a> {
    pub fn new(git: &'a dyn GitOperations) -> Self {
        Self {
            git,
            materialize: true,
        }
    }

    /// Skip submodule checkout and LFS downloads. The containing tree still
    /// records the pinned commits, which is all project scanning needs.
    pub fn metadata_only(mut self) -> Self {
        self.materialize = false;
        self
    }

    /// Clone `target` into `dest`, which must be absent or empty.
    pub fn fetch(&self, target: &Target, strategy: &CloneStrategy, dest: &Path) -> Result<CloneResult> {
        let url = target.clone_url();
        let allow_file = target.source().scheme() == "file";
        info!("Cloning {} at {} into {}", url, target.ref_spec(), dest.display());

        let options = CloneOptions {
            depth: strategy.depth,
            branch: strategy.branch.as_deref(),
            all_branches: strategy.all_branches,
            allow_file,
        };
        let output = self.git.clone_repo(url, dest, &options)?;
        let mut unadvertised = None;
        if !output.success {
            match target.ref_spec() {
                RefSpec::NamedRef(name) if is_missing_ref(&output.stderr) => {
                    debug!("{} is not a branch or tag of {}, fetching it", name, url);
                    self.clone_default(target, strategy, dest)?;
                    unadvertised = Some((name.as_str(), output.stderr));
                }
                _ => {
                    return Err(Error::CloneFailed {
                        url: url.to_string(),
                        r#ref: target.ref_spec().to_string(),
                        message: describe_clone_failure(&output.stderr),
                    })
                }
            }
        }

        if let RefSpec::Commit(commit) = target.ref_spec() {
            self.ensure_commit(target, strategy, dest, commit)?;
            let output = self.git.checkout(dest, commit)?;
            if !output.success {
                return Err(self.ref_not_found(target, output.stderr.trim()));
            }
        }
        if let Some((name, clone_stderr)) = unadvertised {
            self.checkout_unadvertised(target, strategy, dest, name, clone_stderr.trim())?;
        }

        if let Some(subdir) = strategy.sparse_subdir.as_deref() {
            self.narrow_to(target, dest, subdir)?;
        }
        if let Some(subdir) = target.subdir() {
            if !dest.join(subdir).is_dir() {
                return Err(Error::InvalidReference {
                    reference: target.source().to_string(),
                    message: format!("subdir '{}' does not exist at {}", subdir, target.ref_spec()),
                });
            }
        }

        let has_submodules = self.materialize && dest.join(GITMODULES).is_file();
        if has_submodules {
            let paths: Vec<&str> = strategy.sparse_subdir.as_deref().into_iter().collect();
            let output = self.git.submodule_update(dest, &paths, allow_file)?;
            if !output.success {
                return Err(Error::SubmoduleResolutionFailed {
                    url: url.to_string(),
                    r#ref: target.ref_spec().to_string(),
                    message: output.stderr.trim().to_string(),
                });
            }
        }

        if self.materialize {
            self.materialize_lfs(target, dest, has_submodules)?;
        }

        let result = CloneResult {
            working_tree_path: dest.to_path_buf(),
            head_commit: self.git.head_commit(dest)?,
            is_shallow: self.git.is_shallow(dest)?,
        };
        info!(
            "Checked out {} at {}{}",
            url,
            result.head_commit,
            if result.is_shallow { " (shallow)" } else { "" }
        );
        Ok(result)
    }

    /// Clone the remote's default branch after `--branch` rejected the
    /// requested name.
    fn clone_default(&self, target: &Target, strategy: &CloneStrategy, dest: &Path) -> Result<()> {
        let options = CloneOptions {
            depth: strategy.depth,
            branch: None,
            all_branches: false,
            allow_file: target.source().scheme() == "file",
        };
        let output = self.git.clone_repo(target.clone_url(), dest, &options)?;
        if !output.success {
            return Err(Error::CloneFailed {
                url: target.clone_url().to_string(),
                r#ref: target.ref_spec().to_string(),
                message: describe_clone_failure(&output.stderr),
            });
        }
        Ok(())
    }

    /// Check out a name the remote does not advertise as a branch or tag:
    /// a SHA-256 commit id, or any ref `git fetch` accepts.
    fn checkout_unadvertised(
        &self,
        target: &Target,
        strategy: &CloneStrategy,
        dest: &Path,
        name: &str,
        clone_stderr: &str,
    ) -> Result<()> {
        let rev = if is_object_id(name) {
            self.ensure_commit(target, strategy, dest, name)?;
            name
        } else {
            let fetched = self.git.fetch_commit(dest, name, strategy.is_shallow())?;
            if !fetched.success {
                return Err(self.ref_not_found(target, clone_stderr));
            }
            "FETCH_HEAD"
        };
        let output = self.git.checkout(dest, rev)?;
        if !output.success {
            return Err(self.ref_not_found(target, output.stderr.trim()));
        }
        Ok(())
    }

    /// Make `commit` available locally, deepening shallow history as needed.
    fn ensure_commit(&self, target: &Target, strategy: &CloneStrategy, dest: &Path, commit: &str) -> Result<()> {
        if self.git.has_commit(dest, commit)? {
            return Ok(());
        }

        let fetched = self.git.fetch_commit(dest, commit, strategy.is_shallow())?;
        if fetched.success && self.git.has_commit(dest, commit)? {
            debug!("Fetched {} directly", commit);
            return Ok(());
        }

        if !strategy.is_shallow() {
            return Err(self.ref_not_found(target, "commit is not part of the repository history"));
        }

        let mut rounds = 0;
        for by in strategy.deepen.steps() {
            rounds += 1;
            info!(
                "Commit {} not in shallow history, deepening by {} (round {}/{})",
                commit, by, rounds, strategy.deepen.rounds
            );
            let output = self.git.deepen(dest, by)?;
            if !output.success {
                return Err(self.deepen_failed(target, &output));
            }
            if self.git.has_commit(dest, commit)? {
                return Ok(());
            }
            if !self.git.is_shallow(dest)? {
                debug!("History is complete after {} rounds", rounds);
                break;
            }
        }

        Err(self.ref_not_found(
            target,
            &format!("commit not reachable after {} deepen rounds", rounds),
        ))
    }

    fn narrow_to(&self, target: &Target, dest: &Path, subdir: &str) -> Result<()> {
        match self.git.version()? {
            Some(version) if version >= MIN_SPARSE_GIT => {
                let output = self.git.sparse_checkout(dest, subdir)?;
                if !output.success {
                    return Err(Error::GitCommand {
                        command: format!("sparse-checkout set {}", subdir),
                        url: target.clone_url().to_string(),
                        stderr: output.stderr.trim().to_string(),
                    });
                }
            }
            version => warn!(
                "git {} does not support sparse checkout, keeping the full tree",
                version.map(|v| v.to_string()).unwrap_or_else(|| "(unknown)".to_string())
            ),
        }
        Ok(())
    }

    fn materialize_lfs(&self, target: &Target, dest: &Path, recursive: bool) -> Result<()> {
        let pull = match target.lfs_mode() {
            LfsMode::ForceOff => false,
            LfsMode::ForceOn => true,
            LfsMode::Auto => lfs::uses_lfs(dest),
        };
        if !pull {
            debug!("Leaving LFS pointers in place ({:?})", target.lfs_mode());
            return Ok(());
        }
        info!("Downloading LFS objects for {}", target.clone_url());
        let output = self.git.lfs_pull(dest, recursive)?;
        if !output.success {
            return Err(Error::LfsDownloadFailed {
                url: target.clone_url().to_string(),
                r#ref: target.ref_spec().to_string(),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn ref_not_found(&self, target: &Target, message: &str) -> Error {
        Error::RefNotFound {
            url: target.clone_url().to_string(),
            r#ref: target.ref_spec().to_string(),
            message: message.to_string(),
        }
    }

    fn deepen_failed(&self, target: &Target, output: &GitOutput) -> Error {
        Error::CloneFailed {
            url: target.clone_url().to_string(),
            r#ref: target.ref_spec().to_string(),
            message: format!("deepening failed: {}", describe_clone_failure(&output.stderr)),
        }
    }
}
