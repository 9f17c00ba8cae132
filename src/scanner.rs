//! # Project Scanner
//!
//! In project mode every top-level directory of the checkout is a package.
//! The scanner lists those directories, then classifies each one:
//!
//! - **Submodule**: the containing tree's `.gitmodules` registers the path.
//!   The package points at the submodule's remote (relative remotes resolved
//!   against the project URL) and carries the commit the containing tree
//!   pins for that path.
//! - **Plain**: anything else. The package points back at the project with
//!   its `subdir` set to the directory, and has no commit of its own.
//!
//! Classification only reads the registry and the pinned gitlinks, so it
//! runs on a bounded rayon pool. The result is sorted by name.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::fetcher::CloneResult;
use crate::reference::Target;
use crate::repository::GitOperations;
use crate::submodules::{resolve_remote, SubmoduleRegistry};

/// Where a package's sources come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Submodule,
    Plain,
}

/// Result of classifying one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Submodule { remote: String, commit: String },
    Plain,
}

/// One package discovered in project mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Directory name.
    pub name: String,
    pub remote_url: String,
    /// Pinned commit; only submodules have one.
    pub head_commit: Option<String>,
}

impl Package {
    pub fn kind(&self) -> SourceKind {
        if self.head_commit.is_some() {
            SourceKind::Submodule
        } else {
            SourceKind::Plain
        }
    }
}

/// Scan the checkout described by `clone` for packages.
pub fn scan(
    clone: &CloneResult,
    target: &Target,
    git: &dyn GitOperations,
    jobs: usize,
) -> Result<Vec<Package>> {
    let worktree = clone.working_tree_path.as_path();
    let root = match target.subdir() {
        Some(subdir) => worktree.join(subdir),
        None => worktree.to_path_buf(),
    };

    let names = package_dirs(&root)?;
    let registry = SubmoduleRegistry::load(worktree, target)?;
    let gitlinks = if registry.is_empty() {
        BTreeMap::new()
    } else {
        git.gitlinks(worktree, target.subdir())?
    };
    debug!(
        "Found {} package directories, {} registered submodules",
        names.len(),
        registry.len()
    );

    let scanner = Scanner {
        target,
        registry: &registry,
        gitlinks: &gitlinks,
    };

    match rayon::ThreadPoolBuilder::new().num_threads(jobs.max(1)).build() {
        Ok(pool) => pool.install(|| names.par_iter().map(|name| scanner.package(name)).collect()),
        Err(e) => {
            warn!("Scanning sequentially, cannot start worker pool: {}", e);
            names.iter().map(|name| scanner.package(name)).collect()
        }
    }
}

/// Immediate child directories of `root`, sorted, without hidden entries.
fn package_dirs(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non UTF-8 directory {}", entry.path().display());
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

struct Scanner<'a> {
    target: &'a Target,
    registry: &'a SubmoduleRegistry,
    gitlinks: &'a BTreeMap<String, String>,
}

impl Scanner<'_> {
    /// Path of `name` relative to the repository root.
    fn repo_path(&self, name: &str) -> String {
        match self.target.subdir() {
            Some(subdir) => format!("{}/{}", subdir, name),
            None => name.to_string(),
        }
    }

    fn classify(&self, name: &str) -> Result<Classification> {
        let path = self.repo_path(name);
        let Some(entry) = self.registry.get(&path) else {
            return Ok(Classification::Plain);
        };
        let failed = |message: String| Error::SubmoduleResolutionFailed {
            url: self.target.clone_url().to_string(),
            r#ref: self.target.ref_spec().to_string(),
            message,
        };
        let remote = resolve_remote(&entry.url, self.target.clone_url())
            .map_err(|e| failed(format!("submodule '{}': {}", entry.name, e)))?;
        let commit = self.gitlinks.get(&path).cloned().ok_or_else(|| {
            failed(format!(
                "submodule '{}' is registered but the tree pins no commit at '{}'",
                entry.name, path
            ))
        })?;
        Ok(Classification::Submodule { remote, commit })
    }

    fn package(&self, name: &str) -> Result<Package> {
        let package = match self.classify(name)? {
            Classification::Submodule { remote, commit } => Package {
                name: name.to_string(),
                remote_url: remote,
                head_commit: Some(commit),
            },
            Classification::Plain => Package {
                name: name.to_string(),
                remote_url: self.target.with_subdir(&self.repo_path(name)),
                head_commit: None,
            },
        };
        debug!("Package {} ({:?}): {}", package.name, package.kind(), package.remote_url);
        Ok(package)
    }
}
