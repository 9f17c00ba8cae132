//! End-to-end resolution of one reference.
//!
//! Without project mode the reference is checked out into the output
//! directory. The clone is staged in a temporary directory next to it and
//! renamed into place only once every step succeeded, so a failed run never
//! leaves a partial checkout under the requested name.
//!
//! In project mode the checkout is staged in a scratch directory that is
//! dropped afterwards; only the package manifests reach the output
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::TempDir;

use crate::cancel::Cancellation;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{CloneResult, RepositoryFetcher};
use crate::manifest;
use crate::reference::{self, Target};
use crate::repository::{DefaultGitOperations, GitOperations};
use crate::scanner::{self, Package};
use crate::strategy::{self, CloneStrategy};

const STAGING_PREFIX: &str = ".scm-bridge-";

/// One invocation of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub reference: String,
    pub outdir: PathBuf,
    pub project_mode: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The repository was checked out into the output directory.
    Checkout(CloneResult),
    /// Manifests were written for every package of the project.
    Project {
        head_commit: String,
        packages: Vec<Package>,
        manifests: Vec<PathBuf>,
    },
}

/// Run `request` with the system git, bounded by the configured timeout.
pub fn execute(request: &Request, config: &Config) -> Result<Outcome> {
    let git = DefaultGitOperations::new(Cancellation::from_timeout(config.timeout)).for_url(&request.reference);
    run(request, config, &git)
}

/// Run `request` with the given git implementation.
pub fn run(request: &Request, config: &Config, git: &dyn GitOperations) -> Result<Outcome> {
    let target = reference::parse(&request.reference)?;
    let strategy = strategy::select(&target, config, request.project_mode);
    debug!("Clone strategy for {}: {:?}", target.clone_url(), strategy);

    if request.project_mode {
        run_project(&target, &strategy, config, &request.outdir, git)
    } else {
        run_checkout(&target, &strategy, &request.outdir, git)
    }
}

fn run_checkout(
    target: &Target,
    strategy: &CloneStrategy,
    outdir: &Path,
    git: &dyn GitOperations,
) -> Result<Outcome> {
    ensure_vacant(target, outdir)?;
    let parent = match outdir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(parent)?;
    let result = RepositoryFetcher::new(git).fetch(target, strategy, staging.path())?;
    publish(&staging, outdir)?;
    info!("Checked out {} into {}", target.clone_url(), outdir.display());

    Ok(Outcome::Checkout(CloneResult {
        working_tree_path: outdir.to_path_buf(),
        ..result
    }))
}

fn run_project(
    target: &Target,
    strategy: &CloneStrategy,
    config: &Config,
    outdir: &Path,
    git: &dyn GitOperations,
) -> Result<Outcome> {
    let scratch = TempDir::new()?;
    let checkout = scratch.path().join("checkout");
    let result = RepositoryFetcher::new(git)
        .metadata_only()
        .fetch(target, strategy, &checkout)?;

    let packages = scanner::scan(&result, target, git, config.jobs)?;
    let manifests = manifest::write_all(&packages, &result.head_commit, outdir)?;
    info!(
        "Wrote {} package manifests for {} at {}",
        packages.len(),
        target.clone_url(),
        result.head_commit
    );

    Ok(Outcome::Project {
        head_commit: result.head_commit,
        packages,
        manifests,
    })
}

/// The checkout destination must be absent or an empty directory.
fn ensure_vacant(target: &Target, outdir: &Path) -> Result<()> {
    if !outdir.exists() {
        return Ok(());
    }
    let occupied = !outdir.is_dir() || fs::read_dir(outdir)?.next().is_some();
    if occupied {
        return Err(Error::CloneFailed {
            url: target.clone_url().to_string(),
            r#ref: target.ref_spec().to_string(),
            message: format!("destination {} is not empty", outdir.display()),
        });
    }
    Ok(())
}

/// Move the finished staging tree onto `outdir`.
fn publish(staging: &TempDir, outdir: &Path) -> Result<()> {
    if outdir.is_dir() {
        fs::remove_dir(outdir)?;
    }
    fs::rename(staging.path(), outdir)?;
    Ok(())
}
