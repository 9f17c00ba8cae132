//! # Source Resolution & Package Manifest Engine
//!
//! Turns a source reference (a git URL with an optional `subdir`, `lfs`
//! switch and ref fragment) into either a materialized checkout or, in
//! project mode, a pair of manifest files per package found in the
//! repository.
//!
//! ## Quick Example
//!
//! ```
//! use scm_bridge::reference::{self, LfsMode, RefSpec};
//!
//! let target = reference::parse("https://example.com/rpms/ring0.git?subdir=pkgs&lfs=0#factory").unwrap();
//! assert_eq!(target.clone_url(), "https://example.com/rpms/ring0.git");
//! assert_eq!(target.subdir(), Some("pkgs"));
//! assert_eq!(target.lfs_mode(), LfsMode::ForceOff);
//! assert_eq!(target.ref_spec(), &RefSpec::NamedRef("factory".into()));
//! ```
//!
//! ## Core Concepts
//!
//! - **References (`reference`)**: parsing and validation of source
//!   references into a [`reference::Target`].
//! - **Strategy (`strategy`, `config`)**: clone depth, branch and deepen
//!   schedule derived from the target and the environment.
//! - **Fetching (`fetcher`, `repository`, `git`, `cancel`)**: clone, commit
//!   resolution, sparse checkout, submodules and large files, all behind
//!   the mockable [`repository::GitOperations`] trait.
//! - **Scanning (`scanner`, `submodules`, `lfs`)**: classification of the
//!   project's top-level directories into submodule and plain packages.
//! - **Manifests (`manifest`)**: the `<name>.xml` / `<name>.info` pair.
//!
//! The [`pipeline`] module ties these together for one request.

pub mod cancel;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod git;
pub mod lfs;
pub mod manifest;
pub mod pipeline;
pub mod reference;
pub mod repository;
pub mod scanner;
pub mod strategy;
pub mod submodules;

#[cfg(test)]
mod reference_proptest;
