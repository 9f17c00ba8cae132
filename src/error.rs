//! # Error Handling
//!
//! This module defines the centralized error type for `scm-bridge`. Every
//! failure the engine can report is a variant of [`Error`], built with the
//! `thiserror` library so that each one renders as a single diagnostic line
//! naming the offending URL, ref or package.
//!
//! All failures are fatal for an invocation. There is no partial-success
//! mode: a caller that sees an `Err` must treat whatever was written to the
//! output directory as incomplete.
//!
//! The failure kinds that matter to callers are exposed through
//! [`Error::kind`], which collapses the supporting variants (I/O, URL
//! parsing, raw git command failures) onto the kind of the phase they
//! happened in.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for scm-bridge operations
#[derive(Error, Debug)]
pub enum Error {
    /// The source reference could not be parsed or contains an illegal value.
    #[error("Invalid reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    /// The source reference uses a URL scheme that is not supported.
    #[error("Unsupported scheme '{scheme}' in reference '{reference}'")]
    UnsupportedScheme { scheme: String, reference: String },

    /// Cloning the repository failed (transport, authentication or a
    /// missing remote).
    #[error("Clone failed for {url}@{r#ref}: {message}")]
    CloneFailed {
        url: String,
        r#ref: String,
        message: String,
    },

    /// The requested branch, tag or commit could not be resolved, even after
    /// deepening a shallow history.
    #[error("Ref not found for {url}@{r#ref}: {message}")]
    RefNotFound {
        url: String,
        r#ref: String,
        message: String,
    },

    /// Nested submodules could not be checked out at their pinned commits.
    #[error("Submodule resolution failed for {url}@{r#ref}: {message}")]
    SubmoduleResolutionFailed {
        url: String,
        r#ref: String,
        message: String,
    },

    /// Large-file storage content could not be downloaded.
    #[error("LFS download failed for {url}@{r#ref}: {message}")]
    LfsDownloadFailed {
        url: String,
        r#ref: String,
        message: String,
    },

    /// A package manifest could not be written to the output directory.
    #[error("Manifest write failed for package '{package}' at {}: {message}", path.display())]
    ManifestWriteFailed {
        package: String,
        path: PathBuf,
        message: String,
    },

    /// A git primitive failed outside of the clone/ref/submodule/LFS phases.
    #[error("Git command failed for {url}: {command} - {stderr}")]
    GitCommand {
        command: String,
        url: String,
        stderr: String,
    },

    /// The in-flight operation was aborted by a timeout or external
    /// cancellation.
    #[error("Operation cancelled for {url}: {operation}")]
    Cancelled { url: String, operation: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// The failure kinds an invocation can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidReference,
    UnsupportedScheme,
    CloneFailed,
    RefNotFound,
    SubmoduleResolutionFailed,
    LfsDownloadFailed,
    ManifestWriteFailed,
    GitCommand,
    Cancelled,
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidReference { .. } | Error::UrlParse(_) => ErrorKind::InvalidReference,
            Error::UnsupportedScheme { .. } => ErrorKind::UnsupportedScheme,
            Error::CloneFailed { .. } => ErrorKind::CloneFailed,
            Error::RefNotFound { .. } => ErrorKind::RefNotFound,
            Error::SubmoduleResolutionFailed { .. } => ErrorKind::SubmoduleResolutionFailed,
            Error::LfsDownloadFailed { .. } => ErrorKind::LfsDownloadFailed,
            Error::ManifestWriteFailed { .. } => ErrorKind::ManifestWriteFailed,
            Error::GitCommand { .. } => ErrorKind::GitCommand,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
