//! Error taxonomy shared by every dependency and sandbox operation.
//!
//! Variants split into two groups:
//!
//! - **Fatal**: malformed persisted state (`ManifestParse`, `LockfileParse`,
//!   `Config`) and sandbox launch failures. Commands abort before mutating anything.
//! - **Per-package**: resolution, fetch, checkout and removal failures. Batch
//!   commands collect these into a [`crate::report::Summary`] and keep going.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = BunchError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BunchError {
    #[error("no {} found in {}", crate::manifest::MANIFEST_FILE, .0.display())]
    ManifestMissing(PathBuf),

    #[error("{}:{line}: {message}", .path.display())]
    ManifestParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}: {message}", .path.display())]
    LockfileParse { path: PathBuf, message: String },

    #[error("{}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("invalid package name '{name}': {reason}")]
    InvalidPackageName { name: String, reason: String },

    #[error("package '{name}' not found: {reason}")]
    PackageNotFound { name: String, reason: String },

    #[error("'{constraint}' is not a tag or branch of '{name}'")]
    ConstraintNotFound { name: String, constraint: String },

    #[error("failed to fetch '{name}': {reason}")]
    Fetch { name: String, reason: String },

    #[error("failed to check out {rev} in '{name}': {reason}", rev = short_rev(.revision))]
    Checkout {
        name: String,
        revision: String,
        reason: String,
    },

    #[error("failed to remove '{name}' from the vendor store: {source}")]
    VendorRemove {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch '{program}': {source}")]
    EnvironmentLaunch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BunchError {
    /// Stable label used in command summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ManifestMissing(_) => "ManifestMissing",
            Self::ManifestParse { .. } => "ManifestParseError",
            Self::LockfileParse { .. } => "LockfileParseError",
            Self::Config { .. } => "ConfigError",
            Self::InvalidPackageName { .. } => "InvalidPackageName",
            Self::PackageNotFound { .. } => "PackageNotFound",
            Self::ConstraintNotFound { .. } => "ConstraintNotFound",
            Self::Fetch { .. } => "FetchError",
            Self::Checkout { .. } => "CheckoutError",
            Self::VendorRemove { .. } => "VendorRemoveError",
            Self::EnvironmentLaunch { .. } => "EnvironmentLaunchError",
            Self::Io(_) => "IoError",
        }
    }

    /// Whether the error invalidates the whole command rather than one package.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ManifestMissing(_)
                | Self::ManifestParse { .. }
                | Self::LockfileParse { .. }
                | Self::Config { .. }
                | Self::EnvironmentLaunch { .. }
        )
    }
}

pub(crate) fn short_rev(rev: &str) -> &str {
    rev.get(..12).unwrap_or(rev)
}
