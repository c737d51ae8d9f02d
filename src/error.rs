//! # Error Handling
//!
//! This module defines the centralized error type for `tar-scm`. It uses the
//! `thiserror` library to build an `Error` enum whose variants follow the
//! stages a task passes through, so that callers can tell a bad configuration
//! apart from a failed checkout or a version that could not be rewritten.
//!
//! ## Propagation
//!
//! - **`Configuration`** aborts the whole run before any task executes.
//! - **`Fetch`**, **`VersionDetection`**, **`VersionRewrite`** and
//!   **`Packaging`** are per-task errors. The orchestrator records them
//!   against the failing task and marks its dependents as skipped.
//! - **`Cleanup`** is best-effort. It is logged and never replaces the
//!   primary result of a run.
//!
//! The `Result` type alias is used to return `Result<T, Error>` from
//! functions throughout the library.

use std::path::PathBuf;

use thiserror::Error;

use crate::scm::Scm;

/// Main error type for tar-scm operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration could not be turned into a valid task list.
    ///
    /// Raised before any filesystem or network activity happens.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Configuration {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Checking out a repository failed (network, authentication, unknown
    /// revision).
    #[error("Fetch error ({scm}) for {url}: {message}")]
    Fetch {
        scm: Scm,
        url: String,
        message: String,
    },

    /// The backend could not derive a version from the checked-out tree.
    #[error("Version detection error ({scm}) in {}: {message}", path.display())]
    VersionDetection {
        scm: Scm,
        path: PathBuf,
        message: String,
    },

    /// A configured rewrite pattern did not match the detected version.
    #[error("Version rewrite error: pattern '{pattern}' does not match version '{version}'")]
    VersionRewrite { pattern: String, version: String },

    /// Writing an archive, metadata file or manifest failed.
    #[error("Packaging error: {message}")]
    Packaging { message: String },

    /// Removing a registered working directory failed.
    #[error("Cleanup error for {}: {message}", path.display())]
    Cleanup { path: PathBuf, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A directory traversal error, wrapped from `walkdir::Error`.
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl Error {
    /// Shorthand for a `Configuration` error without a hint.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            hint: None,
        }
    }

    /// Shorthand for a `Configuration` error with a hint.
    pub fn config_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Shorthand for a `Packaging` error.
    pub fn packaging(message: impl Into<String>) -> Self {
        Error::Packaging {
            message: message.into(),
        }
    }

    /// Returns true for errors that abort the whole run rather than a
    /// single task.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
