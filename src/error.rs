//! Error types for Ark.
//!
//! This module defines the error types used throughout Ark. Persistence
//! failures are fatal; insert conflicts and unparsable fact files are
//! recovered by the callers that produce them.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Ark operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Ark.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Fact Store Errors
    // ========================================================================
    /// Any persistence-layer failure other than a uniqueness conflict.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A concurrent writer inserted the same identity first.
    #[error("Host '{identity}' was inserted concurrently by another writer")]
    Conflict {
        /// Identity that lost the insert race
        identity: String,
    },

    /// A stored document whose facts no longer deserialize to a mapping.
    #[error("Stored facts for host '{identity}' are corrupt: {source}")]
    CorruptFacts {
        /// Host identity
        identity: String,
        /// Deserialization failure
        #[source]
        source: serde_json::Error,
    },

    /// Unsupported or malformed database connection string.
    #[error("Invalid database URL '{0}': only sqlite URLs are supported")]
    InvalidDatabaseUrl(String),

    // ========================================================================
    // Ingestion Errors
    // ========================================================================
    /// A per-host fact file that is not a JSON object.
    #[error("Failed to parse facts in '{}': {message}", path.display())]
    FactParse {
        /// Path to the fact file
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Project Errors
    // ========================================================================
    /// Project names may only contain alphanumerics, dashes and underscores.
    #[error(
        "Project name '{0}' is not valid. It must only contain alphanumeric characters, dashes, and underscores."
    )]
    InvalidProjectName(String),

    /// Required project directories or files are missing.
    #[error("Project '{}' is missing {} required item(s)", path.display(), missing_dirs.len() + missing_files.len())]
    ProjectLayout {
        /// Project root
        path: PathBuf,
        /// Required directories that do not exist
        missing_dirs: Vec<PathBuf>,
        /// Required files that do not exist
        missing_files: Vec<PathBuf>,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// IO error with the offending path.
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new IO error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a new fact parse error.
    pub fn fact_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FactParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if a write batch may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Returns true for operator input problems reported before any side effect.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidProjectName(_) | Error::ProjectLayout { .. }
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Database(_) | Error::CorruptFacts { .. } => 2,
            Error::Config(_) | Error::InvalidDatabaseUrl(_) => 3,
            _ => 1,
        }
    }
}
