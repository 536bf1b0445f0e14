//! Error types for the source definition subsystem.

use thiserror::Error;

/// Errors that can occur while loading or querying source definitions.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Source definition not found
    #[error("source definition not found: {source_id}")]
    NotFound {
        /// The source ID that was not found
        source_id: String,
    },

    /// Failed to load source definition from file
    #[error("failed to load source definition from {path}: {source}")]
    LoadError {
        /// Path to the definition file
        path: String,
        /// Underlying error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse source definition TOML
    #[error("failed to parse source definition TOML in {path}: {source}")]
    ParseError {
        /// Path to the definition file
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// Invalid source definition (validation failed)
    #[error("invalid source definition for {source_id}: {reason}")]
    ValidationError {
        /// Source ID being validated
        source_id: String,
        /// Reason for validation failure
        reason: String,
    },

    /// Source definition directory not found
    #[error("source definitions directory not found at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// I/O error while accessing source definitions
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid source ID format
    #[error("invalid source ID: {0}")]
    InvalidId(#[from] roster_core::RosterError),
}

/// Result type for source definition operations.
pub type Result<T> = std::result::Result<T, SourceError>;
