//! Error types for host operations.
//!
//! Errors fall into two categories: configuration errors (bad or missing
//! definition content, unknown host, infrastructure not applied yet) and
//! runtime errors (an external tool failed, a download or verification
//! failed). Tool failures carry the tool's own error text.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for host operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of host errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The definition, the host name or the host state is not usable.
    Configuration,
    /// An external process or a filesystem operation failed.
    Runtime,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Runtime => "Runtime error",
        }
    }
}

/// Errors that can occur during host operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid application definition
    #[error(transparent)]
    Definition(#[from] appdef::Error),

    /// Invalid or incomplete host configuration
    #[error("{0}")]
    Configuration(String),

    /// Infrastructure outputs requested before apply
    #[error("Configuration not applied")]
    NotApplied,

    /// No host directory with this name
    #[error("No configuration named '{0}'")]
    HostNotFound(String),

    /// External tool exited with an error
    #[error("{message}")]
    CommandFailed {
        /// Tool name
        tool: String,
        /// Standard error of the tool, or standard output if empty
        message: String,
    },

    /// A transient error persisted through every retry
    #[error("Unable to apply after {retries} retries\n\n{message}")]
    RetryExhausted {
        /// Configured number of retries
        retries: u32,
        /// Last error text
        message: String,
    },

    /// Packer manifest is missing or inconsistent
    #[error("Invalid Packer manifest: {0}")]
    Manifest(String),

    /// IO error
    #[error("Unable to access '{path}': {source}")]
    Io {
        /// Path involved in the error
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Tool resolution or installation failed
    #[error(transparent)]
    Toolchain(#[from] toolchain::Error),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Definition(_)
            | Self::Configuration(_)
            | Self::NotApplied
            | Self::HostNotFound(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::Runtime,
        }
    }

    /// Whether this is a tool failure matching a known transient error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::CommandFailed { message, .. } => crate::retry::is_transient(message),
            _ => false,
        }
    }
}
