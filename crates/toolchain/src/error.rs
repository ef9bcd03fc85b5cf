//! Error types for toolchain operations.
//!
//! Errors are categorized to tell transient network failures (where an
//! already installed executable can still be used) from hard failures.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for toolchain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of toolchain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable).
    Network,
    /// Platform not supported.
    Platform,
    /// Tool or executable not found.
    NotFound,
    /// Checksum or signature verification failed.
    Verification,
    /// Permission denied during installation.
    Permission,
    /// Archive or response format error.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Platform => "Unsupported platform",
            Self::NotFound => "Tool not found",
            Self::Verification => "Verification failed",
            Self::Permission => "Permission denied",
            Self::Format => "Invalid file format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and try again",
            Self::Platform => "This tool may not be available for your platform",
            Self::NotFound => "Install the tool or disable offline mode",
            Self::Verification => "The download may have been tampered with, do not use it",
            Self::Permission => "Check directory permissions or run with appropriate access",
            Self::Format => "The downloaded file may be corrupted, try again",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during toolchain operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to detect the current platform.
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform {
        /// Operating system.
        os: String,
        /// CPU architecture.
        arch: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Failed to download a release file.
    #[error("download failed for {tool}: {message}")]
    DownloadFailed {
        /// Tool being downloaded.
        tool: String,
        /// Error message.
        message: String,
    },

    /// The archive could not be read or does not contain the executable.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// No checksum listed for a file.
    #[error("no checksum found for {0}")]
    ChecksumNotFound(String),

    /// Checksum mismatch.
    #[error("invalid checksum for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// File name.
        file: String,
        /// Listed digest.
        expected: String,
        /// Computed digest.
        actual: String,
    },

    /// GPG signature verification failed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Executable not found locally.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedPlatform { .. } => ErrorCategory::Platform,
            Error::HttpError { .. } | Error::DownloadFailed { .. } => ErrorCategory::Network,
            Error::ExtractionFailed(_) | Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::ChecksumNotFound(_)
            | Error::ChecksumMismatch { .. }
            | Error::InvalidSignature(_) => ErrorCategory::Verification,
            Error::Io { source, .. } => {
                if source.kind() == io::ErrorKind::PermissionDenied {
                    ErrorCategory::Permission
                } else {
                    ErrorCategory::Other
                }
            }
            Error::ToolNotFound(_) => ErrorCategory::NotFound,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::HttpError {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::ExtractionFailed(err.to_string())
    }
}
