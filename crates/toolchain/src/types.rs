//! Core types for toolchain management.
//!
//! Tool definitions, platform information, release metadata and
//! installation results.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::platform;

/// How long cached release metadata stays valid, in seconds.
pub const RELEASE_CACHE_TTL_SECS: i64 = 3600;

/// Supported HashiCorp tools.
///
/// # Example
///
/// ```
/// use toolchain::Tool;
///
/// assert_eq!(Tool::Terraform.name(), "terraform");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Infrastructure as code.
    Terraform,
    /// Machine image builder.
    Packer,
}

impl Tool {
    /// Lowercase identifier, also used by the checkpoint API and archive names.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Terraform => "terraform",
            Self::Packer => "packer",
        }
    }

    /// Executable file name on this platform.
    #[must_use]
    pub fn binary_name(&self) -> String {
        format!("{}{}", self.name(), platform::executable_extension())
    }

    /// All supported tools.
    #[must_use]
    pub fn all() -> &'static [Tool] {
        &[Tool::Terraform, Tool::Packer]
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Target platform, in HashiCorp release naming (`linux`/`amd64`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system (e.g., "linux", "darwin", "windows").
    pub os: String,
    /// CPU architecture (e.g., "amd64", "arm64").
    pub arch: String,
}

impl Platform {
    /// Create a new platform.
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Check if this platform is Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.os, self.arch)
    }
}

/// Response of the HashiCorp checkpoint API.
///
/// Only the fields used for release resolution are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Latest released version, without leading `v`.
    pub current_version: String,
    /// Base URL of the release downloads.
    pub current_download_url: String,
}

/// Resolved metadata of the latest release for the current platform.
///
/// Cached as `info.json` in the tool install directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// The tool.
    pub tool: Tool,
    /// Release version.
    pub version: String,
    /// Archive file name (`{tool}_{version}_{os}_{arch}.zip`).
    pub archive_name: String,
    /// Executable name inside the archive.
    pub executable_name: String,
    /// Archive download URL.
    pub archive_url: String,
    /// SHA256SUMS file URL.
    pub checksum_url: String,
    /// Detached signature of the SHA256SUMS file.
    pub signature_url: String,
    /// When the metadata was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl ReleaseInfo {
    /// Derive download names and URLs from a checkpoint response.
    #[must_use]
    pub fn from_checkpoint(
        tool: Tool,
        checkpoint: &Checkpoint,
        platform: &Platform,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let version = checkpoint.current_version.trim_start_matches('v').to_string();
        let base = checkpoint.current_download_url.trim_end_matches('/');
        let archive_name = format!("{}_{}_{}.zip", tool.name(), version, platform);
        let checksum_url = format!("{base}/{}_{version}_SHA256SUMS", tool.name());
        let executable_name = if platform.is_windows() {
            format!("{}.exe", tool.name())
        } else {
            tool.name().to_string()
        };

        Self {
            tool,
            archive_url: format!("{base}/{archive_name}"),
            signature_url: format!("{checksum_url}.sig"),
            checksum_url,
            archive_name,
            executable_name,
            version,
            fetched_at,
        }
    }

    /// Whether the metadata is recent enough to skip the checkpoint API.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.fetched_at) < Duration::seconds(RELEASE_CACHE_TTL_SECS)
    }
}

/// Result of an installation.
#[derive(Debug, Clone)]
pub struct InstallResult {
    /// The tool that was installed.
    pub tool: Tool,
    /// The version that was installed.
    pub version: String,
    /// Path to the installed executable.
    pub path: PathBuf,
}

impl fmt::Display for InstallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} installed at {}",
            self.tool,
            self.version,
            self.path.display()
        )
    }
}
