//! # toolchain
//!
//! Resolve and install the HashiCorp tools used to provision hosts.
//!
//! This crate provides functionality for:
//! - Fetching the latest release metadata from the HashiCorp checkpoint API,
//!   cached for one hour in `<home>/<tool>/info.json`
//! - Downloading release archives, verified against the signed `SHA256SUMS`
//! - Locating an already installed copy, or one in `PATH` when offline
//!
//! ## Example
//!
//! ```no_run
//! use toolchain::{Client, Tool};
//!
//! let client = Client::new("/home/me/.accelize");
//! let terraform = client.executable(Tool::Terraform).expect("terraform unavailable");
//! println!("Using {}", terraform.display());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod backend;
pub mod error;
pub mod platform;
pub mod types;
pub mod verify;

pub use error::{Error, ErrorCategory, Result};
pub use types::{Checkpoint, InstallResult, Platform, ReleaseInfo, Tool};

use backend::Backend;
pub use backend::MockBackend;
use backend::checkpoint::CheckpointBackend;
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use verify::{GpgVerifier, Verifier};

/// High-level client resolving tool executables.
///
/// Resolved paths are memoized, so a client should be created once per
/// process and passed by reference.
pub struct Client {
    backend: Box<dyn Backend>,
    verifier: Box<dyn Verifier>,
    home: PathBuf,
    offline: bool,
    resolved: Mutex<HashMap<Tool, PathBuf>>,
}

impl Client {
    /// Create a client installing tools under `home`.
    #[must_use]
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self::with_backend(home, Box::new(CheckpointBackend::new()))
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(home: impl Into<PathBuf>, backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            verifier: Box::new(GpgVerifier::new()),
            home: home.into(),
            offline: false,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Use a custom signature verifier.
    #[must_use]
    pub fn verifier(mut self, verifier: Box<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Never contact the network, only use installed executables.
    #[must_use]
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    // =========================================================================
    // Paths
    // =========================================================================

    /// Root directory of the installed tools.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Install directory of a tool.
    pub fn install_dir(&self, tool: Tool) -> PathBuf {
        self.home.join(tool.name())
    }

    /// Shared plugin directory of a tool.
    pub fn plugins_dir(&self, tool: Tool) -> PathBuf {
        self.install_dir(tool).join("plugins")
    }

    fn info_cache(&self, tool: Tool) -> PathBuf {
        self.install_dir(tool).join("info.json")
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Path of an up-to-date executable, installing it when required.
    ///
    /// When release information cannot be fetched, an installed copy or one
    /// in `PATH` is used instead.
    pub fn executable(&self, tool: Tool) -> Result<PathBuf> {
        if let Some(path) = self.lock_resolved().get(&tool) {
            return Ok(path.clone());
        }

        let path = if self.offline {
            self.local(tool)?
        } else {
            match self.release(tool) {
                Ok(release) => self.ensure(&release)?,
                Err(err) if err.is_retryable() => {
                    log::warn!("Unable to check {tool} release: {err}");
                    self.local(tool).map_err(|_| err)?
                }
                Err(err) => return Err(err),
            }
        };

        log::debug!("Using {} at {}", tool, path.display());
        self.lock_resolved().insert(tool, path.clone());
        Ok(path)
    }

    /// Latest release metadata, from the cache when younger than one hour.
    pub fn release(&self, tool: Tool) -> Result<ReleaseInfo> {
        let cache = self.info_cache(tool);
        let now = Utc::now();

        if let Some(cached) = read_cache(&cache)
            && cached.tool == tool
            && cached.is_fresh(now)
        {
            log::debug!("Using cached {tool} release information");
            return Ok(cached);
        }

        let platform = platform::detect()?;
        let checkpoint = self.backend.check(tool)?;
        let release = ReleaseInfo::from_checkpoint(tool, &checkpoint, &platform, now);

        let dir = self.install_dir(tool);
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let json = serde_json::to_string_pretty(&release)?;
        fs::write(&cache, json).map_err(|e| Error::io(&cache, e))?;

        Ok(release)
    }

    /// Download, verify and extract a release.
    pub fn install(&self, release: &ReleaseInfo) -> Result<InstallResult> {
        let tool = release.tool;
        log::info!("Installing {} {}", tool, release.version);

        let sums = self.backend.download(tool, &release.checksum_url)?;
        let signature = self.backend.download(tool, &release.signature_url)?;
        self.verifier.verify(&sums, &signature)?;

        let data = self.backend.download(tool, &release.archive_url)?;
        verify::checksum(&sums, &data, &release.archive_name)?;

        let plugins = self.plugins_dir(tool);
        fs::create_dir_all(&plugins).map_err(|e| Error::io(&plugins, e))?;

        let path = archive::extract_executable(&data, &release.executable_name, &self.install_dir(tool))?;

        Ok(InstallResult {
            tool,
            version: release.version.clone(),
            path,
        })
    }

    /// Version of the executable installed under the client home.
    pub fn installed_version(&self, tool: Tool) -> Result<Option<String>> {
        let path = self.install_dir(tool).join(tool.binary_name());
        if !path.is_file() {
            return Ok(None);
        }
        executable_version(&path).map(Some)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn ensure(&self, release: &ReleaseInfo) -> Result<PathBuf> {
        let path = self.install_dir(release.tool).join(&release.executable_name);
        if path.is_file() {
            match executable_version(&path) {
                Ok(version) if version == release.version => return Ok(path),
                Ok(version) => log::info!(
                    "Updating {} from {} to {}",
                    release.tool,
                    version,
                    release.version
                ),
                Err(err) => log::debug!("Unable to get installed version: {err}"),
            }
        }
        Ok(self.install(release)?.path)
    }

    fn local(&self, tool: Tool) -> Result<PathBuf> {
        let installed = self.install_dir(tool).join(tool.binary_name());
        if installed.is_file() {
            return Ok(installed);
        }
        which::which(tool.name()).map_err(|_| Error::ToolNotFound(tool.to_string()))
    }

    fn lock_resolved(&self) -> std::sync::MutexGuard<'_, HashMap<Tool, PathBuf>> {
        self.resolved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn read_cache(path: &Path) -> Option<ReleaseInfo> {
    let text = fs::read_to_string(path).ok()?;
    serde_json::from_str(&text)
        .inspect_err(|e| log::debug!("Ignoring invalid cache {}: {e}", path.display()))
        .ok()
}

/// Version reported by `<executable> version`, without the leading `v`.
///
/// The first output line reads like `Terraform v1.9.5` or `Packer v1.11.2`.
pub fn executable_version(path: &Path) -> Result<String> {
    let output = Command::new(path)
        .arg("version")
        .output()
        .map_err(|e| Error::io(path, e))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_version(&stdout)
        .ok_or_else(|| Error::Other(format!("unable to read version of {}", path.display())))
}

fn parse_version(output: &str) -> Option<String> {
    let line = output.lines().next()?;
    let word = line
        .split_whitespace()
        .nth(1)
        .or_else(|| line.split_whitespace().next())?;
    Some(word.trim_start_matches('v').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    fn mock_release(mock: &MockBackend, tool: Tool, version: &str) -> ReleaseInfo {
        let checkpoint = Checkpoint {
            current_version: version.to_string(),
            current_download_url: format!("mock://{}/{version}", tool.name()),
        };
        mock.set_checkpoint(tool, checkpoint.clone());
        let platform = platform::detect().unwrap();
        ReleaseInfo::from_checkpoint(tool, &checkpoint, &platform, Utc::now())
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("Terraform v1.9.5\non linux_amd64\n").unwrap(), "1.9.5");
        assert_eq!(parse_version("Packer v1.11.2\n").unwrap(), "1.11.2");
        assert_eq!(parse_version("1.8.0\n").unwrap(), "1.8.0");
        assert!(parse_version("").is_none());
    }

    #[test]
    fn test_paths() {
        let client = Client::with_backend("/opt/accelize", Box::new(MockBackend::new()));
        assert_eq!(client.install_dir(Tool::Packer), PathBuf::from("/opt/accelize/packer"));
        assert_eq!(
            client.plugins_dir(Tool::Terraform),
            PathBuf::from("/opt/accelize/terraform/plugins")
        );
    }

    #[test]
    fn test_release_is_cached() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new();
        mock_release(&mock, Tool::Terraform, "1.9.5");
        let client = Client::with_backend(dir.path(), Box::new(mock.clone()));

        let first = client.release(Tool::Terraform).unwrap();
        let second = client.release(Tool::Terraform).unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.check_count(), 1);
        assert!(dir.path().join("terraform/info.json").is_file());
    }

    #[test]
    fn test_stale_release_is_refreshed() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new();
        let mut stale = mock_release(&mock, Tool::Packer, "1.11.2");
        stale.version = "1.0.0".to_string();
        stale.fetched_at = Utc::now() - chrono::Duration::hours(2);
        fs::create_dir_all(dir.path().join("packer")).unwrap();
        fs::write(
            dir.path().join("packer/info.json"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let client = Client::with_backend(dir.path(), Box::new(mock.clone()));
        let release = client.release(Tool::Packer).unwrap();
        assert_eq!(release.version, "1.11.2");
        assert_eq!(mock.check_count(), 1);
    }

    #[test]
    fn test_install_verifies_and_extracts() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new();
        let release = mock_release(&mock, Tool::Terraform, "1.9.5");

        let data = archive::zip_with(&release.executable_name, b"#!/bin/sh\necho Terraform v1.9.5\n");
        let sums = format!("{:x}  {}\n", Sha256::digest(&data), release.archive_name);
        mock.add_file(&release.archive_url, data);
        mock.add_file(&release.checksum_url, sums.into_bytes());
        mock.add_file(&release.signature_url, b"sig".to_vec());

        let client = Client::with_backend(dir.path(), Box::new(mock)).verifier(Box::new(verify::AcceptAll));
        let result = client.install(&release).unwrap();
        assert_eq!(result.version, "1.9.5");
        assert!(result.path.is_file());
        assert!(client.plugins_dir(Tool::Terraform).is_dir());
    }

    #[test]
    fn test_install_rejects_bad_checksum() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new();
        let release = mock_release(&mock, Tool::Terraform, "1.9.5");

        let data = archive::zip_with(&release.executable_name, b"binary");
        let sums = format!("{:x}  {}\n", Sha256::digest(b"other"), release.archive_name);
        mock.add_file(&release.archive_url, data);
        mock.add_file(&release.checksum_url, sums.into_bytes());
        mock.add_file(&release.signature_url, b"sig".to_vec());

        let client = Client::with_backend(dir.path(), Box::new(mock)).verifier(Box::new(verify::AcceptAll));
        let err = client.install(&release).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Verification);
        assert!(!client.install_dir(Tool::Terraform).join(&release.executable_name).exists());
    }

    #[test]
    fn test_offline_uses_installed_copy() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new();
        let installed = dir.path().join("packer").join(Tool::Packer.binary_name());
        fs::create_dir_all(installed.parent().unwrap()).unwrap();
        fs::write(&installed, b"binary").unwrap();

        let client = Client::with_backend(dir.path(), Box::new(mock.clone())).offline(true);
        assert_eq!(client.executable(Tool::Packer).unwrap(), installed);
        assert_eq!(mock.check_count(), 0);
    }

    #[test]
    fn test_network_failure_falls_back_to_installed_copy() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new();
        let installed = dir.path().join("terraform").join(Tool::Terraform.binary_name());
        fs::create_dir_all(installed.parent().unwrap()).unwrap();
        fs::write(&installed, b"binary").unwrap();

        let client = Client::with_backend(dir.path(), Box::new(mock.clone()));
        assert_eq!(client.executable(Tool::Terraform).unwrap(), installed);
        assert_eq!(mock.check_count(), 1);

        // Memoized
        assert_eq!(client.executable(Tool::Terraform).unwrap(), installed);
        assert_eq!(mock.check_count(), 1);
    }
}
