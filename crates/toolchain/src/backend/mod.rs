//! Backend traits and implementations for fetching release metadata and files.
//!
//! The primary implementation is [`checkpoint::CheckpointBackend`], which
//! queries the HashiCorp checkpoint API and downloads from the release site.
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use toolchain::backend::{Backend, MockBackend};
//! use toolchain::{Checkpoint, Tool};
//!
//! let mock = MockBackend::new();
//! mock.set_checkpoint(Tool::Terraform, Checkpoint {
//!     current_version: "1.9.5".to_string(),
//!     current_download_url: "mock://terraform/1.9.5".to_string(),
//! });
//!
//! let checkpoint = mock.check(Tool::Terraform).unwrap();
//! assert_eq!(checkpoint.current_version, "1.9.5");
//! ```

pub mod checkpoint;

use crate::error::{Error, Result};
use crate::types::{Checkpoint, Tool};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Backend trait for release metadata and downloads.
pub trait Backend: Send + Sync {
    /// Fetch the latest release metadata of a tool.
    fn check(&self, tool: Tool) -> Result<Checkpoint>;

    /// Download a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::DownloadFailed` if the file cannot be downloaded.
    fn download(&self, tool: Tool, url: &str) -> Result<Vec<u8>>;
}

/// Mock backend for testing without network access.
///
/// Clones share state, so a test can keep a handle after passing the
/// backend to a client.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    checkpoints: Arc<Mutex<HashMap<Tool, Checkpoint>>>,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    checks: Arc<Mutex<usize>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the checkpoint response of a tool.
    pub fn set_checkpoint(&self, tool: Tool, checkpoint: Checkpoint) {
        let mut checkpoints = self.checkpoints.lock().unwrap();
        checkpoints.insert(tool, checkpoint);
    }

    /// Add file data for a URL.
    pub fn add_file(&self, url: impl Into<String>, data: Vec<u8>) {
        let mut files = self.files.lock().unwrap();
        files.insert(url.into(), data);
    }

    /// Number of checkpoint requests served.
    #[must_use]
    pub fn check_count(&self) -> usize {
        *self.checks.lock().unwrap()
    }
}

impl Backend for MockBackend {
    fn check(&self, tool: Tool) -> Result<Checkpoint> {
        *self.checks.lock().unwrap() += 1;
        let checkpoints = self.checkpoints.lock().unwrap();
        checkpoints
            .get(&tool)
            .cloned()
            .ok_or_else(|| Error::http(format!("no checkpoint for {tool}"), Some(404)))
    }

    fn download(&self, tool: Tool, url: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().unwrap();
        files.get(url).cloned().ok_or_else(|| Error::DownloadFailed {
            tool: tool.to_string(),
            message: format!("mock file not configured: {url}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_check_missing() {
        let mock = MockBackend::new();
        let err = mock.check(Tool::Packer).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(mock.check_count(), 1);
    }

    #[test]
    fn test_mock_backend_download() {
        let mock = MockBackend::new();
        mock.add_file("mock://a", vec![1, 2, 3]);
        assert_eq!(mock.download(Tool::Terraform, "mock://a").unwrap(), vec![1, 2, 3]);
        assert!(mock.download(Tool::Terraform, "mock://b").is_err());
    }

    #[test]
    fn test_mock_backend_shared_state() {
        let mock = MockBackend::new();
        let handle = mock.clone();
        mock.set_checkpoint(
            Tool::Terraform,
            Checkpoint {
                current_version: "1.0.0".to_string(),
                current_download_url: "mock://terraform".to_string(),
            },
        );
        assert!(handle.check(Tool::Terraform).is_ok());
        assert_eq!(mock.check_count(), 1);
    }
}
