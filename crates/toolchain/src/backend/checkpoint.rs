//! HashiCorp checkpoint API backend.
//!
//! `https://checkpoint-api.hashicorp.com/v1/check/<tool>` returns the latest
//! version and the base URL of its downloads on `releases.hashicorp.com`.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Checkpoint, Tool};

/// Maximum download size (release archives are well under this).
const MAX_BODY_SIZE: u64 = 512 * 1024 * 1024;

/// Default checkpoint API base URL.
pub const CHECKPOINT_API: &str = "https://checkpoint-api.hashicorp.com";

/// Checkpoint API backend.
pub struct CheckpointBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Checkpoint API base URL.
    api_base: String,
}

impl CheckpointBackend {
    /// Create a new checkpoint backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_api_base(CHECKPOINT_API)
    }

    /// Create a backend with a custom API base.
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into(),
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn check_url(&self, tool: Tool) -> String {
        format!("{}/v1/check/{}", self.api_base.trim_end_matches('/'), tool.name())
    }
}

impl Default for CheckpointBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CheckpointBackend {
    fn check(&self, tool: Tool) -> Result<Checkpoint> {
        let url = self.check_url(tool);
        log::debug!("Fetching {tool} release information from {url}");

        let checkpoint: Checkpoint = self
            .agent
            .get(&url)
            .header("User-Agent", "accelhost")
            .call()?
            .body_mut()
            .read_json()?;

        Ok(checkpoint)
    }

    fn download(&self, tool: Tool, url: &str) -> Result<Vec<u8>> {
        log::debug!("Downloading {url}");

        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", "accelhost")
            .call()
            .map_err(|e| Error::DownloadFailed {
                tool: tool.to_string(),
                message: e.to_string(),
            })?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_vec()
            .map_err(|e| Error::DownloadFailed {
                tool: tool.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_url() {
        let backend = CheckpointBackend::new();
        assert_eq!(
            backend.check_url(Tool::Terraform),
            "https://checkpoint-api.hashicorp.com/v1/check/terraform"
        );
    }

    #[test]
    fn test_custom_api_base() {
        let backend = CheckpointBackend::with_api_base("http://localhost:8080/");
        assert_eq!(backend.api_base(), "http://localhost:8080/");
        assert_eq!(
            backend.check_url(Tool::Packer),
            "http://localhost:8080/v1/check/packer"
        );
    }
}
