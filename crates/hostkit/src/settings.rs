//! Optional user settings from `<home>/config.toml`.
//!
//! ```toml
//! [apply]
//! retries = 10
//! delay_secs = 1
//!
//! [tools]
//! offline = false
//! gpg_key = "~/.accelize/hashicorp.asc"
//! ```

use crate::error::{Error, Result};
use crate::paths;
use crate::retry::RetryConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User settings. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Apply retry behavior.
    pub apply: ApplySettings,
    /// Tool resolution.
    pub tools: ToolSettings,
}

/// `[apply]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplySettings {
    /// Retries of a transient apply failure.
    pub retries: u32,
    /// Seconds between attempts.
    pub delay_secs: f64,
}

impl Default for ApplySettings {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            retries: retry.retries,
            delay_secs: retry.delay.as_secs_f64(),
        }
    }
}

impl ApplySettings {
    /// Retry configuration for apply.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            retries: self.retries,
            delay: Duration::try_from_secs_f64(self.delay_secs).unwrap_or_default(),
        }
    }
}

/// `[tools]` table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Never check for new tool releases.
    pub offline: bool,
    /// HashiCorp public key to import before signature verification.
    pub gpg_key: Option<String>,
}

impl ToolSettings {
    /// Expanded public key path.
    pub fn gpg_key_path(&self) -> Option<PathBuf> {
        self.gpg_key.as_deref().map(paths::expand)
    }
}

impl Settings {
    /// Load settings, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings file at {}", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&text)
            .map_err(|e| Error::config(format!("Invalid settings in {}: {e}", path.display())))
    }

    /// Parse settings from TOML text.
    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.apply.retry_config(), RetryConfig::default());
        assert!(!settings.tools.offline);
    }

    #[test]
    fn test_parse_partial() {
        let settings = Settings::parse("[apply]\nretries = 3\n\n[tools]\noffline = true\n").unwrap();
        assert_eq!(settings.apply.retries, 3);
        assert_eq!(settings.apply.delay_secs, 1.0);
        assert!(settings.tools.offline);
        assert!(settings.tools.gpg_key_path().is_none());
    }

    #[test]
    fn test_retry_config_delay() {
        let settings = Settings::parse("[apply]\ndelay_secs = 0.5\n").unwrap();
        assert_eq!(settings.apply.retry_config().delay, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[apply]\nretry = 3\n").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid settings"));
    }
}
