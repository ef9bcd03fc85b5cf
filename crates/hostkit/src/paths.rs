//! Path resolution for the accelhost home and built-in sources.
//!
//! # Environment Variables
//!
//! - `ACCELHOST_HOME` - Override the home directory (default `~/.accelize`)
//! - `ACCELHOST_DATA_DIR` - Override the built-in sources directory
//!   (default `<data_dir>/accelhost`, for example `~/.local/share/accelhost`)
//!
//! The home directory holds `hosts/`, the installed tools and the optional
//! `config.toml`. It is also a source directory for configuration fragments.

use crate::error::{Error, Result};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Environment variable for the home directory override
pub const ENV_HOME: &str = "ACCELHOST_HOME";

/// Environment variable for the built-in sources directory override
pub const ENV_DATA_DIR: &str = "ACCELHOST_DATA_DIR";

/// Name of the file holding the last used host name.
const LATEST: &str = "latest";

/// Resolved accelhost directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    home: PathBuf,
    data_dir: PathBuf,
}

impl Paths {
    /// Use explicit directories.
    pub fn new(home: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Resolve directories from the environment, then platform defaults.
    pub fn from_env() -> Result<Self> {
        let home = match std::env::var(ENV_HOME) {
            Ok(dir) => {
                let path = expand(&dir);
                log::debug!("Using home from {}: {}", ENV_HOME, path.display());
                path
            }
            Err(_) => dirs::home_dir()
                .ok_or_else(|| Error::config("Could not determine home directory"))?
                .join(".accelize"),
        };

        let data_dir = match std::env::var(ENV_DATA_DIR) {
            Ok(dir) => {
                let path = expand(&dir);
                log::debug!("Using data dir from {}: {}", ENV_DATA_DIR, path.display());
                path
            }
            Err(_) => dirs::data_dir()
                .map(|dir| dir.join("accelhost"))
                .unwrap_or_else(|| home.join("share")),
        };

        Ok(Self { home, data_dir })
    }

    /// Home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Built-in sources root.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Built-in sources of one tool.
    pub fn builtin_dir(&self, tool: &str) -> PathBuf {
        self.data_dir.join(tool)
    }

    /// Parent of every host directory.
    pub fn hosts_dir(&self) -> PathBuf {
        self.home.join("hosts")
    }

    /// Directory of one host.
    pub fn host_dir(&self, name: &str) -> PathBuf {
        self.hosts_dir().join(name)
    }

    /// File holding the last used host name.
    pub fn latest_file(&self) -> PathBuf {
        self.hosts_dir().join(LATEST)
    }

    /// Optional settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Create the hosts directory, private to the user.
    pub fn ensure_hosts_dir(&self) -> Result<PathBuf> {
        let dir = self.hosts_dir();
        create_private_dir(&dir)?;
        Ok(dir)
    }
}

/// Create a directory (and parents) readable only by the user.
pub fn create_private_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| Error::io(path, e))?;

    Ok(())
}

/// Expand `~` and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    /// Run `f` with `key` set to `value`.
    ///
    /// # Safety
    /// Uses unsafe env::set_var/remove_var. Only use in single-threaded tests.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    fn without_env_var<F, R>(key: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::remove_var(key) };
        let result = f();
        if let Some(v) = original {
            // SAFETY: Tests run in isolation
            unsafe { env::set_var(key, v) };
        }
        result
    }

    #[test]
    fn test_layout() {
        let paths = Paths::new("/opt/home", "/opt/share");
        assert_eq!(paths.hosts_dir(), PathBuf::from("/opt/home/hosts"));
        assert_eq!(paths.host_dir("abc"), PathBuf::from("/opt/home/hosts/abc"));
        assert_eq!(paths.latest_file(), PathBuf::from("/opt/home/hosts/latest"));
        assert_eq!(paths.builtin_dir("terraform"), PathBuf::from("/opt/share/terraform"));
        assert_eq!(paths.settings_file(), PathBuf::from("/opt/home/config.toml"));
    }

    #[test]
    fn test_home_env_override() {
        with_env_var(ENV_HOME, "/custom/accelhost/home", || {
            let paths = Paths::from_env().unwrap();
            assert_eq!(paths.home(), Path::new("/custom/accelhost/home"));
        });
    }

    #[test]
    fn test_home_default() {
        without_env_var(ENV_HOME, || {
            let paths = Paths::from_env().unwrap();
            assert_eq!(paths.home(), dirs::home_dir().unwrap().join(".accelize"));
        });
    }

    #[test]
    fn test_data_dir_env_override_with_tilde() {
        let expected = dirs::home_dir().unwrap().join("accelhost-data-test");
        with_env_var(ENV_DATA_DIR, "~/accelhost-data-test", || {
            let paths = Paths::from_env().unwrap();
            assert_eq!(paths.data_dir(), expected);
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_hosts_dir_is_private() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::new(dir.path().join("home"), dir.path().join("share"));
        let hosts = paths.ensure_hosts_dir().unwrap();
        let mode = fs::metadata(&hosts).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }
}
