//! Host configuration store.
//!
//! Each host is a private directory under `<home>/hosts/<name>` holding the
//! persisted parameters, the DRM prerequisites, a link to the application
//! definition and the generated tool configurations.

use crate::ansible::CRED_FILE;
use crate::error::{Error, Result};
use crate::paths::{self, Paths};
use crate::sources;
use appdef::Definition;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted host parameters.
pub const PARAMETERS_FILE: &str = "user_parameters.json";

/// Link to the application definition.
pub const APPLICATION_FILE: &str = "application.yml";

/// Accelize DRM configuration.
pub const DRM_CONF_FILE: &str = "accelize_drm_conf.json";

#[derive(Debug, Serialize, Deserialize)]
struct Parameters {
    provider: Option<String>,
    user_config: Option<PathBuf>,
}

/// What to open or create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRequest {
    /// Host name. A random one is generated on creation when unset.
    pub name: Option<String>,
    /// Application definition, required to create a host.
    pub application: Option<PathBuf>,
    /// Provider, comma separated tokens.
    pub provider: Option<String>,
    /// Extra source directory, defaults to the home directory.
    pub user_config: Option<PathBuf>,
}

/// A host directory and its persisted parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    name: String,
    dir: PathBuf,
    provider: String,
    user_config: PathBuf,
}

impl HostConfig {
    /// Host name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full provider string.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Provider as a definition environment, `None` when unset.
    pub fn environment(&self) -> Option<&str> {
        Some(self.provider.as_str()).filter(|p| !p.is_empty())
    }

    /// First provider token.
    pub fn primary_provider(&self) -> &str {
        sources::primary_provider(&self.provider)
    }

    /// User configuration directory.
    pub fn user_config(&self) -> &Path {
        &self.user_config
    }

    /// Linked application definition.
    pub fn application_path(&self) -> PathBuf {
        self.dir.join(APPLICATION_FILE)
    }

    /// DRM configuration file.
    pub fn drm_conf_path(&self) -> PathBuf {
        self.dir.join(DRM_CONF_FILE)
    }

    /// DRM credentials link.
    pub fn cred_path(&self) -> PathBuf {
        self.dir.join(CRED_FILE)
    }

    /// Load the linked application definition.
    pub fn definition(&self) -> Result<Definition> {
        Ok(Definition::load(self.application_path())?)
    }
}

/// Removes a partially created host directory unless disarmed.
struct CreationGuard<'a> {
    dir: &'a Path,
    armed: bool,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("Removing partially created host {}", self.dir.display());
            if let Err(e) = fs::remove_dir_all(self.dir) {
                log::warn!("Unable to remove {}: {e}", self.dir.display());
            }
        }
    }
}

/// Directory of host configurations.
#[derive(Debug, Clone)]
pub struct HostStore {
    paths: Paths,
}

impl HostStore {
    /// Create a store under `paths`.
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    /// Store layout.
    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Whether a host directory exists.
    pub fn exists(&self, name: &str) -> bool {
        self.paths.host_dir(name).is_dir()
    }

    /// Load an existing host.
    pub fn load(&self, name: &str) -> Result<HostConfig> {
        let dir = self.paths.host_dir(name);
        if !dir.is_dir() {
            return Err(Error::HostNotFound(name.to_string()));
        }
        let parameters: Parameters = sources::read_json(&dir.join(PARAMETERS_FILE))?;

        Ok(HostConfig {
            name: name.to_string(),
            dir,
            provider: parameters.provider.unwrap_or_default(),
            user_config: parameters
                .user_config
                .unwrap_or_else(|| self.paths.home().to_path_buf()),
        })
    }

    /// Load the requested host if it exists, else create it.
    ///
    /// `configure` materializes the tool configurations of a new host.
    pub fn open<F>(&self, request: &HostRequest, configure: F) -> Result<HostConfig>
    where
        F: FnOnce(&HostConfig, &Definition) -> Result<()>,
    {
        if let Some(name) = request.name.as_deref()
            && self.exists(name)
        {
            return self.load(name);
        }
        if request.application.is_none() {
            return Err(Error::config(
                "Require at least an existing host name, or an application to create a new host.",
            ));
        }
        self.create(request, configure)
    }

    /// Create a host. Any failure removes the partially created directory.
    pub fn create<F>(&self, request: &HostRequest, configure: F) -> Result<HostConfig>
    where
        F: FnOnce(&HostConfig, &Definition) -> Result<()>,
    {
        let application = request
            .application
            .as_deref()
            .ok_or_else(|| Error::config("An application definition is required to create a host."))?;
        let definition = Definition::load(application)?;

        let name = match &request.name {
            Some(name) => name.clone(),
            None => uuid::Uuid::new_v4().simple().to_string(),
        };
        let dir = self.paths.host_dir(&name);
        if dir.exists() {
            return Err(Error::config(format!("Configuration '{name}' already exists.")));
        }

        self.paths.ensure_hosts_dir()?;
        paths::create_private_dir(&dir)?;
        let mut guard = CreationGuard {
            dir: &dir,
            armed: true,
        };

        let config = HostConfig {
            name: name.clone(),
            dir: dir.clone(),
            provider: request.provider.clone().unwrap_or_default(),
            user_config: request
                .user_config
                .clone()
                .unwrap_or_else(|| self.paths.home().to_path_buf()),
        };
        log::info!("Creating host {} in {}", name, dir.display());

        sources::write_json(
            &dir.join(PARAMETERS_FILE),
            &Parameters {
                provider: request.provider.clone(),
                user_config: Some(config.user_config.clone()),
            },
        )?;
        self.init_drm(&config, &definition)?;
        sources::symlink(application, &config.application_path())?;
        configure(&config, &definition)?;

        guard.armed = false;
        Ok(config)
    }

    /// Write the DRM configuration and link the credentials.
    fn init_drm(&self, config: &HostConfig, definition: &Definition) -> Result<()> {
        let env = config.environment();
        let use_service = definition
            .get_bool("accelize_drm", "use_service", env)?
            .unwrap_or(true);
        let conf_path = definition.get_str("accelize_drm", "conf_path", env)?;

        let conf = match conf_path {
            Some(conf_path) => {
                let base = definition.path().and_then(Path::parent).unwrap_or(Path::new("."));
                let path = base.join(paths::expand(conf_path));
                sources::read_json::<serde_json::Value>(&path).map_err(|e| match e {
                    Error::Json(e) => Error::config(format!("Invalid Accelize DRM configuration {}: {e}", path.display())),
                    other => other,
                })?
            }
            None if use_service => {
                return Err(Error::config(
                    "Application definition section \"accelize_drm\" require \"conf_path\" value \
                     to be specified if \"use_service\" is true.",
                ));
            }
            None => serde_json::Value::Null,
        };
        sources::write_json(&config.drm_conf_path(), &conf)?;

        let cred_dirs = [self.paths.home(), Path::new("."), config.user_config()];
        let cred = cred_dirs
            .iter()
            .map(|dir| dir.join(CRED_FILE))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                Error::config(format!(
                    "No Accelize DRM credential found. Please, make sure to have your \"{CRED_FILE}\" \
                     file installed in the current directory, \"{}\" or \"{}\".",
                    self.paths.home().display(),
                    config.user_config().display()
                ))
            })?;
        log::debug!("Using Accelize DRM credentials from {}", cred.display());
        sources::symlink(&cred, &config.cred_path())
    }

    /// Names of every host, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let hosts = self.paths.hosts_dir();
        if !hosts.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&hosts).map_err(|e| Error::io(&hosts, e))? {
            let entry = entry.map_err(|e| Error::io(&hosts, e))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Last used host, if it still exists.
    pub fn latest(&self) -> Result<Option<String>> {
        let path = self.paths.latest_file();
        if !path.is_file() {
            return Ok(None);
        }
        let name = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let name = name.trim();
        Ok((!name.is_empty() && self.exists(name)).then(|| name.to_string()))
    }

    /// Record the last used host.
    pub fn set_latest(&self, name: &str) -> Result<()> {
        self.paths.ensure_hosts_dir()?;
        let path = self.paths.latest_file();
        fs::write(&path, name).map_err(|e| Error::io(&path, e))
    }
}
