//! Ansible driver.
//!
//! The playbook and roles come from the source directories. Selected roles
//! and their local dependencies are linked into `roles/`, dependencies not
//! found locally are installed from Ansible Galaxy.

use crate::error::{Error, Result};
use crate::runner::Runner;
use crate::sources;
use serde_yaml_ng::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Generated playbook.
pub const PLAYBOOK_FILE: &str = "playbook.yml";

/// Accelize DRM credentials.
pub const CRED_FILE: &str = "cred.json";

/// Roles selected for a host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    /// Roles listed in the playbook.
    pub selected: BTreeSet<String>,
    /// Every local role to link, with its source directory.
    pub local: BTreeMap<String, PathBuf>,
    /// Dependencies to install from Galaxy.
    pub galaxy: BTreeSet<String>,
}

/// Resolve roles matching `filters` and their dependencies.
///
/// `available` maps lowercase role names to their directory.
pub fn resolve_roles(available: &BTreeMap<String, PathBuf>, filters: &[String]) -> Result<RoleSet> {
    let selected: BTreeSet<String> = available
        .keys()
        .filter(|name| sources::matches_filters(name, filters))
        .cloned()
        .collect();

    let mut roles = RoleSet {
        selected: selected.clone(),
        ..RoleSet::default()
    };
    let mut pending: Vec<String> = selected.into_iter().collect();

    while let Some(role) = pending.pop() {
        let Some(path) = available.get(&role) else {
            continue;
        };
        if roles.local.insert(role.clone(), path.clone()).is_some() {
            continue;
        }

        for dependency in role_dependencies(path)? {
            let key = dependency.to_lowercase();
            if available.contains_key(&key) {
                if !roles.local.contains_key(&key) {
                    pending.push(key);
                }
            } else {
                roles.galaxy.insert(dependency);
            }
        }
    }

    Ok(roles)
}

/// Dependencies listed in `meta/main.yml`, as `- name` or `- role: name`.
fn role_dependencies(role: &Path) -> Result<Vec<String>> {
    let meta = role.join("meta").join("main.yml");
    if !meta.is_file() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&meta).map_err(|e| Error::io(&meta, e))?;
    let value: Value = serde_yaml_ng::from_str(&text)?;

    let Some(entries) = value.get("dependencies").and_then(Value::as_sequence) else {
        return Ok(Vec::new());
    };

    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .or_else(|| entry.get("role").and_then(Value::as_str))
                .map(str::to_string)
                .ok_or_else(|| Error::config(format!("Invalid role dependency in {}", meta.display())))
        })
        .collect()
}

/// Playbook role order: `*.init` roles first, each group sorted.
pub fn order_roles(roles: &BTreeSet<String>) -> Vec<String> {
    let (init, rest): (Vec<_>, Vec<_>) = roles.iter().cloned().partition(|role| role.ends_with(".init"));
    init.into_iter().chain(rest).collect()
}

/// Drives Ansible in one host directory.
pub struct Ansible {
    dir: PathBuf,
    runner: Arc<dyn Runner>,
}

impl Ansible {
    /// Create a driver for `dir`.
    pub fn new(dir: impl Into<PathBuf>, runner: Arc<dyn Runner>) -> Self {
        Self {
            dir: dir.into(),
            runner,
        }
    }

    /// Generated playbook path.
    pub fn playbook(&self) -> PathBuf {
        self.dir.join(PLAYBOOK_FILE)
    }

    /// Command running a playbook, passed to Terraform provisioners.
    pub fn playbook_exec() -> String {
        program("ansible-playbook").to_string_lossy().into_owned()
    }

    /// Link roles, install missing dependencies and write the playbook.
    pub fn create_configuration(
        &self,
        source_dirs: &[PathBuf],
        filters: &[String],
        variables: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let mut playbook_src = None;
        let mut available = BTreeMap::new();

        for dir in source_dirs {
            for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
                let entry = entry.map_err(|e| Error::io(dir, e))?;
                let path = entry.path();
                match entry.file_name().to_string_lossy().to_lowercase().as_str() {
                    PLAYBOOK_FILE if path.is_file() => playbook_src = Some(path),
                    CRED_FILE if path.is_file() => sources::symlink(&path, &self.dir.join(CRED_FILE))?,
                    "roles" if path.is_dir() => {
                        for role in fs::read_dir(&path).map_err(|e| Error::io(&path, e))? {
                            let role = role.map_err(|e| Error::io(&path, e))?;
                            available.insert(role.file_name().to_string_lossy().to_lowercase(), role.path());
                        }
                    }
                    _ => {}
                }
            }
        }

        let playbook_src =
            playbook_src.ok_or_else(|| Error::config("No Ansible playbook found in source directories"))?;

        let roles = resolve_roles(&available, filters)?;
        let roles_dir = self.dir.join("roles");
        fs::create_dir_all(&roles_dir).map_err(|e| Error::io(&roles_dir, e))?;
        for (name, path) in &roles.local {
            sources::symlink(path, &roles_dir.join(name))?;
        }

        self.galaxy_install(&roles.galaxy)?;
        self.write_playbook(&playbook_src, &roles.selected, variables)
    }

    fn write_playbook(
        &self,
        source: &Path,
        roles: &BTreeSet<String>,
        variables: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let text = fs::read_to_string(source).map_err(|e| Error::io(source, e))?;
        let mut playbook: Value = serde_yaml_ng::from_str(&text)?;

        let play = playbook
            .as_sequence_mut()
            .and_then(|plays| plays.first_mut())
            .filter(|play| play.is_mapping())
            .ok_or_else(|| Error::config(format!("Invalid Ansible playbook {}", source.display())))?;

        let vars: serde_json::Map<_, _> = variables
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        // Playbook vars are kept unless the host overrides them
        let mut generated = serde_yaml_ng::Mapping::new();
        generated.insert(Value::from("vars"), serde_yaml_ng::to_value(vars)?);
        generated.insert(Value::from("roles"), serde_yaml_ng::to_value(order_roles(roles))?);
        sources::deep_merge_yaml(play, Value::Mapping(generated));

        let path = self.playbook();
        fs::write(&path, serde_yaml_ng::to_string(&playbook)?).map_err(|e| Error::io(&path, e))
    }

    /// Install roles from Ansible Galaxy. No-op when empty.
    pub fn galaxy_install(&self, roles: &BTreeSet<String>) -> Result<()> {
        if roles.is_empty() {
            return Ok(());
        }
        log::info!("Installing roles from Ansible Galaxy: {}", roles.iter().cloned().collect::<Vec<_>>().join(", "));
        let mut args = vec!["install"];
        args.extend(roles.iter().map(String::as_str));
        self.runner
            .run(&program("ansible-galaxy"), &args, &self.dir, false)?
            .check("ansible-galaxy")?;
        Ok(())
    }

    /// Lint the generated playbook.
    pub fn lint(&self) -> Result<()> {
        self.runner
            .run(&program("ansible-lint"), &[PLAYBOOK_FILE, "--nocolor"], &self.dir, true)?
            .check("ansible-lint")?;
        Ok(())
    }
}

/// Ansible utility from `PATH`, or its bare name.
fn program(name: &str) -> PathBuf {
    which::which(name).unwrap_or_else(|_| PathBuf::from(name))
}
