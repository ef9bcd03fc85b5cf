//! Terraform driver.
//!
//! Fragments are linked into the host directory, next to a generated
//! variables file. Every command runs inside the host directory.

use crate::error::{Error, Result};
use crate::retry::{self, RetryCallback, RetryConfig};
use crate::runner::{Output, Runner};
use crate::sources::{self, Source};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toolchain::Tool;

/// Fragment extensions used by Terraform.
pub const INCLUDE: &[&str] = &[".tf", ".tfvars", ".tf.json", ".tfvars.json"];

/// Generated variables file, loaded automatically by Terraform.
pub const VARIABLES_FILE: &str = "generated.auto.tfvars.json";

/// Local state file.
pub const STATE_FILE: &str = "terraform.tfstate";

/// Saved plan file.
pub const PLAN_FILE: &str = "tfplan";

/// Drives Terraform in one host directory.
pub struct Terraform {
    dir: PathBuf,
    runner: Arc<dyn Runner>,
    toolchain: Arc<toolchain::Client>,
    initialized: Cell<bool>,
}

impl Terraform {
    /// Create a driver for `dir`.
    pub fn new(dir: impl Into<PathBuf>, runner: Arc<dyn Runner>, toolchain: Arc<toolchain::Client>) -> Self {
        Self {
            dir: dir.into(),
            runner,
            toolchain,
            initialized: Cell::new(false),
        }
    }

    /// Host directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Link fragments and the plugin cache, and write the variables file.
    ///
    /// Null variables are omitted. `ansible` is set to `playbook_exec`.
    pub fn create_configuration(&self, sources: &[Source], variables: &Map<String, Value>, playbook_exec: &str) -> Result<()> {
        let dot_terraform = self.dir.join(".terraform");
        fs::create_dir_all(&dot_terraform).map_err(|e| Error::io(&dot_terraform, e))?;

        let plugins = self.toolchain.plugins_dir(Tool::Terraform);
        fs::create_dir_all(&plugins).map_err(|e| Error::io(&plugins, e))?;
        sources::symlink(&plugins, &dot_terraform.join("plugins"))?;

        for (name, path) in sources {
            sources::replace_symlink(path, &self.dir.join(name))?;
        }

        let mut generated: Map<String, Value> = variables
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        generated.insert("ansible".to_string(), Value::String(playbook_exec.to_string()));
        sources::write_json(&self.dir.join(VARIABLES_FILE), &generated)?;

        log::debug!("Terraform configuration created with {} fragment(s)", sources.len());
        Ok(())
    }

    /// Initialize the working directory, once per driver.
    pub fn init(&self) -> Result<()> {
        if self.initialized.get() {
            return Ok(());
        }
        self.exec(&["init", "-no-color", "-input=false"], true)?;
        self.initialized.set(true);
        Ok(())
    }

    /// Save a plan and return its text.
    pub fn plan(&self) -> Result<String> {
        self.init()?;
        let output = self.exec(&["plan", "-no-color", "-input=false", "-out=tfplan"], true)?;
        Ok(output.stdout)
    }

    /// Apply the saved plan if any, else the configuration.
    ///
    /// Known transient errors are retried according to `retry`.
    pub fn apply(&self, quiet: bool, retry: &RetryConfig, callback: Option<&dyn RetryCallback>) -> Result<()> {
        self.init()?;
        retry::with_retry(retry, callback, || {
            let mut args = vec!["apply", "-no-color", "-auto-approve", "-input=false"];
            if self.dir.join(PLAN_FILE).is_file() {
                args.push(PLAN_FILE);
            }
            self.exec(&args, quiet).map(|_| ())
        })
    }

    /// Destroy every managed resource.
    pub fn destroy(&self, quiet: bool) -> Result<()> {
        self.init()?;
        self.exec(&["destroy", "-no-color", "-auto-approve"], quiet)?;
        Ok(())
    }

    /// Refresh the state against real resources. No-op without state.
    pub fn refresh(&self, quiet: bool) -> Result<()> {
        if !self.has_state() {
            log::debug!("No Terraform state to refresh");
            return Ok(());
        }
        self.init()?;
        self.exec(&["refresh", "-no-color", "-input=false"], quiet)?;
        Ok(())
    }

    /// Output values, by name.
    pub fn output(&self) -> Result<Map<String, Value>> {
        let output = self.exec(&["output", "-no-color", "-json"], true)?;
        let raw: Map<String, Value> = serde_json::from_str(&output.stdout)?;
        Ok(raw
            .into_iter()
            .map(|(key, mut entry)| {
                let value = entry.get_mut("value").map(Value::take).unwrap_or(Value::Null);
                (key, value)
            })
            .collect())
    }

    /// Identifiers of managed resources.
    ///
    /// A failure is an empty list when there is no state file yet.
    pub fn state_list(&self) -> Result<Vec<String>> {
        let output = self.run(&["state", "list"], true)?;
        if !output.success {
            if !self.has_state() {
                return Ok(Vec::new());
            }
            return Err(Error::CommandFailed {
                tool: Tool::Terraform.to_string(),
                message: output.error_text(),
            });
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Whether a local state file exists.
    pub fn has_state(&self) -> bool {
        self.dir.join(STATE_FILE).is_file()
    }

    fn exec(&self, args: &[&str], capture: bool) -> Result<Output> {
        self.run(args, capture)?.check(Tool::Terraform.name())
    }

    fn run(&self, args: &[&str], capture: bool) -> Result<Output> {
        let program = self.toolchain.executable(Tool::Terraform)?;
        self.runner.run(&program, args, &self.dir, capture)
    }
}
