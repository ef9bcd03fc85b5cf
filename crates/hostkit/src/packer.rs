//! Packer driver and build manifest.

use crate::error::{Error, Result};
use crate::runner::{Output, Runner};
use crate::sources::{self, Source};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toolchain::Tool;

/// Fragment extensions used by Packer.
pub const INCLUDE: &[&str] = &[".json"];

/// Terraform JSON fragments share the extension.
pub const EXCLUDE: &[&str] = &[".tf.json", ".tfvars.json"];

/// Merged template.
pub const TEMPLATE_FILE: &str = "template.json";

/// Manifest written by the `manifest` post-processor.
pub const MANIFEST_FILE: &str = "packer-manifest.json";

/// Packer build manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// Every recorded build.
    #[serde(default)]
    pub builds: Vec<Build>,
    /// Run identifier of the last build.
    #[serde(default)]
    pub last_run_uuid: String,
}

/// One build recorded in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Build {
    /// Builder name from the template.
    #[serde(default)]
    pub name: String,
    /// Builder type, like `amazon-ebs` or `file`.
    pub builder_type: String,
    /// Produced files.
    #[serde(default)]
    pub files: Vec<BuildFile>,
    /// Builder specific artifact identifier.
    #[serde(default)]
    pub artifact_id: String,
    /// Run identifier.
    pub packer_run_uuid: String,
}

/// A file produced by a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BuildFile {
    /// File name.
    pub name: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

impl Manifest {
    /// Read a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Manifest(format!("{} not found", path.display())));
        }
        sources::read_json(path)
    }

    /// Build of the last run.
    pub fn last_build(&self) -> Result<&Build> {
        self.builds
            .iter()
            .find(|build| build.packer_run_uuid == self.last_run_uuid)
            .ok_or_else(|| {
                Error::Manifest(format!("No packer manifest for run with UUID {}", self.last_run_uuid))
            })
    }
}

impl Build {
    /// Image identifier produced by this build.
    pub fn artifact(&self) -> Result<String> {
        match self.builder_type.as_str() {
            "file" => self
                .files
                .first()
                .map(|file| file.name.clone())
                .ok_or_else(|| Error::Manifest(format!("build '{}' produced no file", self.name))),
            "amazon-ebs" => Ok(self
                .artifact_id
                .rsplit(':')
                .next()
                .unwrap_or_default()
                .to_string()),
            _ => Ok(self.artifact_id.clone()),
        }
    }
}

/// Drives Packer in one host directory.
pub struct Packer {
    dir: PathBuf,
    runner: Arc<dyn Runner>,
    toolchain: Arc<toolchain::Client>,
}

impl Packer {
    /// Create a driver for `dir`.
    pub fn new(dir: impl Into<PathBuf>, runner: Arc<dyn Runner>, toolchain: Arc<toolchain::Client>) -> Self {
        Self {
            dir: dir.into(),
            runner,
            toolchain,
        }
    }

    /// Host directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Merge fragments then variables into the template.
    pub fn create_configuration(&self, sources: &[Source], variables: &Map<String, Value>) -> Result<()> {
        // Later directories win for same-named fragments
        let ordered: Vec<Source> = sources
            .iter()
            .cloned()
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .collect();

        let mut template = sources::merge_json(&ordered)?;
        sources::deep_merge_json(&mut template, json!({ "variables": variables }));
        sources::write_json(&self.dir.join(TEMPLATE_FILE), &template)?;

        log::debug!("Packer template merged from {} fragment(s)", ordered.len());
        Ok(())
    }

    /// Build the image and return the build of this run.
    pub fn build(&self, quiet: bool) -> Result<Build> {
        let template = self.dir.join(TEMPLATE_FILE).to_string_lossy().into_owned();
        self.exec(&["build", "-color=false", template.as_str()], quiet)?;
        let manifest = Manifest::load(&self.dir.join(MANIFEST_FILE))?;
        manifest.last_build().cloned()
    }

    /// Check the template.
    pub fn validate(&self) -> Result<()> {
        self.exec(&["validate", TEMPLATE_FILE], true)?;
        Ok(())
    }

    fn exec(&self, args: &[&str], capture: bool) -> Result<Output> {
        let program = self.toolchain.executable(Tool::Packer)?;
        self.runner
            .run(&program, args, &self.dir, capture)?
            .check(Tool::Packer.name())
    }
}
