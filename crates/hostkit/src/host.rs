//! Host lifecycle orchestration.

use crate::ansible::Ansible;
use crate::error::{Error, Result};
use crate::packer::{self, Packer};
use crate::paths::Paths;
use crate::retry::{LogCallback, RetryConfig};
use crate::runner::Runner;
use crate::sources;
use crate::store::{HostConfig, HostRequest, HostStore};
use crate::terraform::{self, Terraform};
use crate::variables;
use appdef::Definition;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How to open a host and what to do when it is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOptions {
    /// Host to open or create.
    pub host: HostRequest,
    /// Destroy managed infrastructure on close.
    pub destroy_on_exit: bool,
    /// Keep the host directory on close.
    pub keep_config: bool,
    /// Apply retry behavior.
    pub retry: RetryConfig,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            host: HostRequest::default(),
            destroy_on_exit: false,
            keep_config: true,
            retry: RetryConfig::default(),
        }
    }
}

/// The three tool drivers of one host directory.
struct Tools {
    terraform: Terraform,
    packer: Packer,
    ansible: Ansible,
}

impl Tools {
    fn new(dir: &Path, runner: &Arc<dyn Runner>, toolchain: &Arc<toolchain::Client>) -> Self {
        Self {
            terraform: Terraform::new(dir, runner.clone(), toolchain.clone()),
            packer: Packer::new(dir, runner.clone(), toolchain.clone()),
            ansible: Ansible::new(dir, runner.clone()),
        }
    }

    /// Generate every tool configuration of a new host.
    fn create_configuration(&self, paths: &Paths, config: &HostConfig, definition: &Definition) -> Result<()> {
        let app_type = definition.get_str("application", "type", config.environment())?;
        let filters = sources::source_filters(config.provider(), app_type);
        let user_config = Some(config.user_config());
        let playbook_exec = Ansible::playbook_exec();

        let dirs = sources::source_dirs(Some(&paths.builtin_dir("terraform")), paths.home(), user_config);
        let fragments = sources::list_sources(&dirs, &filters, terraform::INCLUDE, &[])?;
        self.terraform
            .create_configuration(&fragments, &variables::terraform(config, definition)?, &playbook_exec)?;

        let dirs = sources::source_dirs(Some(&paths.builtin_dir("ansible")), paths.home(), user_config);
        self.ansible
            .create_configuration(&dirs, &filters, &variables::ansible(config, definition)?)?;

        let dirs = sources::source_dirs(Some(&paths.builtin_dir("packer")), paths.home(), user_config);
        let fragments = sources::list_sources(&dirs, &filters, packer::INCLUDE, packer::EXCLUDE)?;
        self.packer
            .create_configuration(&fragments, &variables::packer(config, &playbook_exec))?;

        Ok(())
    }
}

/// An opened host.
///
/// Dropping the host closes it: see [`Host::close`].
pub struct Host {
    config: HostConfig,
    tools: Tools,
    outputs: RefCell<Option<Map<String, Value>>>,
    destroy_on_exit: bool,
    keep_config: bool,
    retry: RetryConfig,
    closed: bool,
}

impl Host {
    /// Load an existing host, or create one from an application definition.
    pub fn open(
        store: &HostStore,
        toolchain: Arc<toolchain::Client>,
        runner: Arc<dyn Runner>,
        options: HostOptions,
    ) -> Result<Self> {
        let config = store.open(&options.host, |config, definition| {
            Tools::new(config.dir(), &runner, &toolchain).create_configuration(store.paths(), config, definition)
        })?;
        let tools = Tools::new(config.dir(), &runner, &toolchain);

        Ok(Self {
            config,
            tools,
            outputs: RefCell::new(None),
            destroy_on_exit: options.destroy_on_exit,
            keep_config: options.keep_config,
            retry: options.retry,
            closed: false,
        })
    }

    /// Host name.
    pub fn name(&self) -> &str {
        self.config.name()
    }

    /// Host directory.
    pub fn dir(&self) -> &Path {
        self.config.dir()
    }

    /// Persisted configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    // =========================================================================
    // Infrastructure
    // =========================================================================

    /// Plan the infrastructure changes and return the plan text.
    pub fn plan(&self) -> Result<String> {
        self.tools.terraform.plan()
    }

    /// Create or update the infrastructure.
    pub fn apply(&self, quiet: bool) -> Result<()> {
        self.outputs.replace(None);
        self.tools.terraform.apply(quiet, &self.retry, Some(&LogCallback))
    }

    /// Destroy the infrastructure.
    ///
    /// `delete`, when set, decides whether the host directory is removed on
    /// close.
    pub fn destroy(&mut self, quiet: bool, delete: Option<bool>) -> Result<()> {
        if let Some(delete) = delete {
            self.keep_config = !delete;
        }
        self.tools.terraform.destroy(quiet)?;
        self.outputs.replace(None);
        Ok(())
    }

    /// Refresh the infrastructure state.
    pub fn refresh(&self, quiet: bool) -> Result<()> {
        self.outputs.replace(None);
        self.tools.terraform.refresh(quiet)
    }

    /// Identifiers of managed resources.
    pub fn state_list(&self) -> Result<Vec<String>> {
        self.tools.terraform.state_list()
    }

    // =========================================================================
    // Image and playbook
    // =========================================================================

    /// Build the virtual machine image and return its identifier.
    ///
    /// With `update_definition`, the definition now uses the image for the
    /// host provider.
    pub fn build(&self, update_definition: bool, quiet: bool) -> Result<String> {
        let artifact = self.tools.packer.build(quiet)?.artifact()?;
        log::info!("Built image {artifact}");

        if update_definition {
            let env = self.config.environment();
            let mut definition = self.config.definition()?;
            definition.set("package", "type", env, "vm_image".into())?;
            definition.set("package", "name", env, artifact.as_str().into())?;
            definition.save(None)?;
        }
        Ok(artifact)
    }

    /// Check the image template.
    pub fn validate_image(&self) -> Result<()> {
        self.tools.packer.validate()
    }

    /// Lint the generated playbook.
    pub fn lint(&self) -> Result<()> {
        self.tools.ansible.lint()
    }

    /// Generated playbook.
    pub fn playbook(&self) -> PathBuf {
        self.tools.ansible.playbook()
    }

    // =========================================================================
    // Outputs
    // =========================================================================

    fn output(&self, key: &str) -> Result<Value> {
        if self.outputs.borrow().is_none() {
            let outputs = self.tools.terraform.output()?;
            self.outputs.replace(Some(outputs));
        }
        self.outputs
            .borrow()
            .as_ref()
            .and_then(|outputs| outputs.get(key))
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or(Error::NotApplied)
    }

    fn output_str(&self, key: &str) -> Result<String> {
        Ok(match self.output(key)? {
            Value::String(value) => value,
            other => other.to_string(),
        })
    }

    /// SSH private key path.
    pub fn ssh_private_key(&self) -> Result<PathBuf> {
        let key = self.output_str("host_ssh_private_key")?;
        let path = Path::new(&key);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        Ok(self.dir().join(path.strip_prefix("./").unwrap_or(path)))
    }

    /// SSH user.
    pub fn ssh_user(&self) -> Result<String> {
        self.output_str("remote_user")
    }

    /// Private IP address.
    pub fn private_ip(&self) -> Result<String> {
        self.output_str("host_private_ip")
    }

    /// Public IP address.
    pub fn public_ip(&self) -> Result<String> {
        self.output_str("host_public_ip")
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Release the host.
    ///
    /// Destroys the infrastructure when `destroy_on_exit` is set, then
    /// removes the host directory when `keep_config` is not set and nothing
    /// is managed anymore. Calling it again does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if !self.dir().is_dir() || (!self.destroy_on_exit && self.keep_config) {
            return Ok(());
        }

        if self.destroy_on_exit && !self.state_list()?.is_empty() {
            log::info!("Destroying infrastructure of {}", self.name());
            self.tools.terraform.destroy(true)?;
        }

        if !self.keep_config && self.state_list()?.is_empty() {
            log::info!("Removing host {}", self.name());
            fs::remove_dir_all(self.dir()).map_err(|e| Error::io(self.dir(), e))?;
        }
        Ok(())
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Unable to close host {}: {e}", self.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{MockRunner, Output};
    use crate::store::tests::fixture;
    use crate::terraform::tests::offline_toolchain;
    use std::time::Duration;
    use tempfile::TempDir;

    const PLAYBOOK: &str = "- hosts: all\n  become: true\n";

    struct Setup {
        _temp: TempDir,
        store: HostStore,
        application: PathBuf,
        runner: MockRunner,
        toolchain: Arc<toolchain::Client>,
    }

    impl Setup {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let (store, application) = fixture(&temp);
            let ansible_dir = store.paths().builtin_dir("ansible");
            fs::create_dir_all(ansible_dir.join("roles/common.init")).unwrap();
            fs::create_dir_all(ansible_dir.join("roles/container_service")).unwrap();
            fs::write(ansible_dir.join("playbook.yml"), PLAYBOOK).unwrap();
            let terraform_dir = store.paths().builtin_dir("terraform");
            fs::create_dir_all(&terraform_dir).unwrap();
            fs::write(terraform_dir.join("common.tf"), "").unwrap();
            fs::write(terraform_dir.join("aws.tf"), "").unwrap();
            let packer_dir = store.paths().builtin_dir("packer");
            fs::create_dir_all(&packer_dir).unwrap();
            fs::write(packer_dir.join("common.json"), r#"{"builders": []}"#).unwrap();

            let toolchain = offline_toolchain(&temp.path().join("tools"));
            Self {
                _temp: temp,
                store,
                application,
                runner: MockRunner::new(),
                toolchain,
            }
        }

        fn options(&self) -> HostOptions {
            HostOptions {
                host: HostRequest {
                    name: Some("host".to_string()),
                    application: Some(self.application.clone()),
                    provider: Some("aws".to_string()),
                    user_config: None,
                },
                retry: RetryConfig {
                    retries: 3,
                    delay: Duration::ZERO,
                },
                ..HostOptions::default()
            }
        }

        fn open(&self, options: HostOptions) -> Result<Host> {
            Host::open(&self.store, self.toolchain.clone(), Arc::new(self.runner.clone()), options)
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_open_creates_configuration() {
        let setup = Setup::new();
        let host = setup.open(setup.options()).unwrap();
        let dir = host.dir().to_path_buf();

        assert!(dir.join("common.tf").exists());
        assert!(dir.join("aws.tf").exists());
        assert!(dir.join(terraform::VARIABLES_FILE).is_file());
        assert!(dir.join(packer::TEMPLATE_FILE).is_file());
        assert!(host.playbook().is_file());
        assert!(dir.join("roles/container_service").is_dir());
        assert!(dir.join("application.yml").is_file());
        drop(host);

        // Kept by default
        assert!(dir.is_dir());
    }

    #[test]
    fn test_open_without_application_or_host() {
        let setup = Setup::new();
        let mut options = setup.options();
        options.host.application = None;
        let err = setup.open(options).err().unwrap();
        assert!(err.to_string().starts_with("Require at least an existing host name"));
        assert_eq!(err.category(), crate::ErrorCategory::Configuration);
    }

    #[test]
    fn test_apply_retries_then_fails() {
        let setup = Setup::new();
        setup
            .runner
            .on("apply", Output::failure("Error while waiting for spot request"));
        let host = setup.open(setup.options()).unwrap();

        let err = host.apply(true).unwrap_err();
        assert!(matches!(err, Error::RetryExhausted { retries: 3, .. }));
        assert_eq!(setup.runner.count("apply"), 4);
    }

    #[test]
    fn test_outputs() {
        let setup = Setup::new();
        setup.runner.on(
            "output",
            Output::success(
                r#"{
                  "host_ssh_private_key": {"value": "./ssh_private.pem"},
                  "remote_user": {"value": "centos"},
                  "host_public_ip": {"value": "203.0.113.10"}
                }"#,
            ),
        );
        let host = setup.open(setup.options()).unwrap();

        assert_eq!(host.ssh_private_key().unwrap(), host.dir().join("ssh_private.pem"));
        assert_eq!(host.ssh_user().unwrap(), "centos");
        assert_eq!(host.public_ip().unwrap(), "203.0.113.10");
        assert!(matches!(host.private_ip().unwrap_err(), Error::NotApplied));
        // Memoized until apply
        assert_eq!(setup.runner.count("output"), 1);

        host.apply(true).unwrap();
        host.ssh_user().unwrap();
        assert_eq!(setup.runner.count("output"), 2);
    }

    #[test]
    fn test_build_updates_definition() {
        let setup = Setup::new();
        let host = setup.open(setup.options()).unwrap();
        fs::write(
            host.dir().join(packer::MANIFEST_FILE),
            r#"{"builds": [{"name": "aws", "builder_type": "amazon-ebs",
                "artifact_id": "eu-west-1:ami-42", "packer_run_uuid": "u1"}],
               "last_run_uuid": "u1"}"#,
        )
        .unwrap();

        assert_eq!(host.build(true, true).unwrap(), "ami-42");

        let definition = Definition::load(&setup.application).unwrap();
        assert_eq!(definition.get_str("package", "type", Some("aws")).unwrap(), Some("vm_image"));
        assert_eq!(definition.get_str("package", "name", Some("aws")).unwrap(), Some("ami-42"));
        assert_eq!(definition.get_str("package", "name", None).unwrap(), Some("my_image"));
    }

    #[test]
    fn test_close_removes_directory_without_resources() {
        let setup = Setup::new();
        let mut host = setup.open(setup.options()).unwrap();
        let dir = host.dir().to_path_buf();

        host.destroy(true, Some(true)).unwrap();
        host.close().unwrap();
        assert!(!dir.exists());
        // Idempotent
        host.close().unwrap();
    }

    #[test]
    fn test_close_keeps_directory_with_resources() {
        let setup = Setup::new();
        setup.runner.on("state list", Output::success("aws_instance.host\n"));
        let mut options = setup.options();
        options.keep_config = false;
        let host = setup.open(options).unwrap();
        let dir = host.dir().to_path_buf();

        drop(host);
        assert!(dir.is_dir());
        assert_eq!(setup.runner.count("destroy"), 0);
    }

    #[test]
    fn test_destroy_on_exit_with_resources() {
        let setup = Setup::new();
        setup.runner.once("state list", Output::success("aws_instance.host\n"));
        let mut options = setup.options();
        options.destroy_on_exit = true;
        options.keep_config = false;
        let mut host = setup.open(options).unwrap();
        let dir = host.dir().to_path_buf();

        host.close().unwrap();
        assert_eq!(setup.runner.count("destroy"), 1);
        assert!(!dir.exists());
    }

    #[test]
    fn test_reopen_existing_host() {
        let setup = Setup::new();
        drop(setup.open(setup.options()).unwrap());
        let calls = setup.runner.calls().len();

        let mut options = setup.options();
        options.host.application = None;
        let host = setup.open(options).unwrap();
        assert_eq!(host.name(), "host");
        assert_eq!(setup.runner.calls().len(), calls);
    }
}
