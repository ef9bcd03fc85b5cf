//! Host lifecycle commands.

use crate::Context;
use crate::cli::{BuildArgs, DestroyArgs, InitArgs};
use crate::ui;
use anyhow::{Context as _, Result, bail};
use hostkit::{Host, HostOptions, HostRequest, HostStore, Paths, Settings, SystemRunner};
use std::sync::Arc;
use toolchain::verify::GpgVerifier;

/// Host output to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    SshPrivateKey,
    SshUser,
    PrivateIp,
    PublicIp,
}

/// Store, settings and tool client shared by every host command.
struct Workspace {
    store: HostStore,
    settings: Settings,
    toolchain: Arc<toolchain::Client>,
}

impl Workspace {
    fn load() -> Result<Self> {
        let paths = Paths::from_env()?;
        let settings = Settings::load(&paths.settings_file())?;

        let mut client = toolchain::Client::new(paths.home()).offline(settings.tools.offline);
        if let Some(key) = settings.tools.gpg_key_path() {
            client = client.verifier(Box::new(GpgVerifier::with_public_key(key)));
        }

        Ok(Self {
            store: HostStore::new(paths),
            settings,
            toolchain: Arc::new(client),
        })
    }

    fn options(&self, host: HostRequest) -> HostOptions {
        HostOptions {
            host,
            retry: self.settings.apply.retry_config(),
            ..HostOptions::default()
        }
    }

    fn open(&self, options: HostOptions) -> Result<Host> {
        let host = Host::open(&self.store, self.toolchain.clone(), Arc::new(SystemRunner), options)?;
        self.store
            .set_latest(host.name())
            .context("Failed to record the last used host")?;
        Ok(host)
    }

    /// Open an existing host, by name or the last used one.
    fn open_existing(&self, name: Option<&str>) -> Result<Host> {
        let name = resolve_name(&self.store, name)?;
        self.open(self.options(HostRequest {
            name: Some(name),
            ..HostRequest::default()
        }))
    }
}

/// Name of an existing host: the given one, else the last used one.
pub fn resolve_name(store: &HostStore, name: Option<&str>) -> Result<String> {
    match name {
        Some(name) if store.exists(name) => Ok(name.to_string()),
        Some(name) => Err(hostkit::Error::HostNotFound(name.to_string()).into()),
        None => match store.latest()? {
            Some(name) => Ok(name),
            None => bail!(
                "A new configuration needs to be created first with \"init\", \
                 or an existing configuration must be specified with \"--name\"."
            ),
        },
    }
}

/// Create a host configuration and print its name.
pub fn init(ctx: &Context, args: InitArgs) -> Result<()> {
    let workspace = Workspace::load()?;
    let host = workspace.open(workspace.options(HostRequest {
        name: args.name,
        application: Some(args.application),
        provider: args.provider,
        user_config: args.user_config.map(|p| hostkit::paths::expand(&p.to_string_lossy())),
    }))?;

    if !ctx.quiet {
        ui::success(&format!("Host configuration ready in {}", host.dir().display()));
    }
    println!("{}", host.name());
    Ok(())
}

/// Print the infrastructure plan.
pub fn plan(_ctx: &Context, name: Option<&str>) -> Result<()> {
    let host = Workspace::load()?.open_existing(name)?;
    println!("{}", host.plan()?);
    Ok(())
}

/// Apply the infrastructure.
pub fn apply(ctx: &Context, name: Option<&str>) -> Result<()> {
    let host = Workspace::load()?.open_existing(name)?;
    if !ctx.quiet {
        ui::info(&format!("Applying host {}", host.name()));
    }
    host.apply(ctx.quiet)?;
    if !ctx.quiet {
        ui::success("Infrastructure applied");
    }
    Ok(())
}

/// Build the host image and print its identifier.
pub fn build(ctx: &Context, args: BuildArgs) -> Result<()> {
    let host = Workspace::load()?.open_existing(args.host.name.as_deref())?;
    if !ctx.quiet {
        ui::info(&format!("Building image for host {}", host.name()));
    }
    let image = host.build(args.update_application, ctx.quiet)?;
    if args.update_application && !ctx.quiet {
        ui::success(&format!("Application definition now uses image {image}"));
    }
    println!("{image}");
    Ok(())
}

/// Destroy the infrastructure, optionally deleting the host configuration.
pub fn destroy(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let mut host = Workspace::load()?.open_existing(args.host.name.as_deref())?;
    if !ctx.quiet {
        ui::info(&format!("Destroying host {}", host.name()));
    }
    host.destroy(ctx.quiet, Some(args.delete))?;
    host.close()?;

    if !ctx.quiet {
        ui::success("Infrastructure destroyed");
        if args.delete {
            ui::dim(&format!("Removed {}", host.dir().display()));
        }
    }
    Ok(())
}

/// Print one host output.
pub fn output(_ctx: &Context, name: Option<&str>, output: Output) -> Result<()> {
    let host = Workspace::load()?.open_existing(name)?;
    let value = match output {
        Output::SshPrivateKey => host.ssh_private_key()?.display().to_string(),
        Output::SshUser => host.ssh_user()?,
        Output::PrivateIp => host.private_ip()?,
        Output::PublicIp => host.public_ip()?,
    };
    println!("{value}");
    Ok(())
}

/// Store from the environment, for commands not opening a host.
pub fn store() -> Result<HostStore> {
    Ok(HostStore::new(Paths::from_env()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> HostStore {
        HostStore::new(Paths::new(temp.path().join("home"), temp.path().join("share")))
    }

    #[test]
    fn test_resolve_name_requires_init() {
        let temp = TempDir::new().unwrap();
        let err = resolve_name(&store(&temp), None).unwrap_err();
        assert!(err.to_string().contains("needs to be created first with \"init\""));
    }

    #[test]
    fn test_resolve_name_missing_host() {
        let temp = TempDir::new().unwrap();
        let err = resolve_name(&store(&temp), Some("nope")).unwrap_err();
        assert_eq!(err.to_string(), "No configuration named 'nope'");
    }

    #[test]
    fn test_resolve_name_latest() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        fs::create_dir_all(store.paths().host_dir("host1")).unwrap();
        fs::create_dir_all(store.paths().host_dir("host2")).unwrap();
        store.set_latest("host2").unwrap();

        assert_eq!(resolve_name(&store, None).unwrap(), "host2");
        assert_eq!(resolve_name(&store, Some("host1")).unwrap(), "host1");
    }
}
