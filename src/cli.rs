use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "accelhost")]
#[command(author = "Accelhost Contributors")]
#[command(version)]
#[command(about = "Provision hosts for FPGA accelerated applications", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Hide tool outputs and non-essential messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new host configuration
    Init(InitArgs),

    /// Plan the host infrastructure changes
    Plan(NameArgs),

    /// Create or update the host infrastructure
    Apply(NameArgs),

    /// Build the host virtual machine image
    Build(BuildArgs),

    /// Destroy the host infrastructure
    Destroy(DestroyArgs),

    /// Print the host SSH private key path
    SshPrivateKey(NameArgs),

    /// Print the host SSH user
    SshUser(NameArgs),

    /// Print the host private IP address
    PrivateIp(NameArgs),

    /// Print the host public IP address
    PublicIp(NameArgs),

    /// List host configurations
    List,

    /// Check an application definition file
    Lint {
        /// Application definition file
        file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct NameArgs {
    /// Host name, defaults to the last used host
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Host name, generated when not specified
    #[arg(short, long)]
    pub name: Option<String>,

    /// Application definition file
    #[arg(short, long)]
    pub application: PathBuf,

    /// Provider, optionally followed by comma separated parameters
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Extra directory with user configuration sources
    #[arg(short = 'c', long)]
    pub user_config: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub host: NameArgs,

    /// Use the built image in the application definition
    #[arg(short, long)]
    pub update_application: bool,
}

#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub host: NameArgs,

    /// Also delete the host configuration
    #[arg(short, long)]
    pub delete: bool,
}
