mod cli;
mod commands;
mod report;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use commands::host::Output;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context { quiet: cli.quiet };

    match run(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report::print(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Init(args) => commands::host::init(ctx, args),
        Command::Plan(args) => commands::host::plan(ctx, args.name.as_deref()),
        Command::Apply(args) => commands::host::apply(ctx, args.name.as_deref()),
        Command::Build(args) => commands::host::build(ctx, args),
        Command::Destroy(args) => commands::host::destroy(ctx, args),
        Command::SshPrivateKey(args) => {
            commands::host::output(ctx, args.name.as_deref(), Output::SshPrivateKey)
        }
        Command::SshUser(args) => commands::host::output(ctx, args.name.as_deref(), Output::SshUser),
        Command::PrivateIp(args) => {
            commands::host::output(ctx, args.name.as_deref(), Output::PrivateIp)
        }
        Command::PublicIp(args) => commands::host::output(ctx, args.name.as_deref(), Output::PublicIp),
        Command::List => commands::list::run(ctx),
        Command::Lint { file } => commands::lint::run(ctx, &file),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "accelhost", &mut io::stdout());
            Ok(())
        }
    }
}
