//! corepack CLI

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use corepack_cli::ui::TerminalReporter;
use corepack_cli::{Cli, Commands, cmd, dispatch_target, shim_binary};
use corepack_core::{Config, Context};

#[tokio::main]
async fn main() {
    // Logs share stderr with the reporter; stdout belongs to the child.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let code = match run(std::env::args_os().collect()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(args: Vec<OsString>) -> Result<i32> {
    // Started through a shim: every argument belongs to the package manager.
    if let Some(binary) = args.first().and_then(|arg0| shim_binary(Path::new(arg0))) {
        let ctx = context(false)?;
        return cmd::dispatch::dispatch(&ctx, binary, None, args[1..].to_vec()).await;
    }

    // `corepack yarn@2.2.2 ...`
    if let Some((binary, explicit)) = args
        .get(1)
        .and_then(|arg| arg.to_str())
        .and_then(dispatch_target)
    {
        let ctx = context(false)?;
        return cmd::dispatch::dispatch(&ctx, binary, explicit.as_deref(), args[2..].to_vec())
            .await;
    }

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures.
            return Ok(i32::from(e.use_stderr()));
        }
    };
    let quiet = cli.quiet;

    match cli.command {
        Commands::Prepare {
            descriptor,
            activate,
            all,
            output,
            json,
        } => {
            let ctx = context(quiet)?;
            cmd::prepare::prepare(&ctx, descriptor.as_deref(), all, activate, output, json).await?;
        }
        Commands::Hydrate { archive, activate } => {
            let ctx = context(quiet)?;
            cmd::hydrate::hydrate(&ctx, &archive, activate).await?;
        }
        Commands::Enable {
            install_directory,
            names,
        } => cmd::enable::enable(install_directory, &names)?,
        Commands::Disable {
            install_directory,
            names,
        } => cmd::disable::disable(install_directory, &names)?,
        Commands::Clean => cmd::clean::clean(&Config::from_env()?)?,
    }
    Ok(0)
}

fn context(quiet: bool) -> Result<Context> {
    let config = Config::from_env()?;
    let reporter = Arc::new(TerminalReporter::new(quiet));
    Ok(Context::with_npm_registry(config, reporter)?)
}
