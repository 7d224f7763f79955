//! # Supervisor Binary
//!
//! ## Startup Sequence
//!
//! 1. Parse the command line (usage errors exit 2)
//! 2. Install the tracing subscriber (stderr)
//! 3. Layer overrides: defaults < `SUPERVISOR_*` environment < flags
//! 4. Resolve executables and paths
//! 5. Wire the production adapters and dispatch the subcommand
//!
//! Fatal errors are logged with their category and exit non-zero.

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use validator_supervisor::logging::{self, LogConfig};
use validator_supervisor::{
    Cli, CommandDispatcher, ConfigOverrides, ConfigResolver, SupervisorDependencies,
    SupervisorError,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<SupervisorError>() {
            Some(err) => {
                error!(category = ?err.category(), "{}", err);
                ExitCode::from(err.exit_code())
            }
            None => {
                eprintln!("error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    logging::init_logging(&LogConfig::from_env()).context("failed to initialize logging")?;

    let workdir = match &cli.overrides.workdir {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("failed to determine working directory")?,
    };

    let overrides = ConfigOverrides::from_env()
        .map_err(SupervisorError::from)?
        .merge(cli.overrides.to_overrides());
    let config = ConfigResolver::default()
        .resolve(&workdir, &overrides)
        .map_err(SupervisorError::from)?;

    let deps = SupervisorDependencies::production(&config).context("failed to create RPC client")?;
    let mut dispatcher = CommandDispatcher::new(config, deps, tokio::io::stdout());
    dispatcher.dispatch(cli.command()).await?;
    Ok(())
}
