//! Command-line surface.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;
use crate::domain::genesis::HashesPerTick;

/// Lifecycle supervisor for a single validator node
#[derive(Parser, Debug)]
#[command(name = "supervisor")]
#[command(about = "Bootstrap genesis, launch and supervise a validator node")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl Cli {
    /// The requested subcommand; `start` when none is given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Start)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Clean up, recreate genesis, launch the validator and wait for health
    Start,
    /// Stop the supervised validator
    Stop,
    /// Stop, then start
    Restart,
    /// Show process liveness and RPC health
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the tail of the validator log
    Logs {
        /// Number of lines to print
        #[arg(short = 'n', long, default_value_t = 100)]
        lines: usize,
    },
    /// Follow the validator log until interrupted
    Attach,
    /// Run the getHealth, getSlot and getVersion probes
    Test,
}

/// Global options; each maps onto a `SUPERVISOR_*` variable.
#[derive(Args, Debug, Clone, Default)]
pub struct OverrideArgs {
    /// Working directory the default paths are rooted at
    #[arg(long, global = true, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Ledger directory
    #[arg(long, global = true, value_name = "DIR")]
    pub ledger: Option<PathBuf>,

    /// Directory holding the four key-pair files
    #[arg(long, global = true, value_name = "DIR")]
    pub keys: Option<PathBuf>,

    /// Genesis fixtures directory
    #[arg(long, global = true, value_name = "DIR")]
    pub fixtures: Option<PathBuf>,

    /// Directory searched first for the validator executable
    #[arg(long, global = true, value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,

    /// RPC bind address
    #[arg(long, global = true)]
    pub rpc_bind_address: Option<IpAddr>,

    /// RPC port
    #[arg(long, global = true)]
    pub rpc_port: Option<u16>,

    /// Gossip port
    #[arg(long, global = true)]
    pub gossip_port: Option<u16>,

    /// Ledger size cap in shreds
    #[arg(long, global = true)]
    pub limit_ledger_size: Option<u64>,

    /// Bootstrap validator stake in lamports
    #[arg(long, global = true)]
    pub stake_lamports: Option<u64>,

    /// Faucet funding in lamports
    #[arg(long, global = true)]
    pub faucet_lamports: Option<u64>,

    /// PoH hashes per tick: auto, sleep, or a count
    #[arg(long, global = true)]
    pub hashes_per_tick: Option<HashesPerTick>,
}

impl OverrideArgs {
    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            ledger_dir: self.ledger.clone(),
            keys_dir: self.keys.clone(),
            fixtures_dir: self.fixtures.clone(),
            bin_dir: self.bin_dir.clone(),
            rpc_bind_address: self.rpc_bind_address,
            rpc_port: self.rpc_port,
            gossip_port: self.gossip_port,
            limit_ledger_size: self.limit_ledger_size,
            stake_lamports: self.stake_lamports,
            faucet_lamports: self.faucet_lamports,
            hashes_per_tick: self.hashes_per_tick,
        }
    }
}
