//! # Node Configuration
//!
//! Static run parameters for one supervisor invocation. Immutable once
//! resolved.
//!
//! ## Precedence
//!
//! 1. Command-line flags
//! 2. Environment variables (`SUPERVISOR_*`)
//! 3. Defaults rooted at the working directory
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SUPERVISOR_LEDGER_DIR` | `<workdir>/ledger` |
//! | `SUPERVISOR_KEYS_DIR` | `<workdir>/keys` |
//! | `SUPERVISOR_FIXTURES_DIR` | `<workdir>/fixtures` |
//! | `SUPERVISOR_BIN_DIR` | search list |
//! | `SUPERVISOR_RPC_BIND_ADDRESS` | `127.0.0.1` |
//! | `SUPERVISOR_RPC_PORT` | `8899` |
//! | `SUPERVISOR_GOSSIP_PORT` | `8001` |
//! | `SUPERVISOR_LIMIT_LEDGER_SIZE` | `50000000` |
//! | `SUPERVISOR_STAKE_LAMPORTS` | `500000000000` |
//! | `SUPERVISOR_FAUCET_LAMPORTS` | `1000000000000000` |
//! | `SUPERVISOR_HASHES_PER_TICK` | `auto` |

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{self, Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::errors::ConfigError;
use crate::domain::genesis::HashesPerTick;
use crate::domain::health::RetryPolicy;
use crate::domain::keys::KeyRole;

/// Subdirectory of the ledger root holding genesis and validator state.
pub const GENESIS_SUBDIR: &str = "genesis";

/// Reserved session name. Also the stem of the PID file.
pub const DEFAULT_SESSION_NAME: &str = "production-validator";

/// Resolved locations of the external executables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryPaths {
    pub validator: PathBuf,
    pub genesis: PathBuf,
    pub keygen: PathBuf,
}

/// Complete run configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Ledger root: genesis directory, PID file and log sink.
    pub ledger_dir: PathBuf,
    /// Directory holding the four key-pair files.
    pub keys_dir: PathBuf,
    /// Optional genesis fixtures (primordial accounts).
    pub fixtures_dir: PathBuf,
    /// Discovered executables.
    pub binaries: BinaryPaths,
    pub rpc_bind_address: IpAddr,
    pub rpc_port: u16,
    pub gossip_port: u16,
    /// Port range handed to `--dynamic-port-range`.
    pub dynamic_port_range: (u16, u16),
    /// Initial bootstrap validator stake, in lamports.
    pub stake_lamports: u64,
    /// Bootstrap validator identity balance, in lamports.
    pub bootstrap_validator_lamports: u64,
    pub faucet_lamports: u64,
    /// Ledger size cap in shreds.
    pub limit_ledger_size: u64,
    pub hashes_per_tick: HashesPerTick,
    pub session_name: String,
    /// `RUST_LOG` handed to the validator process.
    pub validator_log_filter: String,
    /// How long a fresh launch must survive before it counts as started.
    pub launch_grace: Duration,
    /// How long `stop` waits after SIGTERM before escalating to SIGKILL.
    pub stop_timeout: Duration,
    /// Health poll budget used by `start`.
    pub health_policy: RetryPolicy,
}

impl NodeConfig {
    /// Defaults rooted at `workdir`. Binaries are left empty for discovery.
    pub fn with_workdir(workdir: &Path) -> Self {
        Self {
            ledger_dir: workdir.join("ledger"),
            keys_dir: workdir.join("keys"),
            fixtures_dir: workdir.join("fixtures"),
            binaries: BinaryPaths::default(),
            rpc_bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            rpc_port: 8899,
            gossip_port: 8001,
            dynamic_port_range: (8002, 8020),
            stake_lamports: 500_000_000_000,
            bootstrap_validator_lamports: 500_000_000_000,
            faucet_lamports: 1_000_000_000_000_000,
            limit_ledger_size: 50_000_000,
            hashes_per_tick: HashesPerTick::Auto,
            session_name: DEFAULT_SESSION_NAME.to_string(),
            validator_log_filter: "solana=info".to_string(),
            launch_grace: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(30),
            health_policy: RetryPolicy::default(),
        }
    }

    /// `<ledger>/genesis`: rebuilt on every start and handed to both the
    /// genesis tool and the validator as `--ledger`.
    pub fn genesis_dir(&self) -> PathBuf {
        self.ledger_dir.join(GENESIS_SUBDIR)
    }

    /// `<ledger>/<session>.pid`
    pub fn pid_file(&self) -> PathBuf {
        self.ledger_dir.join(format!("{}.pid", self.session_name))
    }

    /// `<ledger>/<identity-basename>.log`
    pub fn log_file(&self) -> PathBuf {
        self.ledger_dir
            .join(format!("{}.log", KeyRole::Identity.file_stem()))
    }

    /// JSON-RPC endpoint of the supervised node.
    pub fn rpc_url(&self) -> String {
        match self.rpc_bind_address {
            IpAddr::V4(addr) if addr.is_unspecified() => {
                format!("http://127.0.0.1:{}/", self.rpc_port)
            }
            IpAddr::V4(addr) => format!("http://{}:{}/", addr, self.rpc_port),
            IpAddr::V6(addr) if addr.is_unspecified() => {
                format!("http://[::1]:{}/", self.rpc_port)
            }
            IpAddr::V6(addr) => format!("http://[{}]:{}/", addr, self.rpc_port),
        }
    }

    /// Reject layouts where genesis would wipe key material or fixtures.
    pub fn check_layout(&self) -> Result<(), ConfigError> {
        let ledger = normalize(&self.ledger_dir);
        for (role, dir) in [("keys", &self.keys_dir), ("fixtures", &self.fixtures_dir)] {
            if normalize(dir).starts_with(&ledger) {
                return Err(ConfigError::InsideLedger {
                    role,
                    path: dir.clone(),
                    ledger: self.ledger_dir.clone(),
                });
            }
        }
        Ok(())
    }

    /// File name the validator executable is expected to run under.
    pub fn validator_exe_name(&self) -> String {
        self.binaries
            .validator
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Operator-supplied overrides. `None` keeps the lower-precedence value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub ledger_dir: Option<PathBuf>,
    pub keys_dir: Option<PathBuf>,
    pub fixtures_dir: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub rpc_bind_address: Option<IpAddr>,
    pub rpc_port: Option<u16>,
    pub gossip_port: Option<u16>,
    pub limit_ledger_size: Option<u64>,
    pub stake_lamports: Option<u64>,
    pub faucet_lamports: Option<u64>,
    pub hashes_per_tick: Option<HashesPerTick>,
}

impl ConfigOverrides {
    /// Read overrides from `SUPERVISOR_*` environment variables.
    ///
    /// Unset variables are skipped; set but malformed values are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Ok(Self {
            ledger_dir: path("SUPERVISOR_LEDGER_DIR"),
            keys_dir: path("SUPERVISOR_KEYS_DIR"),
            fixtures_dir: path("SUPERVISOR_FIXTURES_DIR"),
            bin_dir: path("SUPERVISOR_BIN_DIR"),
            rpc_bind_address: parse_var(&lookup, "SUPERVISOR_RPC_BIND_ADDRESS")?,
            rpc_port: parse_var(&lookup, "SUPERVISOR_RPC_PORT")?,
            gossip_port: parse_var(&lookup, "SUPERVISOR_GOSSIP_PORT")?,
            limit_ledger_size: parse_var(&lookup, "SUPERVISOR_LIMIT_LEDGER_SIZE")?,
            stake_lamports: parse_var(&lookup, "SUPERVISOR_STAKE_LAMPORTS")?,
            faucet_lamports: parse_var(&lookup, "SUPERVISOR_FAUCET_LAMPORTS")?,
            hashes_per_tick: parse_var(&lookup, "SUPERVISOR_HASHES_PER_TICK")?,
        })
    }

    /// Layer `higher` on top of `self`; fields set in `higher` win.
    pub fn merge(self, higher: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            ledger_dir: higher.ledger_dir.or(self.ledger_dir),
            keys_dir: higher.keys_dir.or(self.keys_dir),
            fixtures_dir: higher.fixtures_dir.or(self.fixtures_dir),
            bin_dir: higher.bin_dir.or(self.bin_dir),
            rpc_bind_address: higher.rpc_bind_address.or(self.rpc_bind_address),
            rpc_port: higher.rpc_port.or(self.rpc_port),
            gossip_port: higher.gossip_port.or(self.gossip_port),
            limit_ledger_size: higher.limit_ledger_size.or(self.limit_ledger_size),
            stake_lamports: higher.stake_lamports.or(self.stake_lamports),
            faucet_lamports: higher.faucet_lamports.or(self.faucet_lamports),
            hashes_per_tick: higher.hashes_per_tick.or(self.hashes_per_tick),
        }
    }

    /// Apply onto `config`. `bin_dir` is consumed by binary discovery instead.
    pub fn apply(&self, mut config: NodeConfig) -> NodeConfig {
        if let Some(v) = &self.ledger_dir {
            config.ledger_dir = v.clone();
        }
        if let Some(v) = &self.keys_dir {
            config.keys_dir = v.clone();
        }
        if let Some(v) = &self.fixtures_dir {
            config.fixtures_dir = v.clone();
        }
        if let Some(v) = self.rpc_bind_address {
            config.rpc_bind_address = v;
        }
        if let Some(v) = self.rpc_port {
            config.rpc_port = v;
        }
        if let Some(v) = self.gossip_port {
            config.gossip_port = v;
        }
        if let Some(v) = self.limit_ledger_size {
            config.limit_ledger_size = v;
        }
        if let Some(v) = self.stake_lamports {
            config.stake_lamports = v;
        }
        if let Some(v) = self.faucet_lamports {
            config.faucet_lamports = v;
        }
        if let Some(v) = self.hashes_per_tick {
            config.hashes_per_tick = v;
        }
        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// Absolute form of `path` with `.`/`..` folded and symlinks resolved as far
/// as the path exists.
fn normalize(path: &Path) -> PathBuf {
    let absolute = path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    let mut missing = Vec::new();
    let mut existing = lexical.as_path();
    loop {
        if let Ok(real) = existing.canonicalize() {
            return missing.iter().rev().fold(real, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return lexical,
        }
    }
}
