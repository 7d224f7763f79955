//! # Genesis Specification
//!
//! Parameters handed to the external genesis tool. A `GenesisSpec` is built
//! fresh from the run configuration and resolved keys on every (re)creation.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::NodeConfig;
use crate::domain::errors::ConfigError;
use crate::domain::keys::KeySet;

/// Cluster feature set selected for locally bootstrapped ledgers.
pub const CLUSTER_TYPE: &str = "development";

/// File under the fixtures directory holding primordial account balances.
pub const PRIMORDIAL_ACCOUNTS_FILE: &str = "primordial-accounts.yml";

/// Proof-of-history hashing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashesPerTick {
    /// Derive from the host's hash rate.
    #[default]
    Auto,
    /// Sleep for the tick duration instead of hashing.
    Sleep,
    /// Fixed number of hashes per tick.
    Count(u64),
}

impl fmt::Display for HashesPerTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashesPerTick::Auto => f.write_str("auto"),
            HashesPerTick::Sleep => f.write_str("sleep"),
            HashesPerTick::Count(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for HashesPerTick {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "auto" => Ok(HashesPerTick::Auto),
            "sleep" => Ok(HashesPerTick::Sleep),
            other => other
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .map(HashesPerTick::Count)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "hashes-per-tick".to_string(),
                    value: s.to_string(),
                }),
        }
    }
}

/// Full parameter set for one genesis construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisSpec {
    pub ledger_dir: PathBuf,
    pub identity_pubkey: String,
    pub vote_pubkey: String,
    pub stake_pubkey: String,
    pub faucet_pubkey: String,
    pub bootstrap_validator_lamports: u64,
    pub stake_lamports: u64,
    pub faucet_lamports: u64,
    pub hashes_per_tick: HashesPerTick,
    pub cluster_type: &'static str,
    pub primordial_accounts: Option<PathBuf>,
}

impl GenesisSpec {
    /// Derive genesis parameters from configuration and resolved keys.
    ///
    /// The primordial accounts file is included only if it exists in the
    /// fixtures directory at the time of the call.
    pub fn new(config: &NodeConfig, keys: &KeySet) -> Self {
        let primordial = config.fixtures_dir.join(PRIMORDIAL_ACCOUNTS_FILE);
        Self {
            ledger_dir: config.genesis_dir(),
            identity_pubkey: keys.identity().pubkey.clone(),
            vote_pubkey: keys.vote().pubkey.clone(),
            stake_pubkey: keys.stake().pubkey.clone(),
            faucet_pubkey: keys.faucet().pubkey.clone(),
            bootstrap_validator_lamports: config.bootstrap_validator_lamports,
            stake_lamports: config.stake_lamports,
            faucet_lamports: config.faucet_lamports,
            hashes_per_tick: config.hashes_per_tick,
            cluster_type: CLUSTER_TYPE,
            primordial_accounts: primordial.is_file().then_some(primordial),
        }
    }

    /// Argument list for the genesis tool.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--ledger".into(),
            self.ledger_dir.clone().into_os_string(),
            "--bootstrap-validator".into(),
            self.identity_pubkey.clone().into(),
            self.vote_pubkey.clone().into(),
            self.stake_pubkey.clone().into(),
            "--bootstrap-validator-lamports".into(),
            self.bootstrap_validator_lamports.to_string().into(),
            "--bootstrap-validator-stake-lamports".into(),
            self.stake_lamports.to_string().into(),
            "--faucet-pubkey".into(),
            self.faucet_pubkey.clone().into(),
            "--faucet-lamports".into(),
            self.faucet_lamports.to_string().into(),
            "--hashes-per-tick".into(),
            self.hashes_per_tick.to_string().into(),
            "--cluster-type".into(),
            self.cluster_type.into(),
        ];
        if let Some(path) = &self.primordial_accounts {
            args.push("--primordial-accounts-file".into());
            args.push(path.clone().into_os_string());
        }
        args
    }
}
