//! # Genesis Bootstrapper
//!
//! Wipes the genesis directory (`<ledger>/genesis`) and writes a fresh
//! genesis with the external genesis tool. There is no incremental mode:
//! every call discards the previous ledger state. The PID file and log sink
//! live beside that directory and are never touched. If the tool fails, the
//! directory is cleared again so a half-written genesis can never be loaded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::errors::GenesisError;
use crate::domain::genesis::GenesisSpec;
use crate::ports::outbound::{CommandRunner, CommandSpec};

pub struct GenesisBootstrapper {
    runner: Arc<dyn CommandRunner>,
    genesis_bin: PathBuf,
}

impl GenesisBootstrapper {
    pub fn new(runner: Arc<dyn CommandRunner>, genesis_bin: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            genesis_bin: genesis_bin.into(),
        }
    }

    /// Replace the ledger at `spec.ledger_dir` with a freshly built genesis.
    pub fn create(&self, spec: &GenesisSpec) -> Result<(), GenesisError> {
        let ledger = &spec.ledger_dir;
        clear_dir(ledger).map_err(|source| GenesisError::LedgerDir {
            path: ledger.clone(),
            source,
        })?;

        let command = CommandSpec::new(&self.genesis_bin).args(spec.to_args());
        info!(ledger = %ledger.display(), hashes_per_tick = %spec.hashes_per_tick, "creating genesis");

        let result = match self.runner.run(&command) {
            Ok(output) if output.success => Ok(()),
            Ok(output) => Err(GenesisError::ToolFailed {
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            }),
            Err(e) => Err(GenesisError::Command(e)),
        };

        if result.is_err() {
            if let Err(e) = clear_dir(ledger) {
                warn!(ledger = %ledger.display(), error = %e, "failed to scrub partial genesis");
            }
        }
        result
    }
}

/// Remove every entry under `dir`, creating it if absent.
fn clear_dir(dir: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return fs::create_dir_all(dir),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::genesis::{HashesPerTick, CLUSTER_TYPE};
    use crate::ports::outbound::CommandOutput;
    use crate::test_utils::{MockCommandRunner, GENESIS_ARTIFACT};

    fn spec(ledger: &Path) -> GenesisSpec {
        GenesisSpec {
            ledger_dir: ledger.to_path_buf(),
            identity_pubkey: "Id111".into(),
            vote_pubkey: "Vote111".into(),
            stake_pubkey: "Stake111".into(),
            faucet_pubkey: "Faucet111".into(),
            bootstrap_validator_lamports: 1,
            stake_lamports: 2,
            faucet_lamports: 3,
            hashes_per_tick: HashesPerTick::Auto,
            cluster_type: CLUSTER_TYPE,
            primordial_accounts: None,
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_previous_ledger_does_not_survive() {
        let root = tempfile::tempdir().unwrap();
        let ledger = root.path().join("ledger");
        fs::create_dir_all(ledger.join("rocksdb")).unwrap();
        fs::write(ledger.join("rocksdb/000001.sst"), "old").unwrap();
        fs::write(ledger.join("old-snapshot.tar.zst"), "old").unwrap();

        let runner = MockCommandRunner::new();
        let bootstrapper = GenesisBootstrapper::new(Arc::new(runner.clone()), "/bin/solana-genesis");
        bootstrapper.create(&spec(&ledger)).unwrap();

        assert_eq!(entries(&ledger), vec![GENESIS_ARTIFACT.to_string()]);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].flag_value("--cluster-type").map(|v| v.to_string_lossy().into_owned()),
            Some("development".to_string())
        );
    }

    #[test]
    fn test_missing_ledger_is_created() {
        let root = tempfile::tempdir().unwrap();
        let ledger = root.path().join("fresh/ledger");

        let bootstrapper =
            GenesisBootstrapper::new(Arc::new(MockCommandRunner::new()), "/bin/solana-genesis");
        bootstrapper.create(&spec(&ledger)).unwrap();
        assert!(ledger.join(GENESIS_ARTIFACT).is_file());
    }

    #[test]
    fn test_tool_failure_scrubs_ledger() {
        let root = tempfile::tempdir().unwrap();
        let ledger = root.path().join("ledger");
        fs::create_dir_all(&ledger).unwrap();
        fs::write(ledger.join("stale"), "old").unwrap();

        let runner = MockCommandRunner::new();
        runner.respond("solana-genesis", CommandOutput::failed(1, "bad stake amount"));
        let bootstrapper = GenesisBootstrapper::new(Arc::new(runner), "/bin/solana-genesis");

        let err = bootstrapper.create(&spec(&ledger)).unwrap_err();
        assert!(matches!(err, GenesisError::ToolFailed { ref stderr, .. } if stderr == "bad stake amount"));
        assert!(entries(&ledger).is_empty());
    }
}
