//! # Key Material Store
//!
//! Locates the four key-pair files and derives each public identifier with
//! the keygen tool. Every file is checked for existence before the tool runs
//! once, so a missing key never leaves partial work behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::domain::errors::KeyError;
use crate::domain::keys::{KeyPairFile, KeyRole, KeySet};
use crate::ports::outbound::{CommandRunner, CommandSpec};

pub struct KeyMaterialStore {
    runner: Arc<dyn CommandRunner>,
    keygen: PathBuf,
    /// Derived pubkeys, kept for the life of the process.
    cache: Mutex<HashMap<PathBuf, String>>,
}

impl KeyMaterialStore {
    pub fn new(runner: Arc<dyn CommandRunner>, keygen: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            keygen: keygen.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve all four roles under `keys_dir`.
    pub fn resolve(&self, keys_dir: &Path) -> Result<KeySet, KeyError> {
        for role in KeyRole::ALL {
            let path = role.path_in(keys_dir);
            if !path.is_file() {
                return Err(KeyError::MissingKeyFile { role, path });
            }
        }

        Ok(KeySet::new(
            self.load(KeyRole::Identity, keys_dir)?,
            self.load(KeyRole::Vote, keys_dir)?,
            self.load(KeyRole::Stake, keys_dir)?,
            self.load(KeyRole::Faucet, keys_dir)?,
        ))
    }

    fn load(&self, role: KeyRole, keys_dir: &Path) -> Result<KeyPairFile, KeyError> {
        let path = role.path_in(keys_dir);
        let pubkey = self.pubkey(&path)?;
        debug!(%role, %pubkey, "resolved key");
        Ok(KeyPairFile { role, path, pubkey })
    }

    fn pubkey(&self, path: &Path) -> Result<String, KeyError> {
        if let Some(cached) = self.cache.lock().get(path) {
            return Ok(cached.clone());
        }

        let command = CommandSpec::new(&self.keygen).arg("pubkey").arg(path);
        let output = self
            .runner
            .run(&command)
            .map_err(|e| KeyError::LookupFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.success {
            return Err(KeyError::LookupFailed {
                path: path.to_path_buf(),
                reason: format!("{}: {}", output.status, output.stderr.trim()),
            });
        }

        let pubkey = output.stdout.trim().to_string();
        if pubkey.is_empty() {
            return Err(KeyError::LookupFailed {
                path: path.to_path_buf(),
                reason: "keygen printed no public key".to_string(),
            });
        }

        self.cache.lock().insert(path.to_path_buf(), pubkey.clone());
        Ok(pubkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::CommandOutput;
    use crate::test_utils::{write_key_files, MockCommandRunner};

    #[test]
    fn test_resolves_all_roles_once() {
        let dir = tempfile::tempdir().unwrap();
        write_key_files(dir.path()).unwrap();
        let runner = MockCommandRunner::new();
        let store = KeyMaterialStore::new(Arc::new(runner.clone()), "/bin/solana-keygen");

        let keys = store.resolve(dir.path()).unwrap();
        assert_eq!(keys.identity().pubkey, "identity-keypair-pubkey");
        assert_eq!(keys.faucet().pubkey, "faucet-keypair-pubkey");
        assert_eq!(runner.calls().len(), 4);

        // cached for the process lifetime
        store.resolve(dir.path()).unwrap();
        assert_eq!(runner.calls().len(), 4);
    }

    #[test]
    fn test_missing_stake_key_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_key_files(dir.path()).unwrap();
        std::fs::remove_file(KeyRole::Stake.path_in(dir.path())).unwrap();

        let runner = MockCommandRunner::new();
        let store = KeyMaterialStore::new(Arc::new(runner.clone()), "/bin/solana-keygen");

        match store.resolve(dir.path()) {
            Err(KeyError::MissingKeyFile { role, path }) => {
                assert_eq!(role, KeyRole::Stake);
                assert!(path.ends_with("stake-account-keypair.json"));
            }
            other => panic!("expected MissingKeyFile, got {:?}", other),
        }
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_keygen_failure_names_file() {
        let dir = tempfile::tempdir().unwrap();
        write_key_files(dir.path()).unwrap();
        let runner = MockCommandRunner::new();
        runner.respond("solana-keygen", CommandOutput::failed(1, "invalid keypair"));
        let store = KeyMaterialStore::new(Arc::new(runner), "/bin/solana-keygen");

        let err = store.resolve(dir.path()).unwrap_err();
        assert!(err.to_string().contains("identity-keypair.json"));
        assert!(err.to_string().contains("invalid keypair"));
    }
}
