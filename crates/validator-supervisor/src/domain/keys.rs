//! # Key Material
//!
//! The four key-pair roles a validator needs, and the resolved set.
//!
//! A `KeySet` is built once per invocation by the key store and is read-only
//! afterward. All four files must exist before any start operation.

use std::fmt;
use std::path::{Path, PathBuf};

/// Role of a key-pair file in the keys directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyRole {
    /// Validator node identity.
    Identity,
    /// Vote account.
    Vote,
    /// Bootstrap stake account.
    Stake,
    /// Faucet funding account.
    Faucet,
}

impl KeyRole {
    /// All required roles, in resolution order.
    pub const ALL: [KeyRole; 4] = [
        KeyRole::Identity,
        KeyRole::Vote,
        KeyRole::Stake,
        KeyRole::Faucet,
    ];

    /// File stem of the key-pair under the keys directory.
    pub fn file_stem(self) -> &'static str {
        match self {
            KeyRole::Identity => "identity-keypair",
            KeyRole::Vote => "vote-account-keypair",
            KeyRole::Stake => "stake-account-keypair",
            KeyRole::Faucet => "faucet-keypair",
        }
    }

    /// Full path of this role's key-pair file.
    pub fn path_in(self, keys_dir: &Path) -> PathBuf {
        keys_dir.join(format!("{}.json", self.file_stem()))
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyRole::Identity => "identity",
            KeyRole::Vote => "vote",
            KeyRole::Stake => "stake",
            KeyRole::Faucet => "faucet",
        };
        f.write_str(name)
    }
}

/// A key-pair file with its derived public identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairFile {
    pub role: KeyRole,
    pub path: PathBuf,
    pub pubkey: String,
}

/// The resolved set of all four key-pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    identity: KeyPairFile,
    vote: KeyPairFile,
    stake: KeyPairFile,
    faucet: KeyPairFile,
}

impl KeySet {
    pub fn new(
        identity: KeyPairFile,
        vote: KeyPairFile,
        stake: KeyPairFile,
        faucet: KeyPairFile,
    ) -> Self {
        Self {
            identity,
            vote,
            stake,
            faucet,
        }
    }

    pub fn get(&self, role: KeyRole) -> &KeyPairFile {
        match role {
            KeyRole::Identity => &self.identity,
            KeyRole::Vote => &self.vote,
            KeyRole::Stake => &self.stake,
            KeyRole::Faucet => &self.faucet,
        }
    }

    pub fn identity(&self) -> &KeyPairFile {
        &self.identity
    }

    pub fn vote(&self) -> &KeyPairFile {
        &self.vote
    }

    pub fn stake(&self) -> &KeyPairFile {
        &self.stake
    }

    pub fn faucet(&self) -> &KeyPairFile {
        &self.faucet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_paths() {
        let dir = Path::new("/srv/keys");
        assert_eq!(
            KeyRole::Stake.path_in(dir),
            PathBuf::from("/srv/keys/stake-account-keypair.json")
        );
        assert_eq!(KeyRole::Identity.file_stem(), "identity-keypair");
    }

    #[test]
    fn test_roles_are_distinct() {
        let mut stems: Vec<_> = KeyRole::ALL.iter().map(|r| r.file_stem()).collect();
        stems.sort();
        stems.dedup();
        assert_eq!(stems.len(), 4);
    }
}
