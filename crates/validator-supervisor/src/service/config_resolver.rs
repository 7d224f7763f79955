//! # Config Resolver
//!
//! Builds the `NodeConfig` for one invocation: defaults rooted at the working
//! directory, operator overrides on top, and executable discovery.
//!
//! Discovery is pure: nothing is created or modified.

use std::env;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{BinaryPaths, ConfigOverrides, NodeConfig};
use crate::domain::errors::ConfigError;

/// Executable that must exist in the selected install directory.
pub const VALIDATOR_BINARY: &str = "agave-validator";

/// Genesis construction tool.
pub const GENESIS_TOOL: &str = "solana-genesis";

/// Key-pair lookup tool.
pub const KEYGEN_TOOL: &str = "solana-keygen";

/// Install directories probed in order after `--bin-dir`.
pub fn default_candidates() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = env::var_os("HOME").filter(|h| !h.is_empty()) {
        dirs.push(PathBuf::from(home).join(".local/share/solana/install/active_release/bin"));
    }
    dirs.extend(
        ["/opt/solana/bin", "/usr/local/bin", "/usr/bin"]
            .into_iter()
            .map(PathBuf::from),
    );
    dirs
}

pub struct ConfigResolver {
    candidates: Vec<PathBuf>,
    /// Fall back to `PATH` lookups after the candidate list.
    use_path: bool,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(default_candidates(), true)
    }
}

impl ConfigResolver {
    pub fn new(candidates: Vec<PathBuf>, use_path: bool) -> Self {
        Self {
            candidates,
            use_path,
        }
    }

    /// Resolve the run configuration for `workdir`.
    pub fn resolve(
        &self,
        workdir: &Path,
        overrides: &ConfigOverrides,
    ) -> Result<NodeConfig, ConfigError> {
        let mut config = overrides.apply(NodeConfig::with_workdir(workdir));
        config.check_layout()?;

        let validator = self.locate_validator(overrides.bin_dir.as_deref())?;
        let bin_dir = validator
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        config.binaries = BinaryPaths {
            genesis: self.locate_tool(GENESIS_TOOL, &bin_dir)?,
            keygen: self.locate_tool(KEYGEN_TOOL, &bin_dir)?,
            validator,
        };

        debug!(
            validator = %config.binaries.validator.display(),
            ledger = %config.ledger_dir.display(),
            rpc = %config.rpc_url(),
            "configuration resolved"
        );
        Ok(config)
    }

    fn locate_validator(&self, bin_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let found = bin_dir
            .into_iter()
            .chain(self.candidates.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(VALIDATOR_BINARY))
            .find(|path| is_executable(path));

        if let Some(path) = found {
            return Ok(path);
        }
        if self.use_path {
            if let Ok(path) = which::which(VALIDATOR_BINARY) {
                return Ok(path);
            }
        }

        let mut searched: Vec<String> = bin_dir
            .into_iter()
            .chain(self.candidates.iter().map(PathBuf::as_path))
            .map(|d| d.display().to_string())
            .collect();
        if self.use_path {
            searched.push("PATH".to_string());
        }
        Err(ConfigError::BinaryNotFound {
            binary: VALIDATOR_BINARY.to_string(),
            searched: searched.join(", "),
        })
    }

    fn locate_tool(&self, tool: &str, bin_dir: &Path) -> Result<PathBuf, ConfigError> {
        let sibling = bin_dir.join(tool);
        if is_executable(&sibling) {
            return Ok(sibling);
        }
        if self.use_path {
            if let Ok(path) = which::which(tool) {
                return Ok(path);
            }
        }
        Err(ConfigError::ToolNotFound {
            tool: tool.to_string(),
            bin_dir: bin_dir.to_path_buf(),
        })
    }
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
