//! # Error Types
//!
//! Error taxonomy for the supervisor.
//!
//! ## Categories
//!
//! | Category | Sources | Policy |
//! |----------|---------|--------|
//! | Configuration | missing binary, missing key file | fatal, before any mutation |
//! | Contention | port or session reclamation failed | fatal only when reclaim itself fails |
//! | Bootstrap | genesis tool failure | fatal, never retried |
//! | Launch | validator failed to spawn or exited early | fatal |
//! | Runtime | filesystem / OS failures outside the above | fatal |
//!
//! Liveness failures are never errors: they surface as `HealthStatus::NotResponding`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::keys::KeyRole;
use super::state::SupervisorState;

/// Errors resolving the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No candidate directory holds the validator executable.
    #[error("validator binary `{binary}` not found (searched: {searched})")]
    BinaryNotFound { binary: String, searched: String },

    /// A companion tool is missing next to the validator and on PATH.
    #[error("required tool `{tool}` not found in {} or on PATH", .bin_dir.display())]
    ToolNotFound { tool: String, bin_dir: PathBuf },

    /// A directory that must outlive genesis lies inside the ledger root.
    #[error(
        "{role} directory {} is inside ledger directory {}, which is rebuilt on every start",
        .path.display(),
        .ledger.display()
    )]
    InsideLedger {
        role: &'static str,
        path: PathBuf,
        ledger: PathBuf,
    },

    /// An override could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Errors resolving key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// One of the four required key-pair files does not exist.
    #[error(
        "missing {role} key-pair file {} (run the one-time key generation step first)",
        .path.display()
    )]
    MissingKeyFile { role: KeyRole, path: PathBuf },

    /// The keygen tool could not derive a public identifier.
    #[error("failed to derive public key for {}: {reason}", .path.display())]
    LookupFailed { path: PathBuf, reason: String },
}

/// Errors while (re)creating genesis state.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// The ledger directory could not be cleared or created.
    #[error("failed to prepare ledger directory {}: {source}", .path.display())]
    LedgerDir { path: PathBuf, source: io::Error },

    /// The genesis tool ran and reported failure.
    #[error("genesis tool failed ({status}): {stderr}")]
    ToolFailed { status: String, stderr: String },

    /// The genesis tool could not be invoked at all.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors launching the validator process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The process could not be spawned.
    #[error(transparent)]
    Spawn(#[from] ProcessError),

    /// The process exited before the launch grace period elapsed.
    #[error("validator exited immediately ({status}); see {}", .log_path.display())]
    ExitedEarly { status: String, log_path: PathBuf },

    /// The PID record could not be written.
    #[error("failed to record pid in {}: {source}", .path.display())]
    PidFile { path: PathBuf, source: io::Error },
}

/// Errors reclaiming contended resources during cleanup.
#[derive(Debug, Error)]
pub enum ReclaimError {
    /// The OS refused to signal the process holding a resource.
    #[error("insufficient privilege to reclaim {resource} from pid {pid}")]
    PermissionDenied { resource: String, pid: u32 },

    /// A listener exists but its owning process is not visible.
    #[error("{resource} is held by a process that cannot be identified")]
    HolderUnknown { resource: String },

    /// The resource is still held after reclamation.
    #[error("{resource} still held after reclamation by pids {pids:?}")]
    StillHeld { resource: String, pids: Vec<u32> },

    /// The recorded validator did not exit after SIGKILL.
    #[error("validator pid {pid} did not exit after SIGKILL")]
    Unkillable { pid: u32 },

    /// Any other OS failure while reclaiming.
    #[error("failed to reclaim {resource}: {source}")]
    Os {
        resource: String,
        source: ProcessError,
    },
}

/// Errors from OS process control.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The caller may not signal this process.
    #[error("permission denied signalling pid {pid}")]
    PermissionDenied { pid: u32 },

    /// A signal could not be delivered for another reason.
    #[error("failed to signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    /// The process could not be spawned.
    #[error("failed to spawn {}: {source}", .program.display())]
    Spawn { program: PathBuf, source: io::Error },

    /// Process or socket tables could not be inspected.
    #[error("failed to inspect process table: {0}")]
    Inspect(String),
}

/// Errors from structured subprocess invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program does not exist.
    #[error("program not found: {}", .program.display())]
    NotFound { program: PathBuf },

    /// The program could not be run.
    #[error("failed to run {}: {source}", .program.display())]
    Io { program: PathBuf, source: io::Error },
}

/// Errors from a JSON-RPC liveness call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// Nothing is listening, or the connection was refused.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The node answered with a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The body was not a well-formed JSON-RPC response.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Error classification used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Contention,
    Bootstrap,
    Launch,
    Runtime,
}

/// Top-level supervisor error.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("configuration error: {0}")]
    Key(#[from] KeyError),

    #[error("resource contention: {0}")]
    Reclaim(#[from] ReclaimError),

    #[error("genesis bootstrap failed: {0}")]
    Genesis(#[from] GenesisError),

    #[error("launch failed: {0}")]
    Launch(#[from] LaunchError),

    #[error("process control failed: {0}")]
    Process(#[from] ProcessError),

    #[error("illegal state transition {from} -> {to}")]
    InvalidTransition {
        from: SupervisorState,
        to: SupervisorState,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: io::Error,
    },
}

impl SupervisorError {
    /// Wrap an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SupervisorError::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SupervisorError::Config(_) | SupervisorError::Key(_) => ErrorCategory::Configuration,
            SupervisorError::Reclaim(_) => ErrorCategory::Contention,
            SupervisorError::Genesis(_) => ErrorCategory::Bootstrap,
            SupervisorError::Launch(_) => ErrorCategory::Launch,
            SupervisorError::Process(_)
            | SupervisorError::InvalidTransition { .. }
            | SupervisorError::Io { .. } => ErrorCategory::Runtime,
        }
    }

    /// Process exit code for this error. Every fatal error is non-zero.
    pub fn exit_code(&self) -> u8 {
        1
    }
}
