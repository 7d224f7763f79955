//! # Outbound Ports (Driven Ports)
//!
//! Everything the supervisor needs from the outside world.
//!
//! Production: `adapters::{SystemCommandRunner, OsProcessControl, HttpRpcClient}`
//! Testing: `test_utils::{MockCommandRunner, MockProcessControl, MockRpcTransport}`

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::errors::{CommandError, ProcessError, RpcError};
use crate::domain::process::Liveness;

// =============================================================================
// STRUCTURED SUBPROCESS INVOCATION
// =============================================================================

/// One external command: program, explicit argument list and environment.
///
/// No shell is involved; arguments are passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Value following `flag` in the argument list, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&OsString> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
    }

    /// File name of the program, for matching and logging.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Human-readable exit status, e.g. `exit status: 1`.
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            status: format!("exit status: {}", code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs a command to completion and captures its output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

// =============================================================================
// OS PROCESS CONTROL
// =============================================================================

/// Signals the supervisor sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM: ask the process to exit.
    Terminate,
    /// SIGKILL: force exit.
    Kill,
}

/// A detached background launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub command: CommandSpec,
    /// stdout and stderr are appended here.
    pub log_file: PathBuf,
}

/// Process table, signalling, spawning and socket ownership queries.
pub trait ProcessControl: Send + Sync {
    /// Observe `pid`, verifying it runs `expected_exe` where the OS allows.
    fn probe(&self, pid: u32, expected_exe: &str) -> Liveness;

    /// Signal a single process. `Ok(false)` if it does not exist.
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<bool, ProcessError>;

    /// Signal every member of the process group led by `pgid`.
    /// `Ok(false)` if the group has no members.
    fn signal_group(&self, pgid: u32, signal: StopSignal) -> Result<bool, ProcessError>;

    /// Spawn a detached process in a fresh session, returning its PID.
    fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32, ProcessError>;

    /// Exit status of a process spawned by this instance, if it has exited.
    fn exit_status(&self, pid: u32) -> Option<String>;

    /// PIDs listening on TCP `port`.
    fn port_holders(&self, port: u16) -> Result<PortHolders, ProcessError>;
}

/// Answer to a port-ownership query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortHolders {
    /// A listening socket exists on the port.
    pub listening: bool,
    /// Owners that could be identified.
    pub pids: Vec<u32>,
}

impl PortHolders {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn held_by(pids: Vec<u32>) -> Self {
        Self {
            listening: true,
            pids,
        }
    }

    pub fn is_free(&self) -> bool {
        !self.listening
    }
}

// =============================================================================
// JSON-RPC
// =============================================================================

/// One JSON-RPC call against the node, returning the `result` member.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Endpoint this transport talks to, for reporting.
    fn endpoint(&self) -> &str;

    async fn call(&self, method: &str) -> Result<serde_json::Value, RpcError>;
}
