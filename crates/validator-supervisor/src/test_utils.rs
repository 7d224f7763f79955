//! # Test Utilities
//!
//! In-memory adapters for the outbound ports plus fixture helpers.
//! Compiled for unit tests and behind the `test-utils` feature.
//!
//! Mocks are cheap `Clone` handles over shared state, so a test keeps one
//! copy for assertions and hands another to the code under test.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::adapters::SupervisorDependencies;
use crate::config::{BinaryPaths, NodeConfig};
use crate::domain::errors::{CommandError, ProcessError, RpcError};
use crate::domain::health::RetryPolicy;
use crate::domain::keys::KeyRole;
use crate::domain::process::Liveness;
use crate::ports::outbound::{
    CommandOutput, CommandRunner, CommandSpec, LaunchSpec, PortHolders, ProcessControl,
    RpcTransport, StopSignal,
};

/// File the mock genesis tool writes into the ledger.
pub const GENESIS_ARTIFACT: &str = "genesis.bin";

/// Executable name the mock validator runs under.
pub const VALIDATOR_EXE: &str = "agave-validator";

/// First PID handed out by `MockProcessControl`; above any real `pid_max`.
pub const FIRST_MOCK_PID: u32 = 5_000_000;

// =============================================================================
// FIXTURES
// =============================================================================

/// Configuration rooted at `root` with fast timings and fake binary paths.
pub fn test_config(root: &Path) -> NodeConfig {
    let mut config = NodeConfig::with_workdir(root);
    let bin = root.join("bin");
    config.binaries = BinaryPaths {
        validator: bin.join(VALIDATOR_EXE),
        genesis: bin.join("solana-genesis"),
        keygen: bin.join("solana-keygen"),
    };
    config.launch_grace = Duration::ZERO;
    config.stop_timeout = Duration::from_secs(1);
    config.health_policy = RetryPolicy::new(3, Duration::from_millis(10));
    config
}

/// Write the four key-pair files into `keys_dir`.
pub fn write_key_files(keys_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(keys_dir)?;
    for role in KeyRole::ALL {
        fs::write(role.path_in(keys_dir), "[1,2,3]")?;
    }
    Ok(())
}

/// One set of shared mocks wired into `SupervisorDependencies`.
#[derive(Clone, Default)]
pub struct MockEnvironment {
    pub runner: MockCommandRunner,
    pub control: MockProcessControl,
    pub transport: MockRpcTransport,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dependencies(&self) -> SupervisorDependencies {
        SupervisorDependencies {
            runner: Arc::new(self.runner.clone()),
            control: Arc::new(self.control.clone()),
            transport: Arc::new(self.transport.clone()),
        }
    }
}

// =============================================================================
// MOCK COMMAND RUNNER
// =============================================================================

#[derive(Default)]
struct RunnerState {
    calls: Vec<CommandSpec>,
    responses: HashMap<String, CommandOutput>,
    missing: HashSet<String>,
}

/// Records every command. Unless overridden:
///
/// - `*keygen pubkey <file>` prints `<file-stem>-pubkey`
/// - `*genesis --ledger <dir> ...` writes `GENESIS_ARTIFACT` into `<dir>`
/// - anything else succeeds silently
#[derive(Clone, Default)]
pub struct MockCommandRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `output` for every run of `program_name`.
    pub fn respond(&self, program_name: &str, output: CommandOutput) {
        self.state
            .lock()
            .responses
            .insert(program_name.to_string(), output);
    }

    /// Make `program_name` fail to launch.
    pub fn remove_program(&self, program_name: &str) {
        self.state.lock().missing.insert(program_name.to_string());
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.state.lock().calls.clone()
    }

    pub fn calls_to(&self, program_name: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.program_name() == program_name)
            .collect()
    }
}

impl CommandRunner for MockCommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let name = command.program_name();
        let canned = {
            let mut state = self.state.lock();
            state.calls.push(command.clone());
            if state.missing.contains(&name) {
                return Err(CommandError::NotFound {
                    program: command.program.clone(),
                });
            }
            state.responses.get(&name).cloned()
        };
        if let Some(output) = canned {
            return Ok(output);
        }

        if name.ends_with("keygen") {
            let stem = command
                .args
                .get(1)
                .and_then(|p| Path::new(p).file_stem())
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(CommandOutput::ok(format!("{}-pubkey\n", stem)));
        }

        if name.ends_with("genesis") {
            if let Some(ledger) = command.flag_value("--ledger") {
                let ledger = Path::new(ledger);
                let written = fs::create_dir_all(ledger)
                    .and_then(|_| fs::write(ledger.join(GENESIS_ARTIFACT), b"genesis"));
                if let Err(source) = written {
                    return Err(CommandError::Io {
                        program: command.program.clone(),
                        source,
                    });
                }
            }
        }
        Ok(CommandOutput::ok(""))
    }
}

// =============================================================================
// MOCK PROCESS CONTROL
// =============================================================================

#[derive(Debug, Clone)]
struct MockProcess {
    exe: String,
    alive: bool,
    exit_status: Option<String>,
    ports: Vec<u16>,
    ignores_term: bool,
}

#[derive(Default)]
struct ControlState {
    next_pid: u32,
    processes: HashMap<u32, MockProcess>,
    unknown_listeners: HashSet<u16>,
    denied: HashSet<u32>,
    exit_on_next_launch: Option<String>,
    spawned: Vec<LaunchSpec>,
    signals: Vec<(u32, StopSignal)>,
}

/// Simulated process table.
///
/// Spawned processes run under the program's file name and listen on the
/// value of their `--rpc-port` argument. Signals take effect immediately
/// unless a process was marked with `ignore_term`.
#[derive(Clone, Default)]
pub struct MockProcessControl {
    state: Arc<Mutex<ControlState>>,
}

impl MockProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a running process, returning its PID.
    pub fn add_process(&self, exe: &str, ports: &[u16]) -> u32 {
        let mut state = self.state.lock();
        let pid = allocate_pid(&mut state);
        state.processes.insert(
            pid,
            MockProcess {
                exe: exe.to_string(),
                alive: true,
                exit_status: None,
                ports: ports.to_vec(),
                ignores_term: false,
            },
        );
        pid
    }

    /// A listener on `port` whose owner cannot be identified.
    pub fn add_unknown_listener(&self, port: u16) {
        self.state.lock().unknown_listeners.insert(port);
    }

    /// Signals to `pid` fail with EPERM.
    pub fn deny(&self, pid: u32) {
        self.state.lock().denied.insert(pid);
    }

    /// `pid` survives SIGTERM.
    pub fn ignore_term(&self, pid: u32) {
        if let Some(p) = self.state.lock().processes.get_mut(&pid) {
            p.ignores_term = true;
        }
    }

    /// The next spawned process exits immediately with `status`.
    pub fn exit_on_next_launch(&self, status: &str) {
        self.state.lock().exit_on_next_launch = Some(status.to_string());
    }

    /// End `pid` without going through the port (a crash or an operator kill).
    pub fn kill_externally(&self, pid: u32) {
        if let Some(p) = self.state.lock().processes.get_mut(&pid) {
            p.alive = false;
            p.exit_status = Some("signal: 9 (SIGKILL)".to_string());
        }
    }

    pub fn is_alive(&self, pid: u32) -> bool {
        self.state
            .lock()
            .processes
            .get(&pid)
            .is_some_and(|p| p.alive)
    }

    /// Live PIDs running `exe`, ascending.
    pub fn live_pids(&self, exe: &str) -> Vec<u32> {
        let mut pids: Vec<u32> = self
            .state
            .lock()
            .processes
            .iter()
            .filter(|(_, p)| p.alive && p.exe == exe)
            .map(|(pid, _)| *pid)
            .collect();
        pids.sort_unstable();
        pids
    }

    pub fn spawned(&self) -> Vec<LaunchSpec> {
        self.state.lock().spawned.clone()
    }

    pub fn signals(&self) -> Vec<(u32, StopSignal)> {
        self.state.lock().signals.clone()
    }
}

fn allocate_pid(state: &mut ControlState) -> u32 {
    let pid = FIRST_MOCK_PID + state.next_pid;
    state.next_pid += 1;
    pid
}

impl ProcessControl for MockProcessControl {
    fn probe(&self, pid: u32, expected_exe: &str) -> Liveness {
        match self.state.lock().processes.get(&pid) {
            Some(p) if p.alive && (expected_exe.is_empty() || p.exe == expected_exe) => {
                Liveness::Running
            }
            Some(p) if p.alive => Liveness::Reused,
            _ => Liveness::Exited,
        }
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> Result<bool, ProcessError> {
        let mut state = self.state.lock();
        if state.denied.contains(&pid) {
            return Err(ProcessError::PermissionDenied { pid });
        }
        state.signals.push((pid, signal));
        let Some(process) = state.processes.get_mut(&pid).filter(|p| p.alive) else {
            return Ok(false);
        };
        match signal {
            StopSignal::Terminate if process.ignores_term => {}
            StopSignal::Terminate => {
                process.alive = false;
                process.exit_status = Some("signal: 15 (SIGTERM)".to_string());
            }
            StopSignal::Kill => {
                process.alive = false;
                process.exit_status = Some("signal: 9 (SIGKILL)".to_string());
            }
        }
        Ok(true)
    }

    fn signal_group(&self, pgid: u32, signal: StopSignal) -> Result<bool, ProcessError> {
        self.signal(pgid, signal)
    }

    fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32, ProcessError> {
        let spawn_err = |source| ProcessError::Spawn {
            program: spec.command.program.clone(),
            source,
        };
        let mut log = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log_file)
            .map_err(spawn_err)?;
        writeln!(log, "validator starting: {}", spec.command).map_err(spawn_err)?;

        let ports = spec
            .command
            .flag_value("--rpc-port")
            .and_then(|p| p.to_str())
            .and_then(|p| p.parse::<u16>().ok())
            .into_iter()
            .collect();

        let mut state = self.state.lock();
        let pid = allocate_pid(&mut state);
        let exit_status = state.exit_on_next_launch.take();
        state.processes.insert(
            pid,
            MockProcess {
                exe: spec.command.program_name(),
                alive: exit_status.is_none(),
                exit_status,
                ports,
                ignores_term: false,
            },
        );
        state.spawned.push(spec.clone());
        Ok(pid)
    }

    fn exit_status(&self, pid: u32) -> Option<String> {
        self.state
            .lock()
            .processes
            .get(&pid)
            .filter(|p| !p.alive)
            .and_then(|p| p.exit_status.clone())
    }

    fn port_holders(&self, port: u16) -> Result<PortHolders, ProcessError> {
        let state = self.state.lock();
        let mut pids: Vec<u32> = state
            .processes
            .iter()
            .filter(|(_, p)| p.alive && p.ports.contains(&port))
            .map(|(pid, _)| *pid)
            .collect();
        pids.sort_unstable();

        if !pids.is_empty() {
            Ok(PortHolders::held_by(pids))
        } else if state.unknown_listeners.contains(&port) {
            Ok(PortHolders::held_by(Vec::new()))
        } else {
            Ok(PortHolders::free())
        }
    }
}

// =============================================================================
// MOCK RPC TRANSPORT
// =============================================================================

#[derive(Default)]
struct RpcState {
    up: bool,
    succeed_from: Option<usize>,
    stall: Option<Duration>,
    failures: HashMap<String, RpcError>,
    methods: Vec<String>,
}

/// Scripted JSON-RPC endpoint.
#[derive(Clone, Default)]
pub struct MockRpcTransport {
    state: Arc<Mutex<RpcState>>,
}

impl MockRpcTransport {
    /// Every call succeeds.
    pub fn up() -> Self {
        let transport = Self::default();
        transport.set_up(true);
        transport
    }

    /// Every call is refused.
    pub fn down() -> Self {
        Self::default()
    }

    pub fn set_up(&self, up: bool) {
        self.state.lock().up = up;
    }

    /// Start succeeding from the `n`th call (1-based).
    pub fn respond_after(&self, n: usize) {
        self.state.lock().succeed_from = Some(n);
    }

    /// Every call hangs for `latency`, then times out: a node that accepts
    /// connections but never answers.
    pub fn stall(&self, latency: Duration) {
        self.state.lock().stall = Some(latency);
    }

    /// `method` always fails with `error`.
    pub fn fail_method(&self, method: &str, error: RpcError) {
        self.state.lock().failures.insert(method.to_string(), error);
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().methods.len()
    }

    pub fn methods(&self) -> Vec<String> {
        self.state.lock().methods.clone()
    }
}

#[async_trait]
impl RpcTransport for MockRpcTransport {
    fn endpoint(&self) -> &str {
        "http://127.0.0.1:8899/"
    }

    async fn call(&self, method: &str) -> Result<serde_json::Value, RpcError> {
        let (attempt, stall) = {
            let mut state = self.state.lock();
            state.methods.push(method.to_string());
            (state.methods.len(), state.stall)
        };
        if let Some(latency) = stall {
            tokio::time::sleep(latency).await;
            return Err(RpcError::Timeout);
        }

        let state = self.state.lock();
        if let Some(error) = state.failures.get(method) {
            return Err(error.clone());
        }
        let responding = state.up || state.succeed_from.is_some_and(|n| attempt >= n);
        if !responding {
            return Err(RpcError::Connection(
                "cannot connect to http://127.0.0.1:8899/".to_string(),
            ));
        }

        Ok(match method {
            "getHealth" => serde_json::json!("ok"),
            "getSlot" => serde_json::json!(42),
            "getVersion" => serde_json::json!({ "solana-core": "2.0.14", "feature-set": 607245837 }),
            _ => serde_json::Value::Null,
        })
    }
}
