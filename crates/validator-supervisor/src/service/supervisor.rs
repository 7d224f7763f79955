//! # Process Supervisor
//!
//! Owns the validator lifecycle for one ledger directory.
//!
//! ## Start Sequence
//!
//! ```text
//! Stopped/Running ──→ Cleaning ──→ GenesisPending ──→ Starting ──→ Running
//!                        │               │                │
//!                        └───────────────┴────────────────┴──→ Failed
//! ```
//!
//! - **Cleaning**: terminate the recorded session, drop the PID record,
//!   reclaim the RPC port from whoever holds it
//! - **GenesisPending**: wipe and rebuild the ledger
//! - **Starting**: spawn the validator in a fresh OS session, record its PID,
//!   survive the launch grace period
//! - **Running**: declared once the health poll gets an answer. An exhausted
//!   poll leaves the supervisor in `Starting` and is reported, not raised.
//!
//! ## Process Tracking
//!
//! The PID file is the only persisted state. Every invocation re-derives the
//! handle from it and confirms liveness with the OS; a PID that now runs a
//! different executable is never signalled.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::adapters::{PidFile, SupervisorDependencies};
use crate::config::NodeConfig;
use crate::domain::errors::{LaunchError, ProcessError, ReclaimError, SupervisorError};
use crate::domain::genesis::GenesisSpec;
use crate::domain::health::{HealthStatus, RetryPolicy};
use crate::domain::keys::KeySet;
use crate::domain::process::{Liveness, ProcessHandle};
use crate::domain::state::{StateMachine, SupervisorState};
use crate::ports::outbound::{CommandSpec, LaunchSpec, ProcessControl, StopSignal};

use super::genesis::GenesisBootstrapper;
use super::health::HealthChecker;

/// Interval between liveness checks while waiting for an exit.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Liveness checks after SIGKILL before giving up.
pub const KILL_CHECKS: u32 = 25;

/// Port re-checks after killing its holders.
pub const PORT_RECLAIM_CHECKS: u32 = 10;

// =============================================================================
// REPORTS
// =============================================================================

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// No PID record existed.
    NotRunning,
    /// Exited after SIGTERM.
    Terminated,
    /// Needed SIGKILL.
    Killed,
    /// The record pointed at a dead or reused PID; nothing was signalled.
    StaleRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub pid: Option<u32>,
    pub outcome: StopOutcome,
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.outcome, self.pid) {
            (StopOutcome::NotRunning, _) | (_, None) => write!(f, "validator is not running"),
            (StopOutcome::Terminated, Some(pid)) => write!(f, "validator stopped (pid {})", pid),
            (StopOutcome::Killed, Some(pid)) => {
                write!(f, "validator killed after stop timeout (pid {})", pid)
            }
            (StopOutcome::StaleRecord, Some(pid)) => {
                write!(f, "removed stale pid record (pid {} was not running)", pid)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartReport {
    pub pid: u32,
    pub state: SupervisorState,
    pub health: HealthStatus,
    pub log_file: PathBuf,
    pub rpc_url: String,
}

impl fmt::Display for StartReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "validator started (pid {})", self.pid)?;
        writeln!(f, "  state:  {}", self.state)?;
        writeln!(f, "  health: {}", self.health)?;
        writeln!(f, "  rpc:    {}", self.rpc_url)?;
        write!(f, "  log:    {}", self.log_file.display())
    }
}

/// Point-in-time view of the supervised validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub session: String,
    pub state: SupervisorState,
    pub pid: Option<u32>,
    pub liveness: Option<Liveness>,
    /// A PID record exists but does not point at our validator.
    pub stale_record: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub health: HealthStatus,
    pub rpc_url: String,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "session:  {}", self.session)?;
        writeln!(f, "state:    {}", self.state)?;
        match self.pid {
            Some(pid) if self.stale_record => writeln!(f, "pid:      {} (stale record)", pid)?,
            Some(pid) => writeln!(f, "pid:      {}", pid)?,
            None => writeln!(f, "pid:      -")?,
        }
        if let Some(started) = self.started_at {
            writeln!(f, "started:  {}", started.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        writeln!(f, "health:   {}", self.health)?;
        writeln!(f, "rpc:      {}", self.rpc_url)?;
        write!(f, "log:      {}", self.log_file.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartReport {
    pub stop: StopReport,
    pub start: StartReport,
}

// =============================================================================
// SUPERVISOR
// =============================================================================

pub struct ProcessSupervisor {
    config: NodeConfig,
    control: Arc<dyn ProcessControl>,
    genesis: GenesisBootstrapper,
    health: HealthChecker,
    pid_file: PidFile,
    state: StateMachine,
}

impl ProcessSupervisor {
    /// Build a supervisor and derive the initial state from the OS.
    pub fn new(config: NodeConfig, deps: &SupervisorDependencies) -> Self {
        let genesis = GenesisBootstrapper::new(deps.runner.clone(), &config.binaries.genesis);
        let health = HealthChecker::new(deps.transport.clone());
        let pid_file = PidFile::new(config.pid_file());

        let mut supervisor = Self {
            config,
            control: deps.control.clone(),
            genesis,
            health,
            pid_file,
            state: StateMachine::new(SupervisorState::Stopped),
        };

        let initial = match supervisor.observe() {
            Ok(Some(handle)) if handle.is_live() => SupervisorState::Running,
            Ok(_) => SupervisorState::Stopped,
            Err(e) => {
                warn!(error = %e, "could not read pid record; assuming stopped");
                SupervisorState::Stopped
            }
        };
        supervisor.state = StateMachine::new(initial);
        debug!(state = %initial, "initial state observed");
        supervisor
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        self.state.current()
    }

    pub fn history(&self) -> &[SupervisorState] {
        self.state.history()
    }

    pub fn health(&self) -> &HealthChecker {
        &self.health
    }

    /// Read the PID record and verify it against the OS.
    pub fn observe(&self) -> Result<Option<ProcessHandle>, SupervisorError> {
        let pid = self
            .pid_file
            .read()
            .map_err(|e| SupervisorError::io("failed to read pid file", e))?;

        Ok(pid.map(|pid| ProcessHandle {
            session: self.config.session_name.clone(),
            pid,
            pid_file: self.pid_file.path().to_path_buf(),
            log_file: self.config.log_file(),
            liveness: self.control.probe(pid, &self.config.validator_exe_name()),
        }))
    }

    // =========================================================================
    // START
    // =========================================================================

    /// Clean up, rebuild genesis, launch and health-check the validator.
    pub async fn start(&mut self, keys: &KeySet) -> Result<StartReport, SupervisorError> {
        self.config.check_layout()?;
        self.state.advance(SupervisorState::Cleaning)?;
        let cleaned = self.cleanup().await;
        self.guard(cleaned)?;

        self.state.advance(SupervisorState::GenesisPending)?;
        let spec = GenesisSpec::new(&self.config, keys);
        let created = self.genesis.create(&spec);
        self.guard(created)?;

        self.state.advance(SupervisorState::Starting)?;
        let launched = self.launch(keys).await;
        let handle = self.guard(launched)?;

        let health = self.health.poll(self.config.health_policy).await;
        if health == HealthStatus::Responding {
            self.state.advance(SupervisorState::Running)?;
        } else {
            warn!(
                pid = handle.pid,
                "validator launched but not yet responding; it may still be starting up"
            );
        }

        Ok(StartReport {
            pid: handle.pid,
            state: self.state.current(),
            health,
            log_file: handle.log_file,
            rpc_url: self.config.rpc_url(),
        })
    }

    /// `stop` then `start`.
    pub async fn restart(&mut self, keys: &KeySet) -> Result<RestartReport, SupervisorError> {
        self.config.check_layout()?;
        let stop = self.stop().await?;
        let start = self.start(keys).await?;
        Ok(RestartReport { stop, start })
    }

    fn guard<T, E>(&mut self, result: Result<T, E>) -> Result<T, SupervisorError>
    where
        E: Into<SupervisorError>,
    {
        result.map_err(|e| {
            self.state.fail();
            e.into()
        })
    }

    /// Terminate the recorded session and reclaim the RPC port.
    /// Absent targets are success.
    async fn cleanup(&self) -> Result<(), SupervisorError> {
        match self.observe()? {
            Some(handle) if handle.is_live() => {
                info!(pid = handle.pid, session = %handle.session, "terminating previous validator session");
                self.terminate(handle.pid).await?;
            }
            Some(handle) => {
                debug!(pid = handle.pid, liveness = ?handle.liveness, "discarding stale pid record");
            }
            None => debug!("no previous session recorded"),
        }
        self.pid_file
            .remove()
            .map_err(|e| SupervisorError::io("failed to remove pid file", e))?;

        self.reclaim_port().await?;
        Ok(())
    }

    async fn reclaim_port(&self) -> Result<(), ReclaimError> {
        let port = self.config.rpc_port;
        let resource = format!("rpc port {}", port);
        let own_pid = std::process::id();

        for check in 0..=PORT_RECLAIM_CHECKS {
            let holders = self
                .control
                .port_holders(port)
                .map_err(|source| ReclaimError::Os {
                    resource: resource.clone(),
                    source,
                })?;
            if holders.is_free() {
                if check > 0 {
                    info!(port, "rpc port reclaimed");
                }
                return Ok(());
            }

            let targets: Vec<u32> = holders
                .pids
                .iter()
                .copied()
                .filter(|pid| *pid != own_pid)
                .collect();
            if holders.pids.is_empty() {
                return Err(ReclaimError::HolderUnknown { resource });
            }
            if targets.is_empty() || check == PORT_RECLAIM_CHECKS {
                return Err(ReclaimError::StillHeld {
                    resource,
                    pids: holders.pids,
                });
            }

            for pid in targets {
                info!(pid, port, "killing process holding rpc port");
                match self.control.signal(pid, StopSignal::Kill) {
                    Ok(_) => {}
                    Err(ProcessError::PermissionDenied { pid }) => {
                        return Err(ReclaimError::PermissionDenied { resource, pid });
                    }
                    Err(source) => return Err(ReclaimError::Os { resource, source }),
                }
            }
            sleep(EXIT_POLL_INTERVAL).await;
        }
        Ok(())
    }

    /// Spawn the validator and survive the grace period.
    async fn launch(&self, keys: &KeySet) -> Result<ProcessHandle, LaunchError> {
        let log_file = self.config.log_file();
        let spec = LaunchSpec {
            command: self.validator_command(keys),
            log_file: log_file.clone(),
        };

        let pid = self.control.spawn_detached(&spec)?;
        info!(pid, log = %log_file.display(), "validator launched");

        if let Err(source) = self.pid_file.write(pid) {
            if let Err(e) = self.control.signal_group(pid, StopSignal::Kill) {
                warn!(pid, error = %e, "failed to kill unrecorded validator");
            }
            return Err(LaunchError::PidFile {
                path: self.pid_file.path().to_path_buf(),
                source,
            });
        }

        if !self.config.launch_grace.is_zero() {
            sleep(self.config.launch_grace).await;
        }
        if let Some(status) = self.control.exit_status(pid) {
            if let Err(e) = self.pid_file.remove() {
                warn!(error = %e, "failed to remove pid file of exited validator");
            }
            return Err(LaunchError::ExitedEarly {
                status,
                log_path: log_file,
            });
        }

        Ok(ProcessHandle {
            session: self.config.session_name.clone(),
            pid,
            pid_file: self.pid_file.path().to_path_buf(),
            log_file,
            liveness: Liveness::Running,
        })
    }

    /// Validator command line for `keys`.
    pub fn validator_command(&self, keys: &KeySet) -> CommandSpec {
        let c = &self.config;
        let (low, high) = c.dynamic_port_range;
        CommandSpec::new(&c.binaries.validator)
            .arg("--identity")
            .arg(&keys.identity().path)
            .arg("--vote-account")
            .arg(&keys.vote().path)
            .arg("--ledger")
            .arg(c.genesis_dir())
            .arg("--rpc-port")
            .arg(c.rpc_port.to_string())
            .arg("--rpc-bind-address")
            .arg(c.rpc_bind_address.to_string())
            .arg("--gossip-port")
            .arg(c.gossip_port.to_string())
            .arg("--dynamic-port-range")
            .arg(format!("{}-{}", low, high))
            .arg("--limit-ledger-size")
            .arg(c.limit_ledger_size.to_string())
            .arg("--full-rpc-api")
            .arg("--no-wait-for-vote-to-start-leader")
            .arg("--log")
            .arg("-")
            .env("RUST_LOG", c.validator_log_filter.clone())
    }

    // =========================================================================
    // STOP
    // =========================================================================

    /// Stop the recorded validator, if any, and invalidate the record.
    pub async fn stop(&mut self) -> Result<StopReport, SupervisorError> {
        let report = match self.observe()? {
            None => StopReport {
                pid: None,
                outcome: StopOutcome::NotRunning,
            },
            Some(handle) if handle.is_live() => StopReport {
                pid: Some(handle.pid),
                outcome: self.terminate(handle.pid).await?,
            },
            Some(handle) => {
                info!(pid = handle.pid, liveness = ?handle.liveness, "pid record is stale");
                StopReport {
                    pid: Some(handle.pid),
                    outcome: StopOutcome::StaleRecord,
                }
            }
        };

        self.pid_file
            .remove()
            .map_err(|e| SupervisorError::io("failed to remove pid file", e))?;
        self.state.advance(SupervisorState::Stopped)?;
        Ok(report)
    }

    /// SIGTERM the session, wait up to `stop_timeout`, then SIGKILL.
    async fn terminate(&self, pid: u32) -> Result<StopOutcome, ReclaimError> {
        let resource = format!("session {}", self.config.session_name);
        let exe = self.config.validator_exe_name();

        self.signal_session(pid, StopSignal::Terminate, &resource)?;
        let deadline = Instant::now() + self.config.stop_timeout;
        loop {
            if self.control.probe(pid, &exe) != Liveness::Running {
                self.sweep_group(pid);
                info!(pid, "validator exited");
                return Ok(StopOutcome::Terminated);
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(EXIT_POLL_INTERVAL).await;
        }

        warn!(pid, timeout = ?self.config.stop_timeout, "validator ignored SIGTERM; sending SIGKILL");
        self.signal_session(pid, StopSignal::Kill, &resource)?;
        for _ in 0..KILL_CHECKS {
            if self.control.probe(pid, &exe) != Liveness::Running {
                return Ok(StopOutcome::Killed);
            }
            sleep(EXIT_POLL_INTERVAL).await;
        }
        Err(ReclaimError::Unkillable { pid })
    }

    /// Signal the process group led by `pid`, falling back to the process.
    fn signal_session(
        &self,
        pid: u32,
        signal: StopSignal,
        resource: &str,
    ) -> Result<(), ReclaimError> {
        let delivered = match self.control.signal_group(pid, signal) {
            Ok(true) => Ok(true),
            Ok(false) => self.control.signal(pid, signal),
            Err(e) => Err(e),
        };
        match delivered {
            Ok(_) => Ok(()),
            Err(ProcessError::PermissionDenied { pid }) => Err(ReclaimError::PermissionDenied {
                resource: resource.to_string(),
                pid,
            }),
            Err(source) => Err(ReclaimError::Os {
                resource: resource.to_string(),
                source,
            }),
        }
    }

    /// Kill anything left in the session's process group.
    fn sweep_group(&self, pgid: u32) {
        match self.control.signal_group(pgid, StopSignal::Kill) {
            Ok(true) => debug!(pgid, "killed leftover session members"),
            Ok(false) => {}
            Err(e) => debug!(pgid, error = %e, "could not sweep session group"),
        }
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    /// Observe the validator now. Health is a single un-retried probe.
    pub async fn status(&self) -> Result<StatusReport, SupervisorError> {
        let handle = self.observe()?;
        let live = handle.as_ref().is_some_and(ProcessHandle::is_live);

        let health = if live {
            self.health.poll(RetryPolicy::once()).await
        } else {
            HealthStatus::Unknown
        };

        Ok(StatusReport {
            session: self.config.session_name.clone(),
            state: if live {
                SupervisorState::Running
            } else {
                SupervisorState::Stopped
            },
            pid: handle.as_ref().map(|h| h.pid),
            liveness: handle.as_ref().map(|h| h.liveness),
            stale_record: handle.as_ref().is_some_and(ProcessHandle::is_stale),
            started_at: if live { self.pid_file.written_at() } else { None },
            health,
            rpc_url: self.config.rpc_url(),
            pid_file: self.pid_file.path().to_path_buf(),
            log_file: self.config.log_file(),
        })
    }
}
