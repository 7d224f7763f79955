//! # OS Process Control
//!
//! `ProcessControl` for Unix hosts:
//!
//! - liveness: `kill(pid, 0)` plus a `sysinfo` lookup that rejects zombies and
//!   PIDs that now belong to a different executable
//! - signals: `nix` `kill` / `killpg`
//! - launch: `std::process::Command` with `setsid()` in the child, so the
//!   validator leads its own session and outlives the supervisor
//! - port ownership: `/proc` socket tables (Linux)

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid};
use parking_lot::Mutex;
use sysinfo::{ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, warn};

use super::proc_net;
use crate::domain::errors::ProcessError;
use crate::domain::process::Liveness;
use crate::ports::outbound::{LaunchSpec, PortHolders, ProcessControl, StopSignal};

/// Linux truncates `comm` to 15 bytes.
const COMM_LEN: usize = 15;

/// Production process control.
#[derive(Debug, Default)]
pub struct OsProcessControl {
    /// Children spawned by this invocation, kept for early-exit detection.
    children: Mutex<HashMap<u32, Child>>,
}

impl OsProcessControl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessControl for OsProcessControl {
    fn probe(&self, pid: u32, expected_exe: &str) -> Liveness {
        let Ok(raw) = to_raw_pid(pid) else {
            return Liveness::Exited;
        };
        match signal::kill(raw, None) {
            Err(Errno::ESRCH) => return Liveness::Exited,
            // EPERM: exists but owned by another user; keep checking
            Ok(()) | Err(_) => {}
        }

        let sys_pid = sysinfo::Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);

        let Some(process) = system.process(sys_pid) else {
            return Liveness::Exited;
        };
        if process.status() == ProcessStatus::Zombie {
            return Liveness::Exited;
        }

        let actual = process
            .exe()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().trim_end_matches(" (deleted)").to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| process.name().to_string_lossy().into_owned());

        if actual.is_empty() || expected_exe.is_empty() || exe_matches(&actual, expected_exe) {
            Liveness::Running
        } else {
            debug!(pid, actual = %actual, expected = %expected_exe, "pid belongs to another executable");
            Liveness::Reused
        }
    }

    fn signal(&self, pid: u32, stop: StopSignal) -> Result<bool, ProcessError> {
        let raw = to_raw_pid(pid)?;
        deliver(pid, signal::kill(raw, to_signal(stop)))
    }

    fn signal_group(&self, pgid: u32, stop: StopSignal) -> Result<bool, ProcessError> {
        let raw = to_raw_pid(pgid)?;
        deliver(pgid, signal::killpg(raw, to_signal(stop)))
    }

    fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32, ProcessError> {
        let program = spec.command.program.clone();
        let spawn_err = |source: io::Error| ProcessError::Spawn {
            program: program.clone(),
            source,
        };

        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log_file)
            .map_err(spawn_err)?;
        let stderr = stdout.try_clone().map_err(spawn_err)?;

        let mut command = Command::new(&spec.command.program);
        command
            .args(&spec.command.args)
            .envs(&spec.command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        // SAFETY: setsid is async-signal-safe and touches no shared state.
        unsafe {
            command.pre_exec(|| unistd::setsid().map(|_| ()).map_err(io::Error::from));
        }

        let child = command.spawn().map_err(spawn_err)?;
        let pid = child.id();
        self.children.lock().insert(pid, child);
        Ok(pid)
    }

    fn exit_status(&self, pid: u32) -> Option<String> {
        let mut children = self.children.lock();
        let child = children.get_mut(&pid)?;
        match child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => None,
            Err(e) => {
                warn!(pid, error = %e, "failed to query child status");
                None
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn port_holders(&self, port: u16) -> Result<PortHolders, ProcessError> {
        proc_net::port_holders(Path::new("/proc"), port)
    }

    #[cfg(not(target_os = "linux"))]
    fn port_holders(&self, _port: u16) -> Result<PortHolders, ProcessError> {
        Err(ProcessError::Inspect(
            "socket ownership lookup requires /proc".to_string(),
        ))
    }
}

/// Compare an observed executable name with the expected one, allowing for
/// `comm` truncation.
pub fn exe_matches(actual: &str, expected: &str) -> bool {
    actual == expected || (actual.len() >= COMM_LEN && expected.starts_with(actual))
}

fn to_signal(stop: StopSignal) -> Signal {
    match stop {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    }
}

/// Convert to a signalable PID. 0 and 1 address the caller's group and init.
fn to_raw_pid(pid: u32) -> Result<Pid, ProcessError> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 1 => Ok(Pid::from_raw(raw)),
        _ => Err(ProcessError::Signal {
            pid,
            reason: "refusing to signal reserved pid".to_string(),
        }),
    }
}

fn deliver(pid: u32, result: nix::Result<()>) -> Result<bool, ProcessError> {
    match result {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Err(ProcessError::PermissionDenied { pid }),
        Err(errno) => Err(ProcessError::Signal {
            pid,
            reason: errno.desc().to_string(),
        }),
    }
}
