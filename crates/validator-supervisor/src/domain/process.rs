//! # Process Handle
//!
//! The supervisor's view of the validator process, recomputed from the PID
//! record and a direct OS query on every invocation. The PID file alone is
//! never treated as authoritative.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// OS-observed state of a recorded PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// Alive and running the expected executable (or unverifiable but alive).
    Running,
    /// No such process, or a zombie awaiting reaping.
    Exited,
    /// Alive, but the PID now belongs to a different executable.
    Reused,
}

/// A recorded validator process together with its observed liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessHandle {
    /// Reserved session name; also the PID file stem.
    pub session: String,
    /// Recorded OS process id (session and process-group leader).
    pub pid: u32,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
    pub liveness: Liveness,
}

impl ProcessHandle {
    /// True if this handle refers to the validator we launched and it is alive.
    pub fn is_live(&self) -> bool {
        self.liveness == Liveness::Running
    }

    /// True if the PID record no longer describes a live validator.
    pub fn is_stale(&self) -> bool {
        !self.is_live()
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {}, {:?})", self.session, self.pid, self.liveness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(liveness: Liveness) -> ProcessHandle {
        ProcessHandle {
            session: "production-validator".into(),
            pid: 4242,
            pid_file: PathBuf::from("/l/production-validator.pid"),
            log_file: PathBuf::from("/l/identity-keypair.log"),
            liveness,
        }
    }

    #[test]
    fn test_only_running_is_live() {
        assert!(handle(Liveness::Running).is_live());
        assert!(handle(Liveness::Exited).is_stale());
        assert!(handle(Liveness::Reused).is_stale());
    }
}
