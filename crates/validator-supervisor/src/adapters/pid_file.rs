//! # PID Record
//!
//! Single-line file holding the OS process id of the supervised validator.
//!
//! The record is a hint, not the truth: every reader validates liveness with
//! a direct OS query before acting on it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;

/// PID file at `<ledger>/<session>.pid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded PID.
    ///
    /// A missing file is `Ok(None)`. Unparseable contents are treated the same
    /// way (and logged) so a corrupt record never blocks cleanup.
    pub fn read(&self) -> io::Result<Option<u32>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        match contents.trim().parse::<u32>() {
            Ok(pid) if pid > 0 => Ok(Some(pid)),
            _ => {
                warn!(path = %self.path.display(), "ignoring malformed pid file");
                Ok(None)
            }
        }
    }

    /// Record `pid`, replacing any previous record atomically.
    pub fn write(&self, pid: u32) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("pid.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            writeln!(file, "{}", pid)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)
    }

    /// Remove the record. Removing an absent record succeeds.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// When the record was last written.
    pub fn written_at(&self) -> Option<DateTime<Utc>> {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}
