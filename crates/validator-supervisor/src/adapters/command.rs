//! # System Command Runner
//!
//! `CommandRunner` backed by `std::process::Command`. Arguments and
//! environment are passed as structured values; no shell is spawned.

use std::io;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::domain::errors::CommandError;
use crate::ports::outbound::{CommandOutput, CommandRunner, CommandSpec};

/// Runs external tools (keygen, genesis) to completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %command, "running external command");

        let output = Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => CommandError::NotFound {
                    program: command.program.clone(),
                },
                _ => CommandError::Io {
                    program: command.program.clone(),
                    source,
                },
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
