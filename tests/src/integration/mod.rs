//! # Integration Flows
//!
//! Every test builds a fresh dispatcher per command, mirroring separate CLI
//! invocations that share nothing but the filesystem and the (mock) OS.

pub mod lifecycle_flows;
pub mod operator_flows;

use std::path::Path;

use validator_supervisor::test_utils::{test_config, MockEnvironment};
use validator_supervisor::{Command, CommandDispatcher, SupervisorError};

/// Run one command as a separate invocation and return what it printed.
pub async fn invoke(
    root: &Path,
    env: &MockEnvironment,
    command: Command,
) -> Result<String, SupervisorError> {
    let mut dispatcher = CommandDispatcher::new(test_config(root), env.dependencies(), Vec::new());
    dispatcher.dispatch(command).await?;
    Ok(String::from_utf8_lossy(&dispatcher.into_output()).into_owned())
}
