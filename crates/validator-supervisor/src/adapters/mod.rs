//! # Adapters
//!
//! Production implementations of the outbound ports.
//!
//! - `command`: subprocess runner for keygen and genesis
//! - `os_process`: signals, detached spawn, liveness, socket ownership
//! - `proc_net`: `/proc` socket table parsing
//! - `pid_file`: PID record on disk
//! - `rpc_client`: JSON-RPC over HTTP
//! - `log_tail`: tail / follow the validator log

pub mod command;
pub mod log_tail;
pub mod os_process;
pub mod pid_file;
pub mod proc_net;
pub mod rpc_client;

use std::sync::Arc;

pub use command::SystemCommandRunner;
pub use os_process::OsProcessControl;
pub use pid_file::PidFile;
pub use rpc_client::HttpRpcClient;

use crate::config::NodeConfig;
use crate::domain::errors::RpcError;
use crate::ports::outbound::{CommandRunner, ProcessControl, RpcTransport};

/// Every external effect the supervisor needs, bundled for wiring.
#[derive(Clone)]
pub struct SupervisorDependencies {
    pub runner: Arc<dyn CommandRunner>,
    pub control: Arc<dyn ProcessControl>,
    pub transport: Arc<dyn RpcTransport>,
}

impl SupervisorDependencies {
    /// Real OS and network adapters for `config`.
    pub fn production(config: &NodeConfig) -> Result<Self, RpcError> {
        Ok(Self {
            runner: Arc::new(SystemCommandRunner),
            control: Arc::new(OsProcessControl::new()),
            transport: Arc::new(HttpRpcClient::new(config.rpc_url())?),
        })
    }
}
