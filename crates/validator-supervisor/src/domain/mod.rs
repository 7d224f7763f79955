//! # Domain Layer
//!
//! Pure types for the supervisor. No I/O happens here except the existence
//! check for the optional primordial accounts fixture in `GenesisSpec::new`.

pub mod errors;
pub mod genesis;
pub mod health;
pub mod keys;
pub mod process;
pub mod state;

pub use errors::{
    CommandError, ConfigError, ErrorCategory, GenesisError, KeyError, LaunchError, ProcessError,
    ReclaimError, RpcError, SupervisorError,
};
pub use genesis::{GenesisSpec, HashesPerTick};
pub use health::{HealthStatus, Probe, ProbeReport, RetryPolicy};
pub use keys::{KeyPairFile, KeyRole, KeySet};
pub use process::{Liveness, ProcessHandle};
pub use state::{StateMachine, SupervisorState};
