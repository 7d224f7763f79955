//! # Validator Supervisor
//!
//! Operator-facing lifecycle supervisor for one long-running validator node
//! per ledger directory. It rebuilds genesis deterministically, launches the
//! validator as a detached background session, verifies it becomes healthy,
//! and offers idempotent lifecycle commands.
//!
//! ## Lifecycle
//!
//! ```text
//!                 start / restart
//!  Stopped ─────────────┐
//!  Running ─────────────┤
//!                       ↓
//!                   Cleaning ──────→ GenesisPending ──────→ Starting ──────→ Running
//!                  (reclaim pid,     (wipe genesis,        (spawn, pid      (health
//!                   session, port)    run genesis tool)     file, grace)     poll ok)
//!                       │                   │                   │
//!                       └───────────────────┴───────────────────┴──→ Failed
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | At most one live validator per ledger | `Cleaning` terminates the recorded session before any launch |
//! | Liveness from the OS, never from memory | handle re-derived from the PID file + OS probe on every call |
//! | Reused PIDs are never signalled | executable name checked before signalling |
//! | No half-written genesis | genesis directory cleared before the tool runs and scrubbed if it fails |
//! | Key material survives genesis | keys and fixtures directories refused inside the ledger |
//! | Bounded health polling | whole poll capped at `max_attempts * interval` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - pure types and the state machine
//! - `ports/` - outbound traits (subprocess, process control, JSON-RPC)
//! - `adapters/` - OS and HTTP implementations of the ports
//! - `service/` - the six supervisor components
//! - `config` / `cli` / `logging` - ambient setup for the binary

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::SupervisorDependencies;
pub use cli::{Cli, Command};
pub use config::{ConfigOverrides, NodeConfig};
pub use domain::{
    ErrorCategory, HealthStatus, KeySet, ProcessHandle, RetryPolicy, SupervisorError,
    SupervisorState,
};
pub use service::{
    CommandDispatcher, ConfigResolver, GenesisBootstrapper, HealthChecker, KeyMaterialStore,
    ProcessSupervisor,
};
