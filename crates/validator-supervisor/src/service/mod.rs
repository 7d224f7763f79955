//! # Supervisor Services
//!
//! Components, leaf-first:
//!
//! 1. `KeyMaterialStore` - key-pair files to public identifiers
//! 2. `ConfigResolver` - defaults, overrides and executable discovery
//! 3. `GenesisBootstrapper` - destructive genesis rebuild
//! 4. `HealthChecker` - bounded JSON-RPC polling and probes
//! 5. `ProcessSupervisor` - cleanup / genesis / launch state machine
//! 6. `CommandDispatcher` - subcommand to operation, report printing
//!
//! ```text
//! CommandDispatcher → (ConfigResolver, KeyMaterialStore)
//!                   → ProcessSupervisor.cleanup → GenesisBootstrapper
//!                   → ProcessSupervisor.launch  → HealthChecker
//! ```

pub mod config_resolver;
pub mod dispatcher;
pub mod genesis;
pub mod health;
pub mod key_store;
pub mod supervisor;

pub use config_resolver::ConfigResolver;
pub use dispatcher::CommandDispatcher;
pub use genesis::GenesisBootstrapper;
pub use health::HealthChecker;
pub use key_store::KeyMaterialStore;
pub use supervisor::{
    ProcessSupervisor, RestartReport, StartReport, StatusReport, StopOutcome, StopReport,
};
