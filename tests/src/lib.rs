//! # Validator Supervisor Test Suite
//!
//! End-to-end command flows driven through `CommandDispatcher` against the
//! in-memory adapters exported by `validator_supervisor::test_utils`.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── lifecycle_flows.rs   # start / stop / restart across invocations
//!     └── operator_flows.rs    # status, logs, probes, misconfiguration
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p supervisor-tests
//! cargo test -p supervisor-tests integration::lifecycle_flows
//! ```

#![allow(dead_code)]

pub mod integration;
