//! # Ports
//!
//! Outbound traits the supervisor depends on. Each external effect
//! (subprocess, OS process control, JSON-RPC) sits behind one trait so it can
//! be replaced in tests.

pub mod outbound;

pub use outbound::{
    CommandOutput, CommandRunner, CommandSpec, LaunchSpec, PortHolders, ProcessControl,
    RpcTransport, StopSignal,
};
