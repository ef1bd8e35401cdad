//! Configuration and constants
//!
//! Compile-time defaults shared by the config model, the orchestrator and the
//! CLI.

pub mod defaults;
