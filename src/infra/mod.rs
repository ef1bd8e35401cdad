//! Infrastructure layer
//!
//! Handles filesystem operations, external processes and tool discovery.

pub mod filesystem;
pub mod process;
pub mod toolchain;
