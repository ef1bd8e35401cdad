//! CLI command implementations
//!
//! Each action is implemented in its own submodule.

pub mod build;
pub mod help;
pub mod info;
