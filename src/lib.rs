//! pynexe - Python to native executable builder
//!
//! This library turns a Python project described by a `config.yaml` file
//! into a standalone executable. Each build creates a throwaway virtual
//! environment, installs Nuitka and the project's libraries into it, compiles,
//! optionally compresses the result with UPX and cleans up after itself.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Build configuration, stages and orchestration
//! - [`infra`] - Infrastructure layer (filesystem, processes, tool discovery)
//! - [`config`] - Configuration constants
//! - [`error`] - Error types and exit codes

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
