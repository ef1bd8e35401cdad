//! Core business logic module
//!
//! Everything that decides what a build does. External tools are reached
//! only through [`crate::infra::process::ToolRunner`].
//!
//! # Submodules
//!
//! - [`config`] - `config.yaml` model and validation
//! - [`build_env`] - Isolated virtual environment lifecycle
//! - [`installer`] - Dependency installation with pip
//! - [`compile`] - Nuitka command construction
//! - [`compress`] - Executable compression using UPX
//! - [`clean`] - Removal of compiler leftovers
//! - [`stage`] - Stage state machine and build results
//! - [`builder`] - Build orchestration

pub mod build_env;
pub mod builder;
pub mod clean;
pub mod compile;
pub mod compress;
pub mod config;
pub mod installer;
pub mod stage;
