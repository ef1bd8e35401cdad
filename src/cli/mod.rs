//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::defaults::DEFAULT_CONFIG_FILE;
use commands::build::BuildOptions;

/// pynexe - Python to native executable builder
///
/// Reads a YAML project description and compiles the project into a
/// standalone executable with Nuitka, inside a throwaway virtual environment.
#[derive(Parser, Debug)]
#[command(name = "pynexe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "PYNEXE_CONFIG")]
    pub config: PathBuf,

    /// Show project info without building
    #[arg(long)]
    pub info: bool,

    /// Show detailed help
    #[arg(long)]
    pub show_help: bool,

    /// Directory the executable is written to (default: project directory)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory for the build environment (must be empty or absent)
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Keep the build environment after the build for debugging
    #[arg(long)]
    pub keep_env: bool,

    /// Skip executable compression
    #[arg(long)]
    pub no_compress: bool,

    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Execute the requested action, returning the process exit code
    pub async fn run(self) -> Result<i32> {
        if self.show_help {
            commands::help::execute();
            return Ok(0);
        }

        if self.info {
            commands::info::execute(&self.config, self.json)?;
            return Ok(0);
        }

        commands::build::execute(BuildOptions {
            config: self.config,
            output_dir: self.output_dir,
            build_dir: self.build_dir,
            keep_env: self.keep_env,
            no_compress: self.no_compress,
            json: self.json,
        })
        .await
    }
}
