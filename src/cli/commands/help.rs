//! Help command implementation
//!
//! Implements `pynexe --show-help`.

use crate::cli::output::{banner, panel};

const USAGE: &str = "\
Usage:
  pynexe                       # Build project
  pynexe --info                # Show project info
  pynexe --config my.yaml      # Use another config file
  pynexe --show-help           # Show this help

Options:
  --output-dir <DIR>           Where the executable is written
  --build-dir <DIR>            Where the build environment is created
  --keep-env                   Keep the build environment for debugging
  --no-compress                Skip UPX compression
  --json                       Machine-readable output
  -q, --quiet / -v, --verbose  Less / more output

Examples:
  pynexe
  pynexe --info --json
  pynexe --config my_config.yaml --output-dir release";

/// Render the banner and usage panels
pub fn render() -> String {
    format!("{}\n{}", banner(), panel("Help", USAGE))
}

/// Execute the help command
pub fn execute() {
    println!("{}", render());
}
