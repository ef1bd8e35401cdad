//! pynexe CLI - Python to native executable builder
//!
//! Entry point for the pynexe command-line application.

use clap::Parser;

use pynexe::cli::output::{display_error, exit_code_for, OutputConfig};
use pynexe::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Apply output configuration globally
    let output_config = OutputConfig::new(cli.quiet, cli.json, cli.verbose);
    output_config.apply_global();

    // RUST_LOG wins over -v/-q
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(output_config.log_level().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let code = match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            display_error(&e);
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}
