//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying spinners, boxed panels
//! and status-prefixed messages to the user.

use std::sync::OnceLock;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{BuildError, ConfigError};

/// Global output settings, set once at startup
static OUTPUT: OnceLock<OutputConfig> = OnceLock::new();

/// How much the CLI prints and in which format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Print nothing but errors
    pub quiet: bool,
    /// Print machine-readable JSON instead of text
    pub json: bool,
    /// Verbosity level from `-v` flags
    pub verbose: u8,
}

impl OutputConfig {
    /// Create output settings from CLI flags
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make these settings visible through [`OutputConfig::current`]
    pub fn apply_global(self) {
        if OUTPUT.set(self).is_err() {
            tracing::debug!("Output configuration already applied");
        }
    }

    /// Settings applied at startup, or the defaults
    pub fn current() -> Self {
        OUTPUT.get().copied().unwrap_or_default()
    }

    /// Whether decorative text output should be shown
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Default tracing level for this verbosity
    pub fn log_level(&self) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, _) => tracing::Level::DEBUG,
        }
    }
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Render `body` inside a box with `title` in the top border
pub fn panel(title: &str, body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let width = lines
        .iter()
        .map(|line| line.chars().count())
        .chain(std::iter::once(title.chars().count() + 2))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let header = if title.is_empty() {
        String::new()
    } else {
        format!(" {title} ")
    };
    out.push_str(&format!(
        "╭─{header}{}─╮\n",
        "─".repeat(width.saturating_sub(header.chars().count()))
    ));
    for line in lines {
        let pad = width - line.chars().count();
        out.push_str(&format!("│ {line}{} │\n", " ".repeat(pad)));
    }
    out.push_str(&format!("╰─{}─╯", "─".repeat(width)));
    out
}

/// Print a panel to stdout unless output is suppressed
pub fn print_panel(title: &str, body: &str) {
    if OutputConfig::current().show_progress() {
        println!("{}", panel(title, body));
    }
}

/// Product banner shown ahead of every action
pub fn banner() -> String {
    panel(
        "",
        &format!(
            "pynexe {} - Python to native builder",
            env!("CARGO_PKG_VERSION")
        ),
    )
}

/// Print the banner unless output is quiet or machine-readable
pub fn print_banner() {
    if OutputConfig::current().show_progress() {
        println!("{}", banner());
    }
}

/// Print an error to stderr, as a panel or as JSON
pub fn display_error(err: &anyhow::Error) {
    let output = OutputConfig::current();
    if output.json {
        let value = serde_json::json!({
            "error": err.to_string(),
            "exit_code": exit_code_for(err),
        });
        eprintln!("{value}");
        return;
    }

    let mut body = format!("{} {err}", status::ERROR);
    for cause in err.chain().skip(1) {
        body.push_str(&format!("\n  caused by: {cause}"));
    }
    if matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NotFound { .. })
    ) {
        body.push_str("\nCreate config.yaml with your project settings");
    }
    eprintln!("{}", panel("Error", &body));
}

/// Exit code for an error that escaped a command
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        crate::error::EXIT_CONFIG
    } else if let Some(build) = err.downcast_ref::<BuildError>() {
        build.exit_code()
    } else {
        crate::error::EXIT_GENERIC
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}
