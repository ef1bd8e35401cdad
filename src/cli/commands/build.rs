//! Build command implementation
//!
//! Implements the default `pynexe` action: load the config, run every build
//! stage and report the outcome.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;

use crate::cli::output::{create_spinner, print_banner, print_panel, status, OutputConfig};
use crate::core::builder::{BuildOrchestrator, BuildReporter};
use crate::core::config::BuildConfig;
use crate::core::stage::{BuildResult, BuildStage, StageReport, StageStatus};
use crate::error::OptimizeWarning;
use crate::infra::process::SystemRunner;
use crate::infra::toolchain::Toolchain;

/// Build options
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Config file location
    pub config: PathBuf,
    /// Destination directory for the executable
    pub output_dir: Option<PathBuf>,
    /// Explicit environment directory
    pub build_dir: Option<PathBuf>,
    /// Keep the environment afterwards
    pub keep_env: bool,
    /// Disable compression
    pub no_compress: bool,
    /// Print the result as JSON
    pub json: bool,
}

/// Renders stage progress as a spinner per stage
struct SpinnerReporter {
    current: Mutex<Option<ProgressBar>>,
}

impl SpinnerReporter {
    fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn take_spinner(&self) -> Option<ProgressBar> {
        self.current.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl BuildReporter for SpinnerReporter {
    fn stage_started(&self, stage: BuildStage) {
        if let Ok(mut slot) = self.current.lock() {
            *slot = Some(create_spinner(stage.description()));
        }
    }

    fn stage_finished(&self, report: &StageReport) {
        let prefix = match report.status {
            StageStatus::Succeeded => status::SUCCESS,
            _ => status::ERROR,
        };
        let line = if report.note.is_empty() {
            format!("{prefix} {}", report.stage)
        } else {
            format!("{prefix} {}: {}", report.stage, report.note)
        };
        match self.take_spinner() {
            Some(spinner) => spinner.finish_with_message(line),
            None => println!("{line}"),
        }
    }

    fn warning(&self, warning: &OptimizeWarning) {
        let message = format!("{} {warning}", status::WARNING);
        match self.current.lock().ok().and_then(|slot| slot.clone()) {
            Some(spinner) => spinner.println(message),
            None => println!("{message}"),
        }
    }
}

/// Human-readable summary of a finished build
pub fn summary(result: &BuildResult) -> (String, String) {
    if let Some(failure) = result.failure() {
        let stage = failure
            .stage
            .map_or_else(|| "before build".to_string(), |s| s.to_string());
        let mut body = format!("Build failed!\nStage: {stage}\nError: {}", failure.error);
        for problem in result.cleanup_errors() {
            body.push_str(&format!("\n{} cleanup: {problem}", status::WARNING));
        }
        return ("Error".to_string(), body);
    }

    let mut body = result.message().to_string();
    if let Some(checksum) = result.checksum() {
        body.push_str(&format!("\nSHA-256: {checksum}"));
    }
    if let Some(stats) = result.compression() {
        body.push_str(&format!(
            "\nSize: {} -> {} bytes ({:.1}% smaller)",
            stats.original_size,
            stats.compressed_size,
            stats.ratio()
        ));
    }
    for warning in result.warnings() {
        let first = warning.to_string();
        let first = first.lines().next().unwrap_or_default();
        body.push_str(&format!("\n{} {first}", status::WARNING));
    }
    ("Success".to_string(), body)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received");
            signal_token.cancel();
        }
    });
    token
}

/// Execute the build command, returning the process exit code
pub async fn execute(options: BuildOptions) -> Result<i32> {
    let output = OutputConfig::current();
    print_banner();
    let config = BuildConfig::load(&options.config)?;
    let toolchain = Toolchain::discover(config.python_program().as_deref());

    print_panel(
        "Build Info",
        &format!(
            "Project: {}\nMain: {} → {}",
            config.project_name,
            config.main_file.display(),
            config.output_name
        ),
    );

    let mut orchestrator = BuildOrchestrator::new(config, SystemRunner::new())
        .with_interpreter(&toolchain.python)
        .with_compressor(toolchain.upx.clone())
        .no_compress(options.no_compress)
        .keep_environment(options.keep_env)
        .with_cancellation(cancel_on_ctrl_c());
    if let Some(dir) = options.output_dir {
        orchestrator = orchestrator.with_output_dir(dir);
    }
    if let Some(dir) = options.build_dir {
        orchestrator = orchestrator.with_build_root(dir);
    }
    if output.show_progress() {
        orchestrator = orchestrator.with_reporter(SpinnerReporter::new());
    }

    let result = orchestrator.run().await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    } else if result.is_completed() {
        let (title, body) = summary(&result);
        print_panel(&title, &body);
    } else {
        let (title, body) = summary(&result);
        eprintln!("{}", crate::cli::output::panel(&title, &body));
    }

    Ok(result.exit_code())
}
