//! Build orchestration logic
//!
//! Runs the fixed stage sequence for one project:
//! environment setup, dependency install, compile, optimize, cleanup.
//! The first failing stage aborts the rest, but cleanup always runs once the
//! environment exists.

use std::future::Future;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::config::defaults::{DEFAULT_PYTHON, OUTPUT_TAIL_LINES};
use crate::core::build_env::{default_build_root, EnvironmentHandle, EnvironmentManager};
use crate::core::clean::clean_project;
use crate::core::compile::{compiler_invocation, staged_artifact};
use crate::core::compress::{compress_executable, CompressionConfig};
use crate::core::config::BuildConfig;
use crate::core::installer::DependencyInstaller;
use crate::core::stage::{
    BuildResult, BuildResultBuilder, BuildStage, StageFailure, StageReport, StageTracker,
};
use crate::error::{BuildError, CompileError, OptimizeWarning};
use crate::infra::filesystem;
use crate::infra::process::ToolRunner;

/// Observer for build progress
///
/// The core never prints; front ends implement this to render progress.
pub trait BuildReporter: Send + Sync {
    /// A stage moved to `Running`
    fn stage_started(&self, _stage: BuildStage) {}

    /// A stage reached `Succeeded` or `Failed`
    fn stage_finished(&self, _report: &StageReport) {}

    /// The optimize stage degraded
    fn warning(&self, _warning: &OptimizeWarning) {}
}

/// Reporter that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl BuildReporter for NoopReporter {}

/// Build orchestrator state
pub struct BuildOrchestrator<R> {
    config: BuildConfig,
    runner: R,
    build_root: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    interpreter: Option<PathBuf>,
    compressor: Option<PathBuf>,
    no_compress: bool,
    keep_environment: bool,
    reporter: Box<dyn BuildReporter>,
    cancel: CancellationToken,
}

impl<R: ToolRunner> BuildOrchestrator<R> {
    /// Create an orchestrator for `config`, running tools with `runner`
    pub fn new(config: BuildConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            build_root: None,
            output_dir: None,
            interpreter: None,
            compressor: None,
            no_compress: false,
            keep_environment: false,
            reporter: Box::new(NoopReporter),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an explicit environment directory
    #[must_use]
    pub fn with_build_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.build_root = Some(root.into());
        self
    }

    /// Place the executable in `dir` instead of the project directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Host interpreter used to create the environment
    #[must_use]
    pub fn with_interpreter(mut self, python: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(python.into());
        self
    }

    /// Compression tool location, `None` when it is not installed
    #[must_use]
    pub fn with_compressor(mut self, tool: Option<PathBuf>) -> Self {
        self.compressor = tool;
        self
    }

    /// Skip compression regardless of the config
    #[must_use]
    pub fn no_compress(mut self, no_compress: bool) -> Self {
        self.no_compress = no_compress;
        self
    }

    /// Keep the environment directory after the build
    #[must_use]
    pub fn keep_environment(mut self, keep: bool) -> Self {
        self.keep_environment = keep;
        self
    }

    /// Send progress events to `reporter`
    #[must_use]
    pub fn with_reporter(mut self, reporter: impl BuildReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Abort the build when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Directory the environment will be created in
    pub fn build_root(&self) -> PathBuf {
        self.build_root
            .clone()
            .unwrap_or_else(|| default_build_root(&self.config.project_name))
    }

    /// Final location of the executable
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir
            .as_deref()
            .unwrap_or_else(|| self.config.project_dir())
            .join(&self.config.output_name)
    }

    fn interpreter(&self) -> PathBuf {
        self.interpreter.clone().unwrap_or_else(|| {
            PathBuf::from(self.config.python.as_deref().unwrap_or(DEFAULT_PYTHON))
        })
    }

    fn compression(&self) -> CompressionConfig {
        CompressionConfig {
            config_enabled: self.config.compress,
            cli_no_compress: self.no_compress,
            tool: self.compressor.clone(),
        }
    }

    /// Run every stage and summarize the outcome
    pub async fn run(self) -> BuildResult {
        let mut tracker = StageTracker::new();
        let mut result = BuildResultBuilder::default();

        if let Err(e) = self.config.validate() {
            tracing::error!("{e}");
            result.failure = Some(StageFailure {
                stage: None,
                error: e.into(),
            });
            return result.finish(tracker);
        }

        if self.cancel.is_cancelled() {
            result.failure = Some(StageFailure {
                stage: None,
                error: BuildError::Cancelled,
            });
            return result.finish(tracker);
        }

        let manager =
            EnvironmentManager::new(self.build_root(), self.interpreter(), self.config.project_dir());

        self.begin(&mut tracker, BuildStage::EnvironmentSetup);
        let handle = match self.race(manager.create(&self.runner)).await {
            Ok(handle) => {
                let note = format!("Created {}", handle.root().display());
                self.succeed(&mut tracker, BuildStage::EnvironmentSetup, note);
                handle
            }
            Err(error) => {
                if matches!(error, BuildError::Cancelled) {
                    manager.discard();
                }
                self.fail(&mut tracker, &mut result, BuildStage::EnvironmentSetup, error);
                return result.finish(tracker);
            }
        };

        self.build_in(&handle, &mut tracker, &mut result).await;
        self.cleanup(&manager, handle, &mut tracker, &mut result);

        let outcome = result.finish(tracker);
        tracing::info!("{}", outcome.message());
        outcome
    }

    /// Dependency install, compile and optimize; stops at the first failure
    async fn build_in(
        &self,
        handle: &EnvironmentHandle,
        tracker: &mut StageTracker,
        result: &mut BuildResultBuilder,
    ) {
        self.begin(tracker, BuildStage::DependencyInstall);
        let installer = DependencyInstaller::new(&self.runner);
        let install = installer.install(handle, &self.config.build_libs, &self.config.project_libs);
        match self.guarded(install).await {
            Ok(report) => {
                let note = format!("Installed {} package(s)", report.installed_count());
                self.succeed(tracker, BuildStage::DependencyInstall, note);
            }
            Err(error) => {
                self.fail(tracker, result, BuildStage::DependencyInstall, error);
                return;
            }
        }

        self.begin(tracker, BuildStage::Compile);
        let artifact = match self.guarded(self.compile(handle)).await {
            Ok(artifact) => {
                let note = format!("Wrote {}", artifact.display());
                self.succeed(tracker, BuildStage::Compile, note);
                artifact
            }
            Err(error) => {
                self.fail(tracker, result, BuildStage::Compile, error);
                return;
            }
        };

        self.begin(tracker, BuildStage::Optimize);
        let compression = self.compression();
        let optimize = async {
            Ok::<_, BuildError>(compress_executable(&self.runner, &artifact, &compression).await)
        };
        match self.guarded(optimize).await {
            Ok(outcome) => {
                if let Some(ref warning) = outcome.warning {
                    self.reporter.warning(warning);
                    result.warnings.push(warning.clone());
                }
                result.compression = outcome.stats;
                self.succeed(tracker, BuildStage::Optimize, outcome.note);
            }
            Err(error) => {
                self.fail(tracker, result, BuildStage::Optimize, error);
                return;
            }
        }

        result.checksum = match filesystem::sha256_file(&artifact) {
            Ok(digest) => Some(digest),
            Err(e) => {
                tracing::warn!("Failed to hash {}: {e}", artifact.display());
                None
            }
        };
        result.artifact = Some(artifact);
    }

    /// Run the compiler and move its output into place
    async fn compile(&self, handle: &EnvironmentHandle) -> Result<PathBuf, CompileError> {
        let invocation = compiler_invocation(&self.config, handle);
        tracing::info!("Compiling {}", self.config.main_file.display());
        tracing::debug!("{invocation}");

        let output = self.runner.run(&invocation).await?;
        if !output.is_success() {
            return Err(CompileError::Failed {
                code: output.code,
                output: output.tail(OUTPUT_TAIL_LINES),
            });
        }

        let staged = staged_artifact(&self.config, handle);
        if !staged.is_file() {
            return Err(CompileError::MissingArtifact { path: staged });
        }

        let dest = self.artifact_path();
        filesystem::promote_file(&staged, &dest).map_err(|e| CompileError::Promote {
            from: staged.clone(),
            to: dest.clone(),
            error: e.to_string(),
        })
    }

    /// Remove build leftovers and the environment
    fn cleanup(
        &self,
        manager: &EnvironmentManager,
        handle: EnvironmentHandle,
        tracker: &mut StageTracker,
        result: &mut BuildResultBuilder,
    ) {
        self.begin(tracker, BuildStage::Cleanup);

        let cleaned = clean_project(self.config.project_dir(), &self.config.cleanup_items());
        result.cleanup_errors.extend(
            cleaned
                .failed
                .into_iter()
                .map(|(item, reason)| format!("{item}: {reason}")),
        );

        if self.keep_environment {
            let note = format!("Kept build directory {}", handle.root().display());
            tracing::info!("{note}");
            self.succeed(tracker, BuildStage::Cleanup, note);
            return;
        }

        let root = handle.root().to_path_buf();
        match manager.destroy(handle) {
            Ok(()) => {
                let note = format!("Removed {} item(s)", cleaned.removed.len());
                self.succeed(tracker, BuildStage::Cleanup, note);
            }
            Err(e) => {
                tracing::error!("{e}");
                result.cleanup_errors.push(e.to_string());
                if result.failure.is_some() {
                    tracker.fail(BuildStage::Cleanup, short_note(&e.to_string()));
                    self.reporter.stage_finished(tracker.report(BuildStage::Cleanup));
                } else {
                    self.fail(tracker, result, BuildStage::Cleanup, e.into());
                }
                tracing::warn!("Build directory left behind at {}", root.display());
            }
        }
    }

    /// Run a stage unless the build was already interrupted
    async fn guarded<T, E, F>(&self, stage: F) -> Result<T, BuildError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<BuildError>,
    {
        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        self.race(stage).await
    }

    /// Race a stage against cancellation.
    ///
    /// The stage is polled first, so a cancelled stage has always passed its
    /// synchronous preconditions.
    async fn race<T, E, F>(&self, stage: F) -> Result<T, BuildError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<BuildError>,
    {
        tokio::select! {
            biased;
            outcome = stage => outcome.map_err(Into::into),
            () = self.cancel.cancelled() => {
                tracing::warn!("Build interrupted, stopping current stage");
                Err(BuildError::Cancelled)
            }
        }
    }

    fn begin(&self, tracker: &mut StageTracker, stage: BuildStage) {
        tracing::info!("{}", stage.description());
        tracker.start(stage);
        self.reporter.stage_started(stage);
    }

    fn succeed(&self, tracker: &mut StageTracker, stage: BuildStage, note: impl Into<String>) {
        tracker.succeed(stage, note);
        self.reporter.stage_finished(tracker.report(stage));
    }

    fn fail(
        &self,
        tracker: &mut StageTracker,
        result: &mut BuildResultBuilder,
        stage: BuildStage,
        error: BuildError,
    ) {
        tracing::error!("{stage} failed: {error}");
        tracker.fail(stage, short_note(&error.to_string()));
        self.reporter.stage_finished(tracker.report(stage));
        result.failure = Some(StageFailure {
            stage: Some(stage),
            error,
        });
    }
}

/// First line of an error message
fn short_note(message: &str) -> String {
    message.lines().next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::{BuildOutcome, StageStatus};
    use crate::error::ProcessError;
    use crate::infra::process::{Invocation, ToolOutput};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Succeeds at everything and writes the compiler output where asked
    #[derive(Default)]
    struct StubRunner {
        fail_when: Option<&'static str>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl StubRunner {
        fn failing(arg: &'static str) -> Self {
            Self {
                fail_when: Some(arg),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn ran(&self, arg: &str) -> bool {
            self.calls.lock().unwrap().iter().any(|inv| inv.has_arg(arg))
        }
    }

    impl ToolRunner for StubRunner {
        fn run(
            &self,
            invocation: &Invocation,
        ) -> impl Future<Output = Result<ToolOutput, ProcessError>> + Send {
            self.calls.lock().unwrap().push(invocation.clone());
            let fail = self.fail_when.is_some_and(|arg| invocation.has_arg(arg));
            let outdir = invocation.flag_value("--output-dir").map(PathBuf::from);
            let name = invocation.flag_value("--output-filename").map(String::from);
            async move {
                if fail {
                    return Ok(ToolOutput::failure(1, "boom"));
                }
                if let (Some(dir), Some(name)) = (outdir, name) {
                    std::fs::write(dir.join(name), b"MZ\x90\x00binary").unwrap();
                }
                Ok(ToolOutput::success(""))
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingReporter {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl BuildReporter for RecordingReporter {
        fn stage_started(&self, stage: BuildStage) {
            self.events.lock().unwrap().push(format!("start {stage}"));
        }

        fn stage_finished(&self, report: &StageReport) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{:?} {}", report.status, report.stage));
        }
    }

    fn project(dir: &TempDir) -> BuildConfig {
        std::fs::write(dir.path().join("main.py"), "print(1)").unwrap();
        BuildConfig::new("demo", "main.py", "demo.exe").with_project_dir(dir.path())
    }

    #[tokio::test]
    async fn test_successful_build_runs_every_stage() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("env");
        let reporter = RecordingReporter::default();

        let result = BuildOrchestrator::new(project(&tmp), StubRunner::default())
            .with_build_root(&env)
            .with_reporter(reporter.clone())
            .run()
            .await;

        assert_eq!(result.outcome(), BuildOutcome::Completed, "{}", result.message());
        assert!(result
            .stages()
            .iter()
            .all(|r| r.status == StageStatus::Succeeded));
        assert_eq!(result.artifact(), Some(tmp.path().join("demo.exe").as_path()));
        assert!(result.checksum().is_some());
        assert_eq!(result.warnings(), &[OptimizeWarning::ToolUnavailable]);
        assert!(!env.exists());

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 10);
        assert_eq!(events[0], "start Environment setup");
        assert_eq!(events[9], "Succeeded Cleanup");
    }

    #[tokio::test]
    async fn test_invalid_config_runs_nothing() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("env");
        let config = BuildConfig::new("demo", "missing.py", "demo.exe").with_project_dir(tmp.path());
        let runner = StubRunner::default();

        let result = BuildOrchestrator::new(config, &runner)
            .with_build_root(&env)
            .run()
            .await;

        assert_eq!(result.exit_code(), crate::error::EXIT_CONFIG);
        assert!(result.failure().unwrap().stage.is_none());
        assert!(runner.calls.lock().unwrap().is_empty());
        assert!(!env.exists());
    }

    #[tokio::test]
    async fn test_compile_failure_still_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("env");

        let result = BuildOrchestrator::new(project(&tmp), StubRunner::failing("--standalone"))
            .with_build_root(&env)
            .run()
            .await;

        assert_eq!(result.outcome(), BuildOutcome::Aborted);
        assert_eq!(result.status(BuildStage::Compile), StageStatus::Failed);
        assert_eq!(result.status(BuildStage::Optimize), StageStatus::Pending);
        assert_eq!(result.status(BuildStage::Cleanup), StageStatus::Succeeded);
        assert_eq!(result.exit_code(), crate::error::EXIT_COMPILE);
        assert!(!env.exists());
        assert!(!tmp.path().join("demo.exe").exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_compile_error() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.output_name = "other.exe".to_string();

        struct SilentRunner;
        impl ToolRunner for SilentRunner {
            fn run(
                &self,
                _invocation: &Invocation,
            ) -> impl Future<Output = Result<ToolOutput, ProcessError>> + Send {
                async { Ok(ToolOutput::success("")) }
            }
        }

        let result = BuildOrchestrator::new(config, SilentRunner)
            .with_build_root(tmp.path().join("env"))
            .run()
            .await;

        assert!(matches!(
            result.failure().map(|f| &f.error),
            Some(BuildError::Compile(CompileError::MissingArtifact { .. }))
        ));
    }

    #[tokio::test]
    async fn test_keep_environment_retains_directory() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("env");

        let result = BuildOrchestrator::new(project(&tmp), StubRunner::default())
            .with_build_root(&env)
            .keep_environment(true)
            .run()
            .await;

        assert!(result.is_completed());
        assert!(env.join("dist").is_dir());
    }

    #[tokio::test]
    async fn test_output_dir_and_no_compress() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("release");
        let runner = StubRunner::default();

        let result = BuildOrchestrator::new(project(&tmp), &runner)
            .with_build_root(tmp.path().join("env"))
            .with_output_dir(&out)
            .with_compressor(Some(PathBuf::from("upx")))
            .no_compress(true)
            .run()
            .await;

        assert!(result.is_completed());
        assert!(out.join("demo.exe").is_file());
        assert!(result.warnings().is_empty());
        assert!(!runner.ran("--best"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("env");
        let token = CancellationToken::new();
        token.cancel();

        let result = BuildOrchestrator::new(project(&tmp), StubRunner::default())
            .with_build_root(&env)
            .with_cancellation(token)
            .run()
            .await;

        assert_eq!(result.exit_code(), crate::error::EXIT_CANCELLED);
        assert!(result
            .stages()
            .iter()
            .all(|r| r.status == StageStatus::Pending));
        assert!(!env.exists());
    }

    /// Cancels the build when pip starts and never finishes
    struct InterruptingRunner {
        token: CancellationToken,
    }

    impl ToolRunner for InterruptingRunner {
        fn run(
            &self,
            invocation: &Invocation,
        ) -> impl Future<Output = Result<ToolOutput, ProcessError>> + Send {
            let hang = invocation.has_arg("pip");
            if hang {
                self.token.cancel();
            }
            async move {
                if hang {
                    std::future::pending::<()>().await;
                }
                Ok(ToolOutput::success(""))
            }
        }
    }

    #[tokio::test]
    async fn test_interrupt_during_install_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let env = tmp.path().join("env");
        let token = CancellationToken::new();
        let runner = InterruptingRunner {
            token: token.clone(),
        };

        let result = BuildOrchestrator::new(project(&tmp), runner)
            .with_build_root(&env)
            .with_cancellation(token)
            .run()
            .await;

        assert_eq!(result.exit_code(), crate::error::EXIT_CANCELLED);
        assert_eq!(result.status(BuildStage::EnvironmentSetup), StageStatus::Succeeded);
        assert_eq!(result.status(BuildStage::DependencyInstall), StageStatus::Failed);
        assert_eq!(result.status(BuildStage::Compile), StageStatus::Pending);
        assert_eq!(result.status(BuildStage::Cleanup), StageStatus::Succeeded);
        assert!(!env.exists());
    }
}
