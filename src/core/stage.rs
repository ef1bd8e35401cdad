//! Build stages and results
//!
//! A build runs five stages in a fixed order. Each stage starts `Pending`
//! and moves forward only: `Pending -> Running -> Succeeded | Failed`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::compress::CompressionStats;
use crate::error::{BuildError, OptimizeWarning};

/// One step of the build pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    /// Create the isolated environment
    EnvironmentSetup,
    /// Install build tools and project libraries
    DependencyInstall,
    /// Run the compiler and promote the executable
    Compile,
    /// Compress the executable
    Optimize,
    /// Remove temporary files
    Cleanup,
}

impl BuildStage {
    /// All stages in execution order
    pub const ALL: [BuildStage; 5] = [
        Self::EnvironmentSetup,
        Self::DependencyInstall,
        Self::Compile,
        Self::Optimize,
        Self::Cleanup,
    ];

    /// Position in the pipeline
    pub fn index(self) -> usize {
        match self {
            Self::EnvironmentSetup => 0,
            Self::DependencyInstall => 1,
            Self::Compile => 2,
            Self::Optimize => 3,
            Self::Cleanup => 4,
        }
    }

    /// Progress message shown while the stage runs
    pub fn description(self) -> &'static str {
        match self {
            Self::EnvironmentSetup => "Creating environment...",
            Self::DependencyInstall => "Installing dependencies...",
            Self::Compile => "Compiling with Nuitka...",
            Self::Optimize => "Compressing executable...",
            Self::Cleanup => "Cleaning up...",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnvironmentSetup => write!(f, "Environment setup"),
            Self::DependencyInstall => write!(f, "Dependency install"),
            Self::Compile => write!(f, "Compile"),
            Self::Optimize => write!(f, "Optimize"),
            Self::Cleanup => write!(f, "Cleanup"),
        }
    }
}

/// Status of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not started
    Pending,
    /// In progress
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
}

impl StageStatus {
    /// Whether the stage has finished
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Status and note for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Which stage
    pub stage: BuildStage,
    /// Where it ended up
    pub status: StageStatus,
    /// Short summary, empty when there is nothing to say
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
}

/// Tracks stage transitions during one build
#[derive(Debug, Clone)]
pub struct StageTracker {
    reports: Vec<StageReport>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    /// All stages `Pending`
    pub fn new() -> Self {
        Self {
            reports: BuildStage::ALL
                .iter()
                .map(|&stage| StageReport {
                    stage,
                    status: StageStatus::Pending,
                    note: String::new(),
                })
                .collect(),
        }
    }

    /// Current report for `stage`
    pub fn report(&self, stage: BuildStage) -> &StageReport {
        &self.reports[stage.index()]
    }

    /// Current status of `stage`
    pub fn status(&self, stage: BuildStage) -> StageStatus {
        self.report(stage).status
    }

    /// Move `stage` from `Pending` to `Running`
    pub fn start(&mut self, stage: BuildStage) {
        self.transition(stage, StageStatus::Pending, StageStatus::Running, String::new());
    }

    /// Move `stage` from `Running` to `Succeeded`
    pub fn succeed(&mut self, stage: BuildStage, note: impl Into<String>) {
        self.transition(stage, StageStatus::Running, StageStatus::Succeeded, note.into());
    }

    /// Move `stage` from `Running` to `Failed`
    pub fn fail(&mut self, stage: BuildStage, note: impl Into<String>) {
        self.transition(stage, StageStatus::Running, StageStatus::Failed, note.into());
    }

    fn transition(&mut self, stage: BuildStage, from: StageStatus, to: StageStatus, note: String) {
        let report = &mut self.reports[stage.index()];
        debug_assert_eq!(
            report.status, from,
            "{stage} cannot move from {:?} to {to:?}",
            report.status
        );
        tracing::debug!("{stage}: {:?} -> {to:?}", report.status);
        report.status = to;
        report.note = note;
    }

    /// Snapshot of every stage
    pub fn reports(&self) -> &[StageReport] {
        &self.reports
    }

    fn into_reports(self) -> Vec<StageReport> {
        self.reports
    }
}

/// Terminal state of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Every stage succeeded
    Completed,
    /// A stage failed; cleanup was attempted
    Aborted,
}

/// The error that aborted a build and where it happened
#[derive(Debug)]
pub struct StageFailure {
    /// Failing stage, `None` when the build was rejected before any stage ran
    pub stage: Option<BuildStage>,
    /// What went wrong
    pub error: BuildError,
}

/// Summary of one build, immutable once returned
#[derive(Debug)]
pub struct BuildResult {
    stages: Vec<StageReport>,
    outcome: BuildOutcome,
    artifact: Option<PathBuf>,
    checksum: Option<String>,
    compression: Option<CompressionStats>,
    warnings: Vec<OptimizeWarning>,
    failure: Option<StageFailure>,
    cleanup_errors: Vec<String>,
    message: String,
}

/// Accumulates the pieces of a [`BuildResult`] while stages run
#[derive(Debug, Default)]
pub struct BuildResultBuilder {
    pub(crate) artifact: Option<PathBuf>,
    pub(crate) checksum: Option<String>,
    pub(crate) compression: Option<CompressionStats>,
    pub(crate) warnings: Vec<OptimizeWarning>,
    pub(crate) failure: Option<StageFailure>,
    pub(crate) cleanup_errors: Vec<String>,
}

impl BuildResultBuilder {
    /// Freeze the collected state into a result
    pub fn finish(self, tracker: StageTracker) -> BuildResult {
        let completed = self.failure.is_none()
            && tracker
                .reports()
                .iter()
                .all(|r| r.status == StageStatus::Succeeded);
        let outcome = if completed {
            BuildOutcome::Completed
        } else {
            BuildOutcome::Aborted
        };

        let message = match (&self.failure, &self.artifact) {
            (Some(failure), _) => match failure.stage {
                Some(stage) => format!("Build failed during {stage}: {}", failure.error),
                None => format!("Build failed: {}", failure.error),
            },
            (None, Some(artifact)) if completed => {
                format!("Build completed successfully: {}", artifact.display())
            }
            (None, _) => "Build aborted during cleanup".to_string(),
        };

        BuildResult {
            stages: tracker.into_reports(),
            outcome,
            artifact: self.artifact,
            checksum: self.checksum,
            compression: self.compression,
            warnings: self.warnings,
            failure: self.failure,
            cleanup_errors: self.cleanup_errors,
            message,
        }
    }
}

impl BuildResult {
    /// Terminal state
    pub fn outcome(&self) -> BuildOutcome {
        self.outcome
    }

    /// Whether the build completed
    pub fn is_completed(&self) -> bool {
        self.outcome == BuildOutcome::Completed
    }

    /// Every stage's final report, in pipeline order
    pub fn stages(&self) -> &[StageReport] {
        &self.stages
    }

    /// Final status of `stage`
    pub fn status(&self, stage: BuildStage) -> StageStatus {
        self.stages[stage.index()].status
    }

    /// Location of the produced executable
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// SHA-256 of the produced executable
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Compression sizes, when compression ran
    pub fn compression(&self) -> Option<&CompressionStats> {
        self.compression.as_ref()
    }

    /// Non-fatal optimize warnings
    pub fn warnings(&self) -> &[OptimizeWarning] {
        &self.warnings
    }

    /// The error that aborted the build
    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    /// Problems hit while cleaning up
    pub fn cleanup_errors(&self) -> &[String] {
        &self.cleanup_errors
    }

    /// Human-readable summary
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Process exit code for this result
    pub fn exit_code(&self) -> i32 {
        match (&self.failure, self.outcome) {
            (Some(failure), _) => failure.error.exit_code(),
            (None, BuildOutcome::Completed) => 0,
            (None, BuildOutcome::Aborted) => crate::error::EXIT_ENVIRONMENT,
        }
    }

    /// Machine-readable summary
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "outcome": self.outcome,
            "message": self.message,
            "exit_code": self.exit_code(),
            "stages": self.stages,
            "artifact": self.artifact,
            "sha256": self.checksum,
            "compression": self.compression,
            "warnings": self.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "failure": self.failure.as_ref().map(|f| serde_json::json!({
                "stage": f.stage,
                "category": f.error.category(),
                "error": f.error.to_string(),
            })),
            "cleanup_errors": self.cleanup_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompileError, ConfigError};

    #[test]
    fn test_tracker_starts_all_pending() {
        let tracker = StageTracker::new();
        assert_eq!(tracker.reports().len(), 5);
        assert!(tracker
            .reports()
            .iter()
            .all(|r| r.status == StageStatus::Pending));
    }

    #[test]
    fn test_stage_order_matches_index() {
        for (i, stage) in BuildStage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_completed_result() {
        let mut tracker = StageTracker::new();
        for stage in BuildStage::ALL {
            tracker.start(stage);
            tracker.succeed(stage, "");
        }
        let result = BuildResultBuilder {
            artifact: Some(PathBuf::from("/out/demo.exe")),
            ..Default::default()
        }
        .finish(tracker);

        assert!(result.is_completed());
        assert_eq!(result.exit_code(), 0);
        assert!(result.message().contains("demo.exe"));
    }

    #[test]
    fn test_failed_result_reports_stage_and_code() {
        let mut tracker = StageTracker::new();
        tracker.start(BuildStage::EnvironmentSetup);
        tracker.succeed(BuildStage::EnvironmentSetup, "");
        tracker.start(BuildStage::DependencyInstall);
        tracker.succeed(BuildStage::DependencyInstall, "");
        tracker.start(BuildStage::Compile);
        tracker.fail(BuildStage::Compile, "Compiler failed");
        tracker.start(BuildStage::Cleanup);
        tracker.succeed(BuildStage::Cleanup, "");

        let result = BuildResultBuilder {
            failure: Some(StageFailure {
                stage: Some(BuildStage::Compile),
                error: BuildError::Compile(CompileError::Failed {
                    code: Some(1),
                    output: "SyntaxError".to_string(),
                }),
            }),
            ..Default::default()
        }
        .finish(tracker);

        assert_eq!(result.outcome(), BuildOutcome::Aborted);
        assert_eq!(result.status(BuildStage::Optimize), StageStatus::Pending);
        assert_eq!(result.exit_code(), crate::error::EXIT_COMPILE);
        assert!(result.message().starts_with("Build failed during Compile"));

        let json = result.to_json();
        assert_eq!(json["outcome"], "aborted");
        assert_eq!(json["failure"]["stage"], "compile");
        assert_eq!(json["failure"]["category"], "compile");
        assert_eq!(json["stages"][2]["status"], "failed");
    }

    #[test]
    fn test_rejected_before_any_stage() {
        let result = BuildResultBuilder {
            failure: Some(StageFailure {
                stage: None,
                error: BuildError::Config(ConfigError::NotFound {
                    path: PathBuf::from("config.yaml"),
                }),
            }),
            ..Default::default()
        }
        .finish(StageTracker::new());

        assert_eq!(result.outcome(), BuildOutcome::Aborted);
        assert!(result
            .stages()
            .iter()
            .all(|r| r.status == StageStatus::Pending));
        assert_eq!(result.exit_code(), crate::error::EXIT_CONFIG);
    }
}
