//! Error types for pynexe
//!
//! Domain-specific error types using thiserror. Each build stage has its own
//! error enum; [`BuildError`] wraps them and maps each category to a process
//! exit code.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for an unclassified failure
pub const EXIT_GENERIC: i32 = 1;
/// Exit code for configuration errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for environment setup/teardown errors
pub const EXIT_ENVIRONMENT: i32 = 3;
/// Exit code for dependency installation errors
pub const EXIT_DEPENDENCY: i32 = 4;
/// Exit code for compiler errors
pub const EXIT_COMPILE: i32 = 5;
/// Exit code when the build was interrupted
pub const EXIT_CANCELLED: i32 = 130;

/// A single problem found while validating a configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted field path, e.g. `windows_metadata.product_version`
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl ConfigIssue {
    /// Create a new issue for `field`
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("\n  - {issue}"))
        .collect()
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Config file could not be read
    #[error("Failed to read configuration '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Config file is not valid YAML
    #[error("Invalid YAML in '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// One or more fields failed validation
    #[error("Invalid configuration '{path}':{}", join_issues(.issues))]
    Invalid {
        path: PathBuf,
        issues: Vec<ConfigIssue>,
    },

    /// Config declares a schema newer than this binary understands
    #[error("Unsupported schema_version {found} (this build supports up to {supported})")]
    UnsupportedSchema { found: u64, supported: u64 },
}

impl ConfigError {
    /// Issues carried by an [`ConfigError::Invalid`] error
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            Self::Invalid { issues, .. } => issues,
            _ => &[],
        }
    }

    /// Whether any issue concerns `field`
    pub fn mentions(&self, field: &str) -> bool {
        self.issues().iter().any(|issue| issue.field == field)
    }
}

/// Failures launching an external tool
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    /// The program could not be spawned
    #[error("Failed to launch '{program}': {error}")]
    Spawn { program: String, error: String },
}

/// Isolated build environment errors
#[derive(Error, Debug)]
pub enum EnvironmentError {
    /// Target directory exists and is not empty
    #[error("Build directory already exists and is not empty: {path}")]
    NotEmpty { path: PathBuf },

    /// Failed to create directory
    #[error("Failed to create build directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove build directory '{path}': {error}")]
    Destroy { path: PathBuf, error: String },

    /// Interpreter could not be launched
    #[error("Python interpreter unavailable: {0}")]
    Interpreter(#[from] ProcessError),

    /// `python -m venv` returned non-zero
    #[error("Failed to create virtual environment at '{path}' (exit code {code:?})\n{output}")]
    VenvFailed {
        path: PathBuf,
        code: Option<i32>,
        output: String,
    },
}

/// Dependency installation errors
#[derive(Error, Debug)]
pub enum DependencyError {
    /// pip returned non-zero
    #[error("Failed to install {} (exit code {code:?})\n{output}", .specs.join(", "))]
    InstallFailed {
        specs: Vec<String>,
        code: Option<i32>,
        output: String,
    },

    /// pip could not be launched
    #[error("Package installer unavailable: {0}")]
    Launch(#[from] ProcessError),
}

/// Compiler errors
#[derive(Error, Debug)]
pub enum CompileError {
    /// Compiler returned non-zero
    #[error("Compiler failed (exit code {code:?})\n{output}")]
    Failed { code: Option<i32>, output: String },

    /// Compiler succeeded but no executable was produced
    #[error("Output file not created: {path}")]
    MissingArtifact { path: PathBuf },

    /// Compiler could not be launched
    #[error("Compiler unavailable: {0}")]
    Launch(#[from] ProcessError),

    /// Moving the finished artifact into place failed
    #[error("Failed to move '{from}' to '{to}': {error}")]
    Promote {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}

/// Non-fatal optimize stage outcomes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeWarning {
    /// UPX was not found
    #[error("UPX not found, skipping compression. Install UPX to enable executable compression.")]
    ToolUnavailable,

    /// UPX ran and failed; the uncompressed executable is kept
    #[error("Compression failed (exit code {code:?}), keeping uncompressed executable\n{output}")]
    CompressionFailed { code: Option<i32>, output: String },

    /// The artifact is not a PE or ELF executable
    #[error("Compression skipped: '{path}' is not a recognized executable")]
    UnsupportedFormat { path: PathBuf },

    /// UPX could not be launched
    #[error("Compression skipped: {0}")]
    Launch(ProcessError),
}

/// Top-level build error
#[derive(Error, Debug)]
pub enum BuildError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Environment error
    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    /// Dependency error
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// Compile error
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// User interrupted the build
    #[error("Build interrupted by user")]
    Cancelled,
}

impl BuildError {
    /// Process exit code communicating the error category
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Environment(_) => EXIT_ENVIRONMENT,
            Self::Dependency(_) => EXIT_DEPENDENCY,
            Self::Compile(_) => EXIT_COMPILE,
            Self::Cancelled => EXIT_CANCELLED,
        }
    }

    /// Short category name used in reports
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Environment(_) => "environment",
            Self::Dependency(_) => "dependency",
            Self::Compile(_) => "compile",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            BuildError::Config(ConfigError::NotFound {
                path: PathBuf::from("config.yaml"),
            }),
            BuildError::Environment(EnvironmentError::NotEmpty {
                path: PathBuf::from("/tmp/x"),
            }),
            BuildError::Dependency(DependencyError::InstallFailed {
                specs: vec!["nuitka".to_string()],
                code: Some(1),
                output: String::new(),
            }),
            BuildError::Compile(CompileError::MissingArtifact {
                path: PathBuf::from("demo.exe"),
            }),
            BuildError::Cancelled,
        ];

        let mut codes: Vec<i32> = errors.iter().map(BuildError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_invalid_config_lists_every_issue() {
        let err = ConfigError::Invalid {
            path: PathBuf::from("config.yaml"),
            issues: vec![
                ConfigIssue::new("main_file", "Missing required field"),
                ConfigIssue::new("project_libs[1]", "expected a string"),
            ],
        };

        let message = err.to_string();
        assert!(message.contains("main_file: Missing required field"));
        assert!(message.contains("project_libs[1]: expected a string"));
        assert!(err.mentions("main_file"));
        assert!(!err.mentions("output_name"));
    }

    #[test]
    fn test_dependency_error_names_specs() {
        let err = DependencyError::InstallFailed {
            specs: vec!["requests".to_string(), "rich>=13".to_string()],
            code: Some(1),
            output: "No matching distribution".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("requests, rich>=13"));
        assert!(message.contains("No matching distribution"));
    }
}
