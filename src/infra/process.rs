//! External process execution
//!
//! Every external tool (Python, pip, Nuitka, UPX) is launched through the
//! [`ToolRunner`] capability so build stages can be exercised with test
//! doubles instead of real toolchains.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use crate::error::ProcessError;

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run
    pub program: PathBuf,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Working directory (inherits the caller's when `None`)
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Create an invocation of `program` with no arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Value of a `--name=value` style argument, if present
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.args
            .iter()
            .find_map(|arg| arg.strip_prefix(prefix.as_str()))
    }

    /// Whether the arguments contain `arg` exactly
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ToolOutput {
    /// A successful run with the given stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the tool exited with status 0
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last `lines` lines of stdout followed by stderr
    pub fn tail(&self, lines: usize) -> String {
        let combined: Vec<&str> = self
            .stdout
            .lines()
            .chain(self.stderr.lines())
            .filter(|line| !line.trim().is_empty())
            .collect();
        let start = combined.len().saturating_sub(lines);
        combined[start..].join("\n")
    }
}

impl From<std::process::Output> for ToolOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Capability to run external tools
///
/// Implementations block (asynchronously) until the tool exits. Dropping the
/// returned future must stop the tool.
pub trait ToolRunner: Send + Sync {
    /// Run `invocation` to completion and capture its output
    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<ToolOutput, ProcessError>> + Send;
}

impl<R: ToolRunner> ToolRunner for &R {
    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<ToolOutput, ProcessError>> + Send {
        (**self).run(invocation)
    }
}

/// Runs tools as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Create a new system runner
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref cwd) = invocation.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl ToolRunner for SystemRunner {
    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<ToolOutput, ProcessError>> + Send {
        let mut cmd = Self::command(invocation);
        let program = program_name(&invocation.program);
        let command_line = invocation.to_string();

        async move {
            tracing::debug!("Running: {command_line}");
            let started = Instant::now();

            let output = cmd.output().await.map_err(|e| ProcessError::Spawn {
                program: program.clone(),
                error: e.to_string(),
            })?;
            let output = ToolOutput::from(output);

            tracing::debug!(
                "{program} exited with {:?} after {:.1}s",
                output.code,
                started.elapsed().as_secs_f64()
            );
            Ok(output)
        }
    }
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map_or_else(|| program.display().to_string(), |name| {
            name.to_string_lossy().into_owned()
        })
}
