//! Dependency installation
//!
//! Installs the build tools and then the project's libraries into the build
//! environment with pip. Each group is a single batched pip invocation, so pip
//! resolves the group as a whole.

use std::time::{Duration, Instant};

use crate::config::defaults::OUTPUT_TAIL_LINES;
use crate::core::build_env::EnvironmentHandle;
use crate::error::DependencyError;
use crate::infra::process::{Invocation, ToolRunner};

/// One pip invocation that succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStep {
    /// Specifiers installed by this step
    pub specs: Vec<String>,
    /// Wall-clock time pip took
    pub duration: Duration,
}

/// Summary of a successful installation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Steps in the order they ran
    pub steps: Vec<InstallStep>,
}

impl InstallReport {
    /// Total number of specifiers installed
    pub fn installed_count(&self) -> usize {
        self.steps.iter().map(|step| step.specs.len()).sum()
    }
}

/// Installs packages into an environment
#[derive(Debug)]
pub struct DependencyInstaller<'a, R> {
    runner: &'a R,
}

impl<'a, R: ToolRunner> DependencyInstaller<'a, R> {
    /// Create an installer using `runner`
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Install the build tools, then the project libraries.
    ///
    /// Stops at the first failing step; the project libraries are never
    /// attempted when the build tools fail.
    pub async fn install(
        &self,
        handle: &EnvironmentHandle,
        build_tool_spec: &[String],
        project_libs: &[String],
    ) -> Result<InstallReport, DependencyError> {
        let mut report = InstallReport::default();

        for group in [build_tool_spec, project_libs] {
            if group.is_empty() {
                continue;
            }
            report.steps.push(self.install_group(handle, group).await?);
        }

        if project_libs.is_empty() {
            tracing::info!("No project libraries specified");
        }
        Ok(report)
    }

    async fn install_group(
        &self,
        handle: &EnvironmentHandle,
        specs: &[String],
    ) -> Result<InstallStep, DependencyError> {
        tracing::info!("Installing {}", specs.join(", "));
        let started = Instant::now();

        let output = self.runner.run(&pip_install(handle, specs)).await?;
        if !output.is_success() {
            return Err(DependencyError::InstallFailed {
                specs: specs.to_vec(),
                code: output.code,
                output: output.tail(OUTPUT_TAIL_LINES),
            });
        }

        Ok(InstallStep {
            specs: specs.to_vec(),
            duration: started.elapsed(),
        })
    }
}

/// The pip command installing `specs` into the environment
pub fn pip_install(handle: &EnvironmentHandle, specs: &[String]) -> Invocation {
    handle
        .python_command()
        .args(["-m", "pip", "install", "--disable-pip-version-check", "--no-input"])
        .args(specs.iter().cloned())
}
