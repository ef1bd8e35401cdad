//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use pynexe::error::ProcessError;
use pynexe::infra::process::{Invocation, ToolOutput, ToolRunner};
use tempfile::TempDir;

/// Smallest config that builds: required fields only
pub const MINIMAL_CONFIG: &str = r#"
project_name: "demo"
main_file: "main.py"
output_name: "demo.exe"
"#;

/// Test project context
///
/// Creates a temporary directory for test projects and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// A project with `main.py` and the minimal config
    pub fn demo() -> Self {
        let project = Self::new();
        project.create_file("main.py", "print(1)\n");
        project.create_file("config.yaml", MINIMAL_CONFIG);
        project
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Path of the config file
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yaml")
    }

    /// Build environment location inside the test directory
    pub fn env_root(&self) -> PathBuf {
        self.dir.path().join(".pynexe-env")
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a directory in the test project
    pub fn create_dir(&self, name: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path).expect("Failed to create directory");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Names of entries in the project directory
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .expect("Failed to list project")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the pynexe binary in `dir`
pub fn run_pynexe(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_pynexe"))
        .current_dir(dir)
        .args(args)
        .env_remove("PYNEXE_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute pynexe")
}

/// Tool runner standing in for python, pip, Nuitka and UPX.
///
/// Every call succeeds unless one of its arguments matches a configured
/// failure. Compiler calls write a fake executable to
/// `--output-dir/--output-filename` and leave a `<name>.build` directory in
/// the working directory, like Nuitka does. UPX calls halve the file.
#[derive(Default)]
pub struct ScriptedRunner {
    failures: Vec<(String, i32)>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    /// Runner where every tool succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any invocation having `arg` among its arguments
    pub fn fail_on(mut self, arg: &str, code: i32) -> Self {
        self.failures.push((arg.to_string(), code));
        self
    }

    /// Every invocation so far
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations with `arg` among their arguments
    pub fn count_with(&self, arg: &str) -> usize {
        self.calls().iter().filter(|inv| inv.has_arg(arg)).count()
    }

    fn respond(&self, invocation: &Invocation) -> ToolOutput {
        if let Some((arg, code)) = self
            .failures
            .iter()
            .find(|(arg, _)| invocation.has_arg(arg))
        {
            return ToolOutput::failure(*code, format!("ERROR: {arg} failed\nexit {code}"));
        }

        if let (Some(dir), Some(name)) = (
            invocation.flag_value("--output-dir"),
            invocation.flag_value("--output-filename"),
        ) {
            let mut image = b"MZ".to_vec();
            image.resize(4096, 0x90);
            std::fs::write(Path::new(dir).join(name), image).unwrap();

            if let Some(cwd) = invocation.cwd.as_deref() {
                let stem = Path::new(name).file_stem().unwrap().to_string_lossy();
                std::fs::create_dir_all(cwd.join(format!("{stem}.build"))).unwrap();
            }
        }

        if invocation.program.file_stem().is_some_and(|s| s == "upx") {
            let target = invocation.args.last().unwrap();
            let data = std::fs::read(target).unwrap();
            std::fs::write(target, &data[..data.len() / 2]).unwrap();
        }

        ToolOutput::success("ok")
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<ToolOutput, ProcessError>> + Send {
        self.calls.lock().unwrap().push(invocation.clone());
        let output = self.respond(invocation);
        async move { Ok(output) }
    }
}
