//! Isolated build environment
//!
//! Each build gets a fresh directory holding a Python virtual environment and
//! a staging directory the compiler writes into. The [`EnvironmentHandle`] is
//! the context passed to every stage; nothing relies on the process working
//! directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::defaults::{BUILD_DIR_PREFIX, OUTPUT_TAIL_LINES};
use crate::error::EnvironmentError;
use crate::infra::filesystem;
use crate::infra::process::{Invocation, ToolRunner};

/// Name of the virtual environment directory inside the build directory
const VENV_DIR: &str = "venv";

/// Name of the compiler staging directory inside the build directory
const STAGING_DIR: &str = "dist";

/// A created build environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHandle {
    /// Root of the build directory
    root: PathBuf,
    /// Virtual environment directory
    venv: PathBuf,
    /// Interpreter inside the virtual environment
    python: PathBuf,
    /// Where the compiler places its output before promotion
    staging: PathBuf,
    /// Working directory for tools that read project files
    project_dir: PathBuf,
}

impl EnvironmentHandle {
    fn new(root: PathBuf, project_dir: PathBuf) -> Self {
        let venv = root.join(VENV_DIR);
        let python = venv_python(&venv);
        let staging = root.join(STAGING_DIR);
        Self {
            root,
            venv,
            python,
            staging,
            project_dir,
        }
    }

    /// Root of the build directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Virtual environment directory
    pub fn venv(&self) -> &Path {
        &self.venv
    }

    /// Interpreter inside the virtual environment
    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Compiler staging directory
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Project directory tools run in
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Environment variables every tool in this environment receives
    pub fn env_map(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("VIRTUAL_ENV".to_string(), self.venv.display().to_string());
        env.insert("PIP_DISABLE_PIP_VERSION_CHECK".to_string(), "1".to_string());
        env.insert("PIP_NO_INPUT".to_string(), "1".to_string());
        env.insert("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string());
        env
    }

    /// Invocation of the venv interpreter, pre-filled with cwd and environment
    pub fn python_command(&self) -> Invocation {
        self.env_map().into_iter().fold(
            Invocation::new(&self.python).current_dir(&self.project_dir),
            |inv, (key, value)| inv.env(key, value),
        )
    }
}

/// Path of the interpreter inside a virtual environment
pub fn venv_python(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

/// Default build-specific directory for a project
pub fn default_build_root(project_name: &str) -> PathBuf {
    let slug: String = project_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    std::env::temp_dir().join(format!(
        "{BUILD_DIR_PREFIX}-{slug}-{}",
        std::process::id()
    ))
}

/// Creates and tears down isolated build environments
#[derive(Debug, Clone)]
pub struct EnvironmentManager {
    /// Directory the environment lives in
    root: PathBuf,
    /// Host interpreter used to create the venv
    interpreter: PathBuf,
    /// Project directory handed to the handle
    project_dir: PathBuf,
}

impl EnvironmentManager {
    /// Create a manager for an environment at `root`
    pub fn new(
        root: impl Into<PathBuf>,
        interpreter: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            interpreter: interpreter.into(),
            project_dir: project_dir.into(),
        }
    }

    /// Directory the environment will be created in
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh directory and create a virtual environment in it.
    ///
    /// Fails without touching anything when the directory already exists and
    /// is non-empty. A partially created directory is removed on failure.
    pub async fn create<R: ToolRunner>(
        &self,
        runner: &R,
    ) -> Result<EnvironmentHandle, EnvironmentError> {
        let non_empty =
            filesystem::is_non_empty_dir(&self.root).map_err(|e| EnvironmentError::CreateDir {
                path: self.root.clone(),
                error: e.to_string(),
            })?;
        if non_empty {
            return Err(EnvironmentError::NotEmpty {
                path: self.root.clone(),
            });
        }

        let handle = EnvironmentHandle::new(self.root.clone(), self.project_dir.clone());
        filesystem::create_dir_all(handle.staging_dir()).map_err(|e| {
            EnvironmentError::CreateDir {
                path: self.root.clone(),
                error: e.to_string(),
            }
        })?;
        tracing::info!("Created build directory {}", self.root.display());

        if let Err(e) = self.create_venv(runner, &handle).await {
            self.discard();
            return Err(e);
        }

        Ok(handle)
    }

    async fn create_venv<R: ToolRunner>(
        &self,
        runner: &R,
        handle: &EnvironmentHandle,
    ) -> Result<(), EnvironmentError> {
        let invocation = Invocation::new(&self.interpreter)
            .args(["-m", "venv"])
            .arg(handle.venv().display().to_string())
            .current_dir(&self.root);

        tracing::info!("Creating virtual environment at {}", handle.venv().display());
        let output = runner.run(&invocation).await?;

        if !output.is_success() {
            return Err(EnvironmentError::VenvFailed {
                path: handle.venv().to_path_buf(),
                code: output.code,
                output: output.tail(OUTPUT_TAIL_LINES),
            });
        }
        Ok(())
    }

    /// Recursively remove the environment
    pub fn destroy(&self, handle: EnvironmentHandle) -> Result<(), EnvironmentError> {
        filesystem::remove_dir_all(handle.root()).map_err(|e| EnvironmentError::Destroy {
            path: handle.root().to_path_buf(),
            error: e.to_string(),
        })?;
        tracing::info!("Removed build directory {}", handle.root().display());
        Ok(())
    }

    /// Best-effort removal of a partially created environment
    pub fn discard(&self) {
        if let Err(e) = filesystem::remove_dir_all(&self.root) {
            tracing::warn!(
                "Failed to remove partial build directory {}: {}",
                self.root.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::infra::process::ToolOutput;
    use std::future::Future;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Runner returning a fixed result and remembering what it ran
    struct FixedRunner {
        output: Result<ToolOutput, ProcessError>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl FixedRunner {
        fn new(output: Result<ToolOutput, ProcessError>) -> Self {
            Self {
                output,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ToolRunner for FixedRunner {
        fn run(
            &self,
            invocation: &Invocation,
        ) -> impl Future<Output = Result<ToolOutput, ProcessError>> + Send {
            self.calls.lock().unwrap().push(invocation.clone());
            let output = self.output.clone();
            async move { output }
        }
    }

    #[tokio::test]
    async fn test_create_makes_fresh_environment() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("env");
        let manager = EnvironmentManager::new(&root, "python3", tmp.path());
        let runner = FixedRunner::new(Ok(ToolOutput::success("")));

        let handle = manager.create(&runner).await.unwrap();

        assert!(handle.staging_dir().is_dir());
        assert_eq!(handle.root(), root);
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("python3"));
        assert_eq!(calls[0].args[..2], ["-m".to_string(), "venv".to_string()]);
    }

    #[tokio::test]
    async fn test_create_refuses_non_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("env");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("keep.txt"), "data").unwrap();
        let manager = EnvironmentManager::new(&root, "python3", tmp.path());
        let runner = FixedRunner::new(Ok(ToolOutput::success("")));

        let err = manager.create(&runner).await.unwrap_err();

        assert!(matches!(err, EnvironmentError::NotEmpty { .. }));
        assert!(root.join("keep.txt").exists());
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_accepts_existing_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let manager = EnvironmentManager::new(tmp.path().join("env"), "python3", tmp.path());
        std::fs::create_dir_all(manager.root()).unwrap();
        let runner = FixedRunner::new(Ok(ToolOutput::success("")));

        assert!(manager.create(&runner).await.is_ok());
    }

    #[tokio::test]
    async fn test_venv_failure_removes_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("env");
        let manager = EnvironmentManager::new(&root, "python3", tmp.path());
        let runner = FixedRunner::new(Ok(ToolOutput::failure(1, "No module named venv")));

        let err = manager.create(&runner).await.unwrap_err();

        match err {
            EnvironmentError::VenvFailed { code, output, .. } => {
                assert_eq!(code, Some(1));
                assert!(output.contains("No module named venv"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_environment_error() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("env");
        let manager = EnvironmentManager::new(&root, "python-missing", tmp.path());
        let runner = FixedRunner::new(Err(ProcessError::Spawn {
            program: "python-missing".to_string(),
            error: "not found".to_string(),
        }));

        let err = manager.create(&runner).await.unwrap_err();

        assert!(matches!(err, EnvironmentError::Interpreter(_)));
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_destroy_removes_everything() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("env");
        let manager = EnvironmentManager::new(&root, "python3", tmp.path());
        let runner = FixedRunner::new(Ok(ToolOutput::success("")));
        let handle = manager.create(&runner).await.unwrap();
        std::fs::write(handle.staging_dir().join("demo.exe"), "bin").unwrap();

        manager.destroy(handle).unwrap();

        assert!(!root.exists());
    }

    #[test]
    fn test_python_command_carries_context() {
        let handle = EnvironmentHandle::new(PathBuf::from("/b"), PathBuf::from("/project"));
        let inv = handle.python_command().args(["-m", "pip"]);

        assert_eq!(inv.program, venv_python(Path::new("/b/venv")));
        assert_eq!(inv.cwd, Some(PathBuf::from("/project")));
        assert!(inv
            .env
            .iter()
            .any(|(k, v)| k == "VIRTUAL_ENV" && Path::new(v) == Path::new("/b/venv")));
    }

    #[test]
    fn test_default_build_root_is_build_specific() {
        let root = default_build_root("my app/v2");
        let name = root.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pynexe-my_app_v2-"));
        assert!(name.ends_with(&std::process::id().to_string()));
    }
}
