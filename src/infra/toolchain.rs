//! Toolchain discovery
//!
//! Locates the host tools pynexe drives: the Python interpreter used to
//! create the build environment and the optional UPX compressor.

use std::path::{Path, PathBuf};

use crate::config::defaults::{COMPRESSION_TOOL, DEFAULT_PYTHON};

/// Host tools resolved for one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Interpreter used to create the virtual environment
    pub python: PathBuf,
    /// Compression tool, `None` when not installed
    pub upx: Option<PathBuf>,
}

impl Toolchain {
    /// Resolve tools from `PATH`.
    ///
    /// `python` overrides the interpreter name; a name that cannot be found on
    /// `PATH` is kept as-is so the spawn error surfaces at environment setup.
    pub fn discover(python: Option<&str>) -> Self {
        let requested = python.unwrap_or(DEFAULT_PYTHON);
        let python = resolve(requested).unwrap_or_else(|| PathBuf::from(requested));
        let upx = resolve(COMPRESSION_TOOL);

        tracing::debug!(
            "Toolchain: python={}, upx={}",
            python.display(),
            upx.as_deref()
                .map_or_else(|| "<not found>".to_string(), |p| p.display().to_string())
        );

        Self { python, upx }
    }

    /// Use explicit tool paths
    pub fn new(python: impl Into<PathBuf>, upx: Option<PathBuf>) -> Self {
        Self {
            python: python.into(),
            upx,
        }
    }
}

/// Find `program` on `PATH`, or accept it directly when it is a path to a file
pub fn resolve(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 && path.is_file() {
        return Some(path.to_path_buf());
    }
    which::which(program).ok()
}
