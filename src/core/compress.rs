//! Executable compression using UPX
//!
//! Compression is an optimization: every problem here degrades to an
//! [`OptimizeWarning`] and the uncompressed executable is kept.

use std::path::{Path, PathBuf};

use crate::config::defaults::OUTPUT_TAIL_LINES;
use crate::error::OptimizeWarning;
use crate::infra::process::{Invocation, ToolRunner};

/// PE (Windows) magic bytes
const PE_MAGIC: &[u8] = b"MZ";

/// ELF magic bytes
const ELF_MAGIC: &[u8] = &[0x7f, b'E', b'L', b'F'];

/// Compression statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CompressionStats {
    /// Size before compression in bytes
    pub original_size: u64,
    /// Size after compression in bytes
    pub compressed_size: u64,
}

impl CompressionStats {
    /// Calculate compression ratio as a percentage
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            (1.0 - (self.compressed_size as f64 / self.original_size as f64)) * 100.0
        }
    }

    /// Calculate bytes saved
    pub fn bytes_saved(&self) -> u64 {
        self.original_size.saturating_sub(self.compressed_size)
    }
}

/// Compression configuration
#[derive(Debug, Clone, Default)]
pub struct CompressionConfig {
    /// `compress` setting from the config file
    pub config_enabled: bool,
    /// CLI --no-compress flag
    pub cli_no_compress: bool,
    /// Resolved UPX binary, `None` when not installed
    pub tool: Option<PathBuf>,
}

impl CompressionConfig {
    /// Determine if compression is enabled; the CLI flag wins over the config
    pub fn is_enabled(&self) -> bool {
        !self.cli_no_compress && self.config_enabled
    }
}

/// Result of the optimize stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizeOutcome {
    /// Sizes when compression ran
    pub stats: Option<CompressionStats>,
    /// Why compression was skipped or failed
    pub warning: Option<OptimizeWarning>,
    /// Short human-readable summary
    pub note: String,
}

impl OptimizeOutcome {
    fn skipped(note: &str) -> Self {
        Self {
            note: note.to_string(),
            ..Self::default()
        }
    }

    fn warned(warning: OptimizeWarning) -> Self {
        Self {
            note: "Compression skipped".to_string(),
            warning: Some(warning),
            stats: None,
        }
    }
}

/// Check if a file starts with a PE or ELF header
pub fn is_executable_image(path: &Path) -> bool {
    use std::io::Read;

    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let mut header = [0u8; 4];
    match file.read(&mut header) {
        Ok(n) => header[..n].starts_with(PE_MAGIC) || header[..n].starts_with(ELF_MAGIC),
        Err(_) => false,
    }
}

/// The UPX command compressing `artifact` in place
pub fn upx_invocation(tool: &Path, artifact: &Path) -> Invocation {
    Invocation::new(tool)
        .args(["--best", "--quiet"])
        .arg(artifact.display().to_string())
}

/// Compress the finished executable in place
pub async fn compress_executable<R: ToolRunner>(
    runner: &R,
    artifact: &Path,
    config: &CompressionConfig,
) -> OptimizeOutcome {
    if !config.is_enabled() {
        tracing::info!("Compression disabled");
        return OptimizeOutcome::skipped("Compression disabled");
    }

    let Some(ref tool) = config.tool else {
        tracing::warn!("{}", OptimizeWarning::ToolUnavailable);
        return OptimizeOutcome::warned(OptimizeWarning::ToolUnavailable);
    };

    if !is_executable_image(artifact) {
        let warning = OptimizeWarning::UnsupportedFormat {
            path: artifact.to_path_buf(),
        };
        tracing::warn!("{warning}");
        return OptimizeOutcome::warned(warning);
    }

    let original_size = std::fs::metadata(artifact).map(|m| m.len()).unwrap_or(0);
    tracing::info!("Compressing {}", artifact.display());

    let output = match runner.run(&upx_invocation(tool, artifact)).await {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Failed to run UPX: {e}");
            return OptimizeOutcome::warned(OptimizeWarning::Launch(e));
        }
    };

    if !output.is_success() {
        let warning = OptimizeWarning::CompressionFailed {
            code: output.code,
            output: output.tail(OUTPUT_TAIL_LINES),
        };
        tracing::warn!("{warning}");
        return OptimizeOutcome::warned(warning);
    }

    let compressed_size = std::fs::metadata(artifact)
        .map(|m| m.len())
        .unwrap_or(original_size);
    let stats = CompressionStats {
        original_size,
        compressed_size,
    };
    tracing::debug!(
        "Compressed {}: {} -> {} ({:.1}% reduction)",
        artifact.display(),
        original_size,
        compressed_size,
        stats.ratio()
    );

    OptimizeOutcome {
        note: format!("Compressed ({:.1}% smaller)", stats.ratio()),
        stats: Some(stats),
        warning: None,
    }
}
