//! Default configuration values

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Newest config schema this build understands
pub const SCHEMA_VERSION: u64 = 1;

/// Build tools installed into the environment before project libraries
pub const DEFAULT_BUILD_LIBS: &[&str] = &["nuitka", "ordered-set"];

/// Nuitka plugins enabled when the config does not list any
pub const DEFAULT_COMPILER_PLUGINS: &[&str] = &["no-qt", "tk-inter"];

/// Extra compiler arguments used when the config does not list any
pub const DEFAULT_EXTRA_ARGS: &[&str] = &["--lto=no"];

/// Leftovers the compiler may drop next to the main file.
/// `{project}` is replaced with the project name.
pub const DEFAULT_CLEANUP_ITEMS: &[&str] = &[
    "{project}.build",
    "{project}.dist",
    "{project}.onefile-build",
    "__pycache__",
];

/// Python interpreter used to create the virtual environment
#[cfg(windows)]
pub const DEFAULT_PYTHON: &str = "python";

/// Python interpreter used to create the virtual environment
#[cfg(not(windows))]
pub const DEFAULT_PYTHON: &str = "python3";

/// Name of the compression tool looked up on PATH
pub const COMPRESSION_TOOL: &str = "upx";

/// Prefix for build-specific environment directories
pub const BUILD_DIR_PREFIX: &str = "pynexe";

/// Number of trailing output lines shown when an external tool fails
pub const OUTPUT_TAIL_LINES: usize = 20;

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
