//! Compiler invocation
//!
//! Maps a [`BuildConfig`] onto the Nuitka command line. This is a pure data
//! mapping; running the command and checking its result is the
//! orchestrator's job.

use std::path::PathBuf;

use crate::core::build_env::EnvironmentHandle;
use crate::core::config::BuildConfig;
use crate::infra::process::Invocation;

/// Flags passed on every build
const BASE_FLAGS: &[&str] = &[
    "--standalone",
    "--onefile",
    "--assume-yes-for-downloads",
    "--remove-output",
    "--no-pyi-file",
];

/// Nuitka option name for each `windows_metadata` key
fn metadata_flag(key: &str) -> Option<&'static str> {
    match key {
        "product_name" => Some("--product-name"),
        "file_description" => Some("--file-description"),
        "product_version" => Some("--product-version"),
        "file_version" => Some("--file-version"),
        "copyright" => Some("--copyright"),
        "company_name" => Some("--company-name"),
        _ => None,
    }
}

/// Where the compiler will write the executable
pub fn staged_artifact(config: &BuildConfig, handle: &EnvironmentHandle) -> PathBuf {
    handle.staging_dir().join(&config.output_name)
}

/// Build the compiler command for `config` inside `handle`
pub fn compiler_invocation(config: &BuildConfig, handle: &EnvironmentHandle) -> Invocation {
    let mut inv = handle
        .python_command()
        .args(["-m", "nuitka"])
        .args(BASE_FLAGS.iter().copied())
        .arg(format!("--output-dir={}", handle.staging_dir().display()))
        .arg(format!("--output-filename={}", config.output_name))
        .arg(format!("--jobs={}", config.jobs()));

    for (key, value) in config.windows_metadata.entries() {
        match metadata_flag(key) {
            Some(flag) => inv = inv.arg(format!("{flag}={value}")),
            None => tracing::warn!("No compiler option for metadata key '{key}'"),
        }
    }

    if let Some(icon) = config.icon_path() {
        inv = inv.arg(format!("--windows-icon-from-ico={}", icon.display()));
    }

    for package in &config.include_packages {
        inv = inv.arg(format!("--include-package={package}"));
    }

    for data_dir in config.data_dirs() {
        inv = inv.arg(format!(
            "--include-data-dir={}={}",
            data_dir.source.display(),
            data_dir.dest
        ));
    }

    for plugin in &config.compiler_plugins {
        inv = inv.arg(format!("--plugin-enable={plugin}"));
    }

    inv.args(config.extra_args.iter().cloned())
        .arg(config.main_file_path().display().to_string())
}
