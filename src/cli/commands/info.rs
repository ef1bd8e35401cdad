//! Info command implementation
//!
//! Implements `pynexe --info`: shows the resolved configuration without
//! building anything.

use std::path::Path;

use anyhow::Result;

use crate::cli::output::print_banner;
use crate::core::config::BuildConfig;
use crate::infra::toolchain::Toolchain;

fn count(n: usize, noun: &str) -> String {
    if n == 0 {
        "None".to_string()
    } else {
        format!("{n} {noun}")
    }
}

fn or_none(value: Option<String>) -> String {
    value.unwrap_or_else(|| "None".to_string())
}

/// Property/value rows describing `config`
pub fn rows(config: &BuildConfig, toolchain: &Toolchain) -> Vec<(&'static str, String)> {
    let metadata: Vec<String> = config
        .windows_metadata
        .entries()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();

    vec![
        ("Project Name", config.project_name.clone()),
        ("Main File", config.main_file.display().to_string()),
        ("Output Name", config.output_name.clone()),
        (
            "Icon File",
            or_none(config.icon_file.as_ref().map(|p| p.display().to_string())),
        ),
        ("Dependencies", count(config.project_libs.len(), "libraries")),
        (
            "Include Packages",
            count(config.include_packages.len(), "packages"),
        ),
        (
            "Data Directories",
            count(config.include_data_dirs.len(), "directories"),
        ),
        (
            "Metadata",
            if metadata.is_empty() {
                "None".to_string()
            } else {
                metadata.join(", ")
            },
        ),
        ("Build Tools", config.build_libs.join(" ")),
        ("Plugins", config.compiler_plugins.join(", ")),
        ("Jobs", config.jobs().to_string()),
        (
            "Compression",
            match (config.compress, &toolchain.upx) {
                (false, _) => "Disabled".to_string(),
                (true, Some(upx)) => format!("UPX ({})", upx.display()),
                (true, None) => "Enabled, UPX not found".to_string(),
            },
        ),
        ("Python", toolchain.python.display().to_string()),
    ]
}

/// Format rows as an aligned two-column table
pub fn render_table(rows: &[(&'static str, String)]) -> String {
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut out = String::from("Project Information\n");
    for (key, value) in rows {
        out.push_str(&format!("  {key:<width$}  {value}\n"));
    }
    out
}

/// Machine-readable view of `config`
pub fn to_json(config: &BuildConfig, toolchain: &Toolchain) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(map) = value.as_object_mut() {
        map.insert(
            "project_dir".to_string(),
            serde_json::json!(config.project_dir()),
        );
        map.insert("resolved_jobs".to_string(), serde_json::json!(config.jobs()));
        map.insert(
            "resolved_cleanup_items".to_string(),
            serde_json::json!(config.cleanup_items()),
        );
        map.insert(
            "toolchain".to_string(),
            serde_json::json!({
                "python": toolchain.python,
                "upx": toolchain.upx,
            }),
        );
        map.insert(
            "pynexe".to_string(),
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "git_sha": option_env!("VERGEN_GIT_SHA"),
                "target": option_env!("VERGEN_CARGO_TARGET_TRIPLE"),
            }),
        );
    }
    Ok(value)
}

/// Execute the info command
pub fn execute(config_path: &Path, json: bool) -> Result<()> {
    print_banner();
    let config = BuildConfig::load(config_path)?;
    let toolchain = Toolchain::discover(config.python_program().as_deref());

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&config, &toolchain)?)?);
    } else {
        print!("{}", render_table(&rows(&config, &toolchain)));
    }
    Ok(())
}
