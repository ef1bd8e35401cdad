//! Build configuration (config.yaml) parsing and validation
//!
//! The YAML document is first checked structurally as a `serde_yaml::Value`
//! so that every offending field is reported at once, then deserialized into
//! the strongly typed [`BuildConfig`]. Relative paths resolve against the
//! directory containing the config file.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::config::defaults::{
    DEFAULT_BUILD_LIBS, DEFAULT_CLEANUP_ITEMS, DEFAULT_COMPILER_PLUGINS, DEFAULT_CONFIG_FILE,
    DEFAULT_EXTRA_ARGS, SCHEMA_VERSION,
};
use crate::error::{ConfigError, ConfigIssue};

/// Fields every config must set
pub const REQUIRED_FIELDS: &[&str] = &["project_name", "main_file", "output_name"];

/// Optional top-level fields holding a list of strings
const STRING_LIST_FIELDS: &[&str] = &[
    "project_libs",
    "build_libs",
    "include_packages",
    "include_data_dirs",
    "compiler_plugins",
    "nuitka_plugins",
    "extra_args",
    "nuitka_extra_args",
    "cleanup_items",
];

/// Optional top-level fields holding a single string
const STRING_FIELDS: &[&str] = &["icon_file", "python"];

/// Keys accepted inside `windows_metadata`
pub const METADATA_KEYS: &[&str] = &[
    "product_name",
    "file_description",
    "product_version",
    "file_version",
    "copyright",
    "company_name",
];

/// Older key names still accepted, paired with their current name
const LEGACY_ALIASES: &[(&str, &str)] = &[
    ("nuitka_plugins", "compiler_plugins"),
    ("nuitka_extra_args", "extra_args"),
];

/// Every recognized top-level key
const KNOWN_FIELDS: &[&str] = &[
    "schema_version",
    "project_name",
    "main_file",
    "output_name",
    "project_libs",
    "build_libs",
    "include_packages",
    "include_data_dirs",
    "icon_file",
    "windows_metadata",
    "compiler_plugins",
    "nuitka_plugins",
    "extra_args",
    "nuitka_extra_args",
    "jobs",
    "compress",
    "cleanup_items",
    "python",
];

/// Descriptive fields embedded into the executable's resource section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowsMetadata {
    /// Product name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    /// File description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_description: Option<String>,

    /// Product version (dotted numbers, up to four parts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_version: Option<String>,

    /// File version (dotted numbers, up to four parts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_version: Option<String>,

    /// Copyright notice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,

    /// Company name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl WindowsMetadata {
    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Set fields as `(key, value)` pairs in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("product_name", &self.product_name),
            ("file_description", &self.file_description),
            ("product_version", &self.product_version),
            ("file_version", &self.file_version),
            ("copyright", &self.copyright),
            ("company_name", &self.company_name),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
    }
}

/// A data directory bundled into the executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    /// Directory on disk, resolved against the project directory
    pub source: PathBuf,
    /// Location inside the executable
    pub dest: String,
}

/// The build configuration for one project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Config schema version
    #[serde(default = "default_schema_version")]
    pub schema_version: u64,

    /// Project name
    pub project_name: String,

    /// Entry-point script
    pub main_file: PathBuf,

    /// Executable file name, conventionally ending in `.exe`
    pub output_name: String,

    /// Libraries the project imports, installed in order
    #[serde(default)]
    pub project_libs: Vec<String>,

    /// Build tools installed before the project libraries
    #[serde(default = "default_build_libs")]
    pub build_libs: Vec<String>,

    /// Local packages compiled into the executable
    #[serde(default)]
    pub include_packages: Vec<String>,

    /// Data directories as `source=dest`
    #[serde(default)]
    pub include_data_dirs: Vec<String>,

    /// Icon embedded into the executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_file: Option<PathBuf>,

    /// Windows resource metadata
    #[serde(default, skip_serializing_if = "WindowsMetadata::is_empty")]
    pub windows_metadata: WindowsMetadata,

    /// Compiler plugins to enable
    #[serde(default = "default_compiler_plugins", alias = "nuitka_plugins")]
    pub compiler_plugins: Vec<String>,

    /// Additional raw compiler arguments
    #[serde(default = "default_extra_args", alias = "nuitka_extra_args")]
    pub extra_args: Vec<String>,

    /// Parallel compiler jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Compress the executable after compilation
    #[serde(default = "default_compress")]
    pub compress: bool,

    /// Extra project-relative paths removed after the build
    #[serde(default)]
    pub cleanup_items: Vec<String>,

    /// Interpreter used to create the build environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,

    /// Directory containing the config file
    #[serde(skip)]
    project_dir: PathBuf,

    /// Location of the config file itself
    #[serde(skip)]
    config_path: PathBuf,
}

fn default_schema_version() -> u64 {
    SCHEMA_VERSION
}

fn default_build_libs() -> Vec<String> {
    DEFAULT_BUILD_LIBS.iter().map(ToString::to_string).collect()
}

fn default_compiler_plugins() -> Vec<String> {
    DEFAULT_COMPILER_PLUGINS.iter().map(ToString::to_string).collect()
}

fn default_extra_args() -> Vec<String> {
    DEFAULT_EXTRA_ARGS.iter().map(ToString::to_string).collect()
}

fn default_compress() -> bool {
    true
}

impl BuildConfig {
    /// Create a config with only the required fields set
    pub fn new(
        project_name: impl Into<String>,
        main_file: impl Into<PathBuf>,
        output_name: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            project_name: project_name.into(),
            main_file: main_file.into(),
            output_name: output_name.into(),
            project_libs: Vec::new(),
            build_libs: default_build_libs(),
            include_packages: Vec::new(),
            include_data_dirs: Vec::new(),
            icon_file: None,
            windows_metadata: WindowsMetadata::default(),
            compiler_plugins: default_compiler_plugins(),
            extra_args: default_extra_args(),
            jobs: None,
            compress: true,
            cleanup_items: Vec::new(),
            python: None,
            project_dir: PathBuf::from("."),
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Set the directory relative paths resolve against
    #[must_use]
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self.config_path = self.project_dir.join(DEFAULT_CONFIG_FILE);
        self
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config = Self::from_yaml(&content, path)?;
        tracing::info!(
            "Loaded configuration for '{}' from {}",
            config.project_name,
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate YAML content that was read from `path`
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let project_dir = project_dir_of(path);
        let issues = validate_document(&value, &project_dir)?;
        if !issues.is_empty() {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                issues,
            });
        }

        let mut mapping = match value {
            Value::Mapping(m) => m,
            _ => Mapping::new(),
        };
        strip_nulls(&mut mapping);

        let mut config: Self =
            serde_yaml::from_value(Value::Mapping(mapping)).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;
        config.project_dir = project_dir;
        config.config_path = path.to_path_buf();

        if !config.output_name.to_ascii_lowercase().ends_with(".exe") {
            tracing::warn!(
                "output_name '{}' does not end with .exe",
                config.output_name
            );
        }

        Ok(config)
    }

    /// Re-check typed invariants, reporting every issue found.
    ///
    /// Referenced files are checked again here because they may have changed
    /// since the config was loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();

        if self.schema_version > SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema {
                found: self.schema_version,
                supported: SCHEMA_VERSION,
            });
        }

        for (field, value) in [
            ("project_name", self.project_name.as_str()),
            ("output_name", self.output_name.as_str()),
        ] {
            if value.trim().is_empty() {
                issues.push(ConfigIssue::new(field, "Missing required field"));
            }
        }
        check_output_name(&self.output_name, &mut issues);

        if self.main_file.as_os_str().is_empty() {
            issues.push(ConfigIssue::new("main_file", "Missing required field"));
        } else {
            check_main_file(&self.project_dir, &self.main_file, &mut issues);
        }

        if let Some(ref icon) = self.icon_file {
            check_icon_file(&self.project_dir, icon, &mut issues);
        }

        for (index, entry) in self.include_data_dirs.iter().enumerate() {
            check_data_dir(&self.project_dir, index, entry, &mut issues);
        }

        for (key, value) in self.windows_metadata.entries() {
            check_metadata_value(key, value, &mut issues);
        }

        if self.jobs == Some(0) {
            issues.push(ConfigIssue::new("jobs", "must be a positive integer"));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                path: self.config_path.clone(),
                issues,
            })
        }
    }

    /// Directory relative paths resolve against
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Config file this configuration was loaded from
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Resolve a config path against the project directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.project_dir.join(path)
    }

    /// Interpreter override with project-relative paths resolved.
    ///
    /// A bare program name such as `python3.12` is left for `PATH` lookup.
    pub fn python_program(&self) -> Option<String> {
        let python = self.python.as_deref()?;
        let path = Path::new(python);
        if path.components().count() > 1 && path.is_relative() {
            Some(self.resolve(path).to_string_lossy().into_owned())
        } else {
            Some(python.to_string())
        }
    }

    /// Absolute location of the entry-point script
    pub fn main_file_path(&self) -> PathBuf {
        self.resolve(&self.main_file)
    }

    /// Absolute location of the icon, if configured
    pub fn icon_path(&self) -> Option<PathBuf> {
        self.icon_file.as_deref().map(|icon| self.resolve(icon))
    }

    /// Parsed data directories
    pub fn data_dirs(&self) -> Vec<DataDir> {
        self.include_data_dirs
            .iter()
            .map(|entry| {
                let (source, dest) = split_data_dir(entry);
                DataDir {
                    source: self.resolve(Path::new(source)),
                    dest: dest.to_string(),
                }
            })
            .collect()
    }

    /// Number of parallel compiler jobs
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get)
    }

    /// Project-relative paths removed during cleanup
    pub fn cleanup_items(&self) -> Vec<String> {
        DEFAULT_CLEANUP_ITEMS
            .iter()
            .map(|item| item.replace("{project}", &self.project_name))
            .chain(self.cleanup_items.iter().cloned())
            .collect()
    }
}

/// Validate the structure of a parsed config document.
///
/// Returns every issue found rather than stopping at the first. Only an
/// unsupported `schema_version` short-circuits, since the rest of the document
/// cannot be interpreted in that case.
pub fn validate_document(
    value: &Value,
    project_dir: &Path,
) -> Result<Vec<ConfigIssue>, ConfigError> {
    let mut issues = Vec::new();

    let map = match value {
        Value::Mapping(map) => map,
        Value::Null => {
            for field in REQUIRED_FIELDS {
                issues.push(ConfigIssue::new(*field, "Missing required field"));
            }
            return Ok(issues);
        }
        _ => {
            issues.push(ConfigIssue::new("<root>", "expected a mapping of fields"));
            return Ok(issues);
        }
    };

    if let Some(version) = present(map, "schema_version") {
        match version.as_u64() {
            Some(0) | None => issues.push(ConfigIssue::new(
                "schema_version",
                "must be a positive integer",
            )),
            Some(found) if found > SCHEMA_VERSION => {
                return Err(ConfigError::UnsupportedSchema {
                    found,
                    supported: SCHEMA_VERSION,
                });
            }
            Some(_) => {}
        }
    }

    for key in map.keys() {
        match key.as_str() {
            Some(name) if KNOWN_FIELDS.contains(&name) => {}
            Some(name) => tracing::warn!("Ignoring unknown config field '{name}'"),
            None => issues.push(ConfigIssue::new(
                format!("{key:?}"),
                "field names must be strings",
            )),
        }
    }

    for (legacy, current) in LEGACY_ALIASES {
        if present(map, legacy).is_some() && present(map, current).is_some() {
            issues.push(ConfigIssue::new(
                *legacy,
                format!("conflicts with '{current}'; set only one of them"),
            ));
        }
    }

    for field in REQUIRED_FIELDS {
        match present(map, field) {
            None => issues.push(ConfigIssue::new(*field, "Missing required field")),
            Some(Value::String(s)) if s.trim().is_empty() => {
                issues.push(ConfigIssue::new(*field, "Missing required field"));
            }
            Some(Value::String(_)) => {}
            Some(other) => issues.push(type_issue(field, "a string", other)),
        }
    }

    if let Some(Value::String(name)) = present(map, "output_name") {
        check_output_name(name, &mut issues);
    }

    if let Some(Value::String(main)) = present(map, "main_file") {
        if !main.trim().is_empty() {
            check_main_file(project_dir, Path::new(main), &mut issues);
        }
    }

    for field in STRING_LIST_FIELDS {
        let Some(list) = present(map, field) else {
            continue;
        };
        let Value::Sequence(items) = list else {
            issues.push(type_issue(field, "a list of strings", list));
            continue;
        };
        for (index, item) in items.iter().enumerate() {
            match item {
                Value::String(s) if s.trim().is_empty() => issues.push(ConfigIssue::new(
                    format!("{field}[{index}]"),
                    "must not be empty",
                )),
                Value::String(s) if *field == "include_data_dirs" => {
                    check_data_dir(project_dir, index, s, &mut issues);
                }
                Value::String(_) => {}
                other => issues.push(type_issue(&format!("{field}[{index}]"), "a string", other)),
            }
        }
    }

    for field in STRING_FIELDS {
        match present(map, field) {
            None | Some(Value::String(_)) => {}
            Some(other) => issues.push(type_issue(field, "a string", other)),
        }
    }

    if let Some(Value::String(icon)) = present(map, "icon_file") {
        check_icon_file(project_dir, Path::new(icon), &mut issues);
    }

    if let Some(jobs) = present(map, "jobs") {
        if !matches!(jobs.as_u64(), Some(n) if n > 0) {
            issues.push(ConfigIssue::new("jobs", "must be a positive integer"));
        }
    }

    if let Some(compress) = present(map, "compress") {
        if !compress.is_bool() {
            issues.push(type_issue("compress", "true or false", compress));
        }
    }

    if let Some(metadata) = present(map, "windows_metadata") {
        check_metadata_mapping(metadata, &mut issues);
    }

    Ok(issues)
}

fn check_metadata_mapping(metadata: &Value, issues: &mut Vec<ConfigIssue>) {
    let Value::Mapping(entries) = metadata else {
        issues.push(type_issue("windows_metadata", "a mapping", metadata));
        return;
    };

    for (key, value) in entries {
        let Some(name) = key.as_str().filter(|k| METADATA_KEYS.contains(k)) else {
            issues.push(ConfigIssue::new(
                format!("windows_metadata.{}", describe_key(key)),
                format!("unrecognized key (expected one of {})", METADATA_KEYS.join(", ")),
            ));
            continue;
        };
        let field = format!("windows_metadata.{name}");
        match value {
            Value::Null => {}
            Value::String(s) => check_metadata_value(name, s, issues),
            other => issues.push(type_issue(&field, "a string (quote the value)", other)),
        }
    }
}

fn check_metadata_value(key: &str, value: &str, issues: &mut Vec<ConfigIssue>) {
    if matches!(key, "product_version" | "file_version") && !is_valid_version(value) {
        issues.push(ConfigIssue::new(
            format!("windows_metadata.{key}"),
            format!("'{value}' is not a version like 1.2.3.4"),
        ));
    }
}

fn check_output_name(name: &str, issues: &mut Vec<ConfigIssue>) {
    if name.contains('/') || name.contains('\\') {
        issues.push(ConfigIssue::new(
            "output_name",
            "must be a file name, not a path (use --output-dir to choose the location)",
        ));
    }
}

fn check_main_file(project_dir: &Path, main: &Path, issues: &mut Vec<ConfigIssue>) {
    let path = project_dir.join(main);
    if !path.is_file() {
        issues.push(ConfigIssue::new(
            "main_file",
            format!("Main file not found: {}", path.display()),
        ));
    } else if let Err(e) = std::fs::File::open(&path) {
        issues.push(ConfigIssue::new(
            "main_file",
            format!("Main file is not readable: {e}"),
        ));
    }
}

fn check_icon_file(project_dir: &Path, icon: &Path, issues: &mut Vec<ConfigIssue>) {
    let path = project_dir.join(icon);
    if !path.is_file() {
        issues.push(ConfigIssue::new(
            "icon_file",
            format!("Icon file not found: {}", path.display()),
        ));
    }
}

fn check_data_dir(project_dir: &Path, index: usize, entry: &str, issues: &mut Vec<ConfigIssue>) {
    let (source, _) = split_data_dir(entry);
    let path = project_dir.join(source);
    if !path.is_dir() {
        issues.push(ConfigIssue::new(
            format!("include_data_dirs[{index}]"),
            format!("Data directory not found: {}", path.display()),
        ));
    }
}

/// Split `source=dest`; a bare `source` keeps its own name inside the executable
fn split_data_dir(entry: &str) -> (&str, &str) {
    entry.split_once('=').unwrap_or((entry, entry))
}

fn is_valid_version(version: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\d+(\.\d+){0,3}$").expect("version pattern is valid"))
        .is_match(version)
}

/// Look up a key, treating an explicit `null` as absent
fn present<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn strip_nulls(map: &mut Mapping) {
    map.retain(|_, value| !value.is_null());
    if let Some(Value::Mapping(metadata)) = map.get_mut("windows_metadata") {
        metadata.retain(|_, value| !value.is_null());
    }
}

fn type_issue(field: &str, expected: &str, got: &Value) -> ConfigIssue {
    ConfigIssue::new(field, format!("expected {expected}, got {}", value_kind(got)))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn describe_key(key: &Value) -> String {
    key.as_str()
        .map_or_else(|| format!("{key:?}"), ToString::to_string)
}

fn project_dir_of(config_path: &Path) -> PathBuf {
    let parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::env::current_dir()
        .map(|cwd| cwd.join(parent))
        .unwrap_or_else(|_| parent.to_path_buf())
}
