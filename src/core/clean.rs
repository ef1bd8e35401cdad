//! Clean logic
//!
//! Removes compiler leftovers from the project directory after a build.

use std::path::{Component, Path};

use crate::infra::filesystem;

/// Result of clean operation
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanResult {
    /// Items that were removed
    pub removed: Vec<String>,
    /// Items that didn't exist (skipped)
    pub skipped: Vec<String>,
    /// Items that could not be removed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Remove `items` (relative to `project_dir`) if they exist.
///
/// Items that would escape the project directory are refused. Failures are
/// collected rather than aborting, since cleanup is best-effort.
pub fn clean_project(project_dir: &Path, items: &[String]) -> CleanResult {
    let mut result = CleanResult::default();

    for item in items {
        if !is_contained(Path::new(item)) {
            tracing::warn!("Refusing to remove '{item}': outside the project directory");
            result
                .failed
                .push((item.clone(), "outside the project directory".to_string()));
            continue;
        }

        match filesystem::remove_path(&project_dir.join(item)) {
            Ok(true) => {
                tracing::debug!("Removed {item}");
                result.removed.push(item.clone());
            }
            Ok(false) => result.skipped.push(item.clone()),
            Err(e) => {
                tracing::warn!("Failed to remove {item}: {e}");
                result.failed.push((item.clone(), e.to_string()));
            }
        }
    }

    result
}

fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
