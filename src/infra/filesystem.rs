//! Filesystem operations
//!
//! Handles directory lifecycle and artifact promotion.

use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
}

/// Remove a directory and all its contents, ignoring missing paths
pub fn remove_dir_all(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Remove a file or directory, returning whether anything was removed
pub fn remove_path(path: &Path) -> io::Result<bool> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(true)
}

/// Check whether a directory exists and contains at least one entry
pub fn is_non_empty_dir(path: &Path) -> io::Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(std::fs::read_dir(path)?.next().is_some())
}

/// Move a finished file to `dest` without exposing a partial file there.
///
/// The file is first copied next to the destination under a temporary name,
/// then renamed over it, so readers of `dest` see either the old file or the
/// complete new one.
pub fn promote_file(src: &Path, dest: &Path) -> io::Result<PathBuf> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no file name"))?;
    let staging = parent.join(format!(
        ".{}.partial-{}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    if let Err(e) = std::fs::copy(src, &staging).and_then(|_| std::fs::rename(&staging, dest)) {
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }

    Ok(dest.to_path_buf())
}

/// SHA-256 of a file as lowercase hex
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
