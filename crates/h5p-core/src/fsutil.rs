//! Recursive tree operations for scratch and permanent storage
//!
//! A missing directory is not an error for deletion (cleanup paths run
//! against partially-written trees), but an unwritable destination is an
//! error for copying.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Remove a directory tree.
///
/// Returns whether the directory existed. A missing directory is fine;
/// anything else that prevents removal is an error.
pub fn delete_tree(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    debug!(path = %dir.display(), "removing directory tree");
    fs::remove_dir_all(dir)?;
    Ok(true)
}

/// Ensure a directory exists and is writable.
pub fn dir_ready(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    if !path.is_dir() {
        return Err(Error::host(format!(
            "Path is not a directory: {}",
            path.display()
        )));
    }
    let metadata = fs::metadata(path)?;
    if metadata.permissions().readonly() {
        warn!(path = %path.display(), "destination directory is not writable");
        return Err(Error::host(format!(
            "Unable to write to {}",
            path.display()
        )));
    }
    Ok(())
}

/// Recursively copy a directory tree.
///
/// The destination is created through [`dir_ready`]. A missing source is
/// an error here, unlike deletion.
pub fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    if !source.is_dir() {
        return Err(Error::host(format!(
            "Source directory does not exist: {}",
            source.display()
        )));
    }
    dir_ready(destination)?;

    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| Error::host(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .expect("walkdir yields paths under its root");
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Move a directory tree, falling back to copy+delete across devices.
pub fn move_tree(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        dir_ready(parent)?;
    }
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_tree(source, destination)?;
            delete_tree(source)?;
            Ok(())
        }
    }
}
