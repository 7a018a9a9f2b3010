// src/watch/walker.rs

//! Directory enumeration for building the watch set.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{DevloopError, Result};

/// Enumerate `root` and every directory below it.
///
/// Entries below the root whose name starts with `.` are skipped and not
/// descended into. The root itself is always returned first, even when it
/// lives under a hidden directory. Subdirectories that cannot be read are
/// logged and skipped; only an unreadable root is an error.
pub fn enumerate_directories(root: &Path) -> Result<Vec<PathBuf>> {
    let walk_err = |source| DevloopError::Walk {
        path: root.to_path_buf(),
        source,
    };

    let meta = fs::metadata(root).map_err(walk_err)?;
    if !meta.is_dir() {
        return Err(walk_err(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        )));
    }
    let root_entries = fs::read_dir(root).map_err(walk_err)?;

    let mut dirs = vec![root.to_path_buf()];
    let mut stack = Vec::new();
    push_child_dirs(root, root_entries, &mut stack);

    while let Some(dir) = stack.pop() {
        dirs.push(dir.clone());
        match fs::read_dir(&dir) {
            Ok(entries) => push_child_dirs(&dir, entries, &mut stack),
            Err(err) => warn!(dir = ?dir, error = %err, "skipping unreadable directory"),
        }
    }

    debug!(root = ?root, count = dirs.len(), "enumerated directories");
    Ok(dirs)
}

fn push_child_dirs(dir: &Path, entries: fs::ReadDir, stack: &mut Vec<PathBuf>) {
    let mut children = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(dir = ?dir, error = %err, "failed to read directory entry");
                continue;
            }
        };
        if is_hidden(&entry.file_name().to_string_lossy()) {
            continue;
        }
        // `file_type` does not follow symlinks, so linked dirs are not walked.
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            children.push(entry.path());
        }
    }
    // Reverse-sorted so popping the stack yields a stable, sorted walk.
    children.sort_unstable_by(|a, b| b.cmp(a));
    stack.extend(children);
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
