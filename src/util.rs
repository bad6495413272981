//! Utility functions for path handling and common filesystem operations

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::debug;
use sha2::{Digest, Sha256};

use crate::constants as C;
use crate::error::{Error, Result};

/// Resolve `.` and `..` components without touching the filesystem
///
/// Leading `..` components of a relative path are kept, since there is
/// nothing to pop them against.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                let popped = match result.components().next_back() {
                    Some(Component::Normal(_)) => result.pop(),
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => true,
                    _ => false,
                };
                if !popped {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Make a path absolute against the working directory and normalise it
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize_lexical(&joined))
}

/// Absolute path whose longest existing ancestor is canonicalised
///
/// Lets a not-yet-existing destination compare equal (by prefix) with a
/// canonical root even when the root sits behind a symlink.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = absolutize(path)?;
    let mut existing = absolute.as_path();
    let mut rest: Vec<&std::ffi::OsStr> = Vec::new();

    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }

    // Use dunce to avoid UNC prefix on Windows
    let mut resolved = dunce::canonicalize(existing).unwrap_or_else(|_| existing.to_path_buf());
    for name in rest.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Canonical form of a root directory, or its absolute form if missing
pub fn resolve_root(root: &Path) -> io::Result<PathBuf> {
    resolve_path(root)
}

/// Resolve `path` and return it together with its path relative to `root`
///
/// `root` must already be resolved. Fails with `OutOfScope` if the path does
/// not live strictly below the root.
pub fn resolve_in_root(root: &Path, path: &Path) -> Result<(PathBuf, PathBuf)> {
    let resolved = resolve_path(path).map_err(|e| Error::io("resolve", path, e))?;
    match resolved.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => {
            let relative = relative.to_path_buf();
            Ok((resolved, relative))
        }
        _ => Err(Error::OutOfScope(resolved)),
    }
}

/// Whether a file or directory name is hidden
pub fn is_hidden(name: &str) -> bool {
    name.starts_with(C::HIDDEN_PREFIX)
}

/// Dotted extension of a path (`".md"`), if any
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
}

/// Move a file or directory, falling back to copy + delete when a plain
/// rename is refused (e.g. across filesystems)
pub fn move_path(source: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !source.exists() || dest.exists() {
                return Err(rename_err);
            }
            debug!("rename failed ({}), copying {} instead", rename_err, source.display());
            if source.is_dir() {
                copy_dir_recursive(source, dest)?;
                fs::remove_dir_all(source)
            } else {
                // Never leave a second copy behind when the source stays
                fs::copy(source, dest)
                    .and_then(|_| fs::remove_file(source))
                    .inspect_err(|_| {
                        let _ = fs::remove_file(dest);
                    })
            }
        }
    }
}

fn copy_dir_recursive(source: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove empty directories from `start` upward, stopping before `stop`
///
/// Directories outside `stop` are never touched. Returns the removed
/// directories, deepest first.
pub fn prune_empty_ancestors(start: &Path, stop: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    let mut current = start.to_path_buf();

    while current.starts_with(stop) && current != stop {
        let is_empty = match fs::read_dir(&current) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => break,
        };
        if !is_empty {
            break;
        }
        if let Err(e) = fs::remove_dir(&current) {
            debug!("Could not remove empty directory {}: {}", current.display(), e);
            break;
        }
        debug!("Removed empty directory: {}", current.display());
        removed.push(current.clone());
        if !current.pop() {
            break;
        }
    }

    removed
}

/// Remove every empty directory under `dir` bottom-up, `dir` included
///
/// Returns `true` if `dir` itself was removed.
pub fn remove_empty_tree(dir: &Path) -> io::Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let mut has_content = false;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if !remove_empty_tree(&entry.path())? {
                has_content = true;
            }
        } else {
            has_content = true;
        }
    }
    if has_content {
        return Ok(false);
    }
    fs::remove_dir(dir)?;
    debug!("Removed empty directory: {}", dir.display());
    Ok(true)
}

/// Hash content using SHA256
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let hash = hasher.finalize();
    format!("{:x}", hash)
}

/// Abbreviate hash to git-style length (12 characters for SHA256)
pub fn abbreviate_hash(full_hash: &str) -> String {
    full_hash.chars().take(C::HASH_ABBREVIATION_LENGTH).collect()
}

/// Content fingerprint used for change detection between scans
pub fn fingerprint(content: &[u8]) -> String {
    abbreviate_hash(&hash_content(content))
}

/// Display a path with forward slashes (cross-platform standard)
/// Converts Windows backslashes to forward slashes for consistent output
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Display `path` relative to `root` when possible
pub fn display_relative(path: &Path, root: &Path) -> String {
    display_path(path.strip_prefix(root).unwrap_or(path))
}
