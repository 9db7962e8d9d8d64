//! Filename validation against a trusted base directory.
//!
//! Two checks guard every local operation and must run in this order:
//!
//! 1. [`check_not_symlink`] on the *unresolved* `base/name` path, so a link is
//!    rejected before canonicalization can silently follow it.
//! 2. [`validate_safe_path`], which canonicalizes and requires the result to
//!    stay under the canonical base.
//!
//! A symlink swapped in between the two checks (or between the checks and the
//! actual open) is a known residual time-of-check/time-of-use gap.

use crate::traits::{StorageError, StorageResult};
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Basename of `filename`, rejecting absolute paths and parent-directory
/// components outright.
pub fn safe_basename(filename: &str) -> StorageResult<&OsStr> {
    let raw = Path::new(filename);
    if raw.is_absolute()
        || raw
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(StorageError::InvalidArgument(format!(
            "Invalid filename (path traversal detected): {}",
            filename
        )));
    }

    match raw.file_name() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name),
        _ => Err(StorageError::InvalidArgument(format!(
            "Invalid filename: {:?}",
            filename
        ))),
    }
}

/// Resolve `filename` under `base` and prove the result stays inside it.
///
/// Returns the canonical path. When `allow_create` is false the file must
/// already exist.
pub fn validate_safe_path(
    base: &Path,
    filename: &str,
    allow_create: bool,
) -> StorageResult<PathBuf> {
    let name = safe_basename(filename)?;

    let base_canonical = base.canonicalize().map_err(|e| {
        StorageError::ConfigError(format!(
            "Failed to canonicalize base path {}: {}",
            base.display(),
            e
        ))
    })?;

    let candidate = base_canonical.join(name);
    let resolved = match candidate.canonicalize() {
        Ok(path) => path,
        // Not created yet: the parent is the canonical base and the name is a
        // plain component, so the candidate is already canonical.
        Err(e) if e.kind() == ErrorKind::NotFound => candidate,
        Err(e) => return Err(StorageError::IoError(e)),
    };

    if resolved == base_canonical || !resolved.starts_with(&base_canonical) {
        return Err(StorageError::InvalidArgument(format!(
            "Invalid filename (path traversal detected): {}",
            filename
        )));
    }

    if !allow_create && !resolved.exists() {
        return Err(StorageError::InvalidArgument(format!(
            "File not found: {}",
            filename
        )));
    }

    Ok(resolved)
}

/// Reject `path` if it is a symbolic link.
///
/// Uses `symlink_metadata`, so dangling links are rejected too. Paths that do
/// not exist pass.
pub fn check_not_symlink(path: &Path, description: &str) -> StorageResult<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Err(StorageError::InvalidArgument(format!(
            "{} cannot be a symbolic link: {}",
            description,
            path.display()
        ))),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::InvalidArgument(format!(
            "Cannot validate {}: {}",
            description, e
        ))),
    }
}

/// True if `path` canonicalizes to a location under `base_canonical`.
pub fn is_within(base_canonical: &Path, path: &Path) -> bool {
    path.canonicalize()
        .map(|resolved| resolved.starts_with(base_canonical) && resolved != base_canonical)
        .unwrap_or(false)
}
