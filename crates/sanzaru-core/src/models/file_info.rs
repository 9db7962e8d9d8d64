//! File metadata returned by every storage backend.

use serde::{Deserialize, Serialize};

/// Metadata about a stored file.
///
/// `name` is always a basename, never a path. `modified_timestamp` is seconds
/// since the Unix epoch, or `0.0` when the backend cannot report it (remote
/// HEAD responses carry no modification time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size_bytes: u64,
    pub modified_timestamp: f64,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, size_bytes: u64, modified_timestamp: f64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            modified_timestamp,
        }
    }

    pub fn extension(&self) -> String {
        file_extension(&self.name)
    }
}

/// Lowercased extension of `name` including the leading dot, or an empty
/// string. Dotfiles such as `.hidden` have no extension.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_lowercase())
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased_with_dot() {
        assert_eq!(FileInfo::new("Hero.PNG", 4, 0.0).extension(), ".png");
        assert_eq!(FileInfo::new("clip.tar.gz", 4, 0.0).extension(), ".gz");
    }

    #[test]
    fn test_extension_missing() {
        assert_eq!(FileInfo::new("README", 1, 0.0).extension(), "");
        assert_eq!(file_extension(".hidden"), "");
        assert_eq!(file_extension("trailing."), "");
    }
}
