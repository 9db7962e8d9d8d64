use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend types
///
/// Selected once per process from `STORAGE_BACKEND`. There is no fallback
/// between backends: an unknown value is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Databricks,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "databricks" => Ok(StorageBackend::Databricks),
            _ => Err(anyhow::anyhow!(
                "Unknown STORAGE_BACKEND: {:?}. Use 'local' or 'databricks'",
                s
            )),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Databricks => write!(f, "databricks"),
        }
    }
}

/// Logical media category a filename belongs to.
///
/// Each variant selects its own configured root (local) or subdirectory
/// (remote volume).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    Video,
    Reference,
    Audio,
}

impl PathType {
    pub const ALL: [PathType; 3] = [PathType::Video, PathType::Reference, PathType::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            PathType::Video => "video",
            PathType::Reference => "reference",
            PathType::Audio => "audio",
        }
    }

    /// Subdirectory name used under a unified media root or remote volume.
    pub fn default_subdir(&self) -> &'static str {
        match self {
            PathType::Video => "videos",
            PathType::Reference => "images",
            PathType::Audio => "audio",
        }
    }
}

impl FromStr for PathType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(PathType::Video),
            "reference" => Ok(PathType::Reference),
            "audio" => Ok(PathType::Audio),
            _ => Err(anyhow::anyhow!("Invalid path type: {}", s)),
        }
    }
}

impl Display for PathType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
