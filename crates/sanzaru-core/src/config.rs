//! Configuration module
//!
//! Storage configuration read from the environment. Values are kept close to
//! their raw form: validation that depends on the selected backend (missing
//! credentials, unknown backend names, absent directories) happens when the
//! backend is constructed, not here.

use std::env;
use std::path::PathBuf;

use crate::storage_types::{PathType, StorageBackend};

const DEFAULT_STORAGE_BACKEND: &str = "local";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Unified media root; also the volume path fallback for Databricks.
pub const MEDIA_PATH_VAR: &str = "SANZARU_MEDIA_PATH";

/// Local filesystem roots, one per [`PathType`].
///
/// Individual variables (`VIDEO_PATH`, `IMAGE_PATH`, `AUDIO_PATH`) take
/// precedence over the unified `SANZARU_MEDIA_PATH/{videos,images,audio}`.
#[derive(Clone, Debug, Default)]
pub struct LocalPathsConfig {
    pub video_path: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
    pub media_root: Option<PathBuf>,
}

/// A resolved local root and where it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalRoot {
    pub path: PathBuf,
    /// Name of the variable that supplied the path, for error messages.
    pub source_var: &'static str,
    /// True when derived from the unified media root (auto-created on demand).
    pub unified: bool,
}

impl LocalPathsConfig {
    /// Environment variable that configures `path_type` individually.
    pub fn env_var(path_type: PathType) -> &'static str {
        match path_type {
            PathType::Video => "VIDEO_PATH",
            PathType::Reference => "IMAGE_PATH",
            PathType::Audio => "AUDIO_PATH",
        }
    }

    fn individual(&self, path_type: PathType) -> Option<&PathBuf> {
        match path_type {
            PathType::Video => self.video_path.as_ref(),
            PathType::Reference => self.image_path.as_ref(),
            PathType::Audio => self.audio_path.as_ref(),
        }
    }

    /// Resolve the root for `path_type`: individual variable, then unified root.
    pub fn resolve(&self, path_type: PathType) -> Option<LocalRoot> {
        if let Some(path) = self.individual(path_type) {
            return Some(LocalRoot {
                path: path.clone(),
                source_var: Self::env_var(path_type),
                unified: false,
            });
        }
        self.media_root.as_ref().map(|root| LocalRoot {
            path: root.join(path_type.default_subdir()),
            source_var: MEDIA_PATH_VAR,
            unified: true,
        })
    }
}

/// Databricks Unity Catalog Volumes settings.
#[derive(Clone, Debug)]
pub struct DatabricksConfig {
    pub host: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub volume_path: Option<String>,
    pub video_dir: String,
    pub image_dir: String,
    pub audio_dir: String,
    pub http_timeout_secs: u64,
}

impl Default for DatabricksConfig {
    fn default() -> Self {
        Self {
            host: None,
            client_id: None,
            client_secret: None,
            volume_path: None,
            video_dir: PathType::Video.default_subdir().to_string(),
            image_dir: PathType::Reference.default_subdir().to_string(),
            audio_dir: PathType::Audio.default_subdir().to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl DatabricksConfig {
    pub fn subdir(&self, path_type: PathType) -> &str {
        match path_type {
            PathType::Video => &self.video_dir,
            PathType::Reference => &self.image_dir,
            PathType::Audio => &self.audio_dir,
        }
    }

    /// Workspace URL with a scheme and without a trailing slash.
    pub fn normalized_host(&self) -> Option<String> {
        self.host.as_deref().map(|host| {
            let host = host.trim().trim_end_matches('/');
            if host.contains("://") {
                host.to_string()
            } else {
                format!("https://{}", host)
            }
        })
    }

    /// Volume path as `catalog/schema/volume`, accepting `/Volumes/...` input.
    pub fn normalized_volume_path(&self) -> Option<String> {
        self.volume_path.as_deref().map(|path| {
            let path = path.trim().trim_matches('/');
            path.strip_prefix("Volumes/")
                .unwrap_or(path)
                .trim_matches('/')
                .to_string()
        })
    }

    /// Required settings that are absent, with a description of each.
    pub fn missing_required(&self) -> Vec<(&'static str, &'static str)> {
        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push((
                "DATABRICKS_HOST",
                "Workspace URL (e.g. https://adb-123.azuredatabricks.net)",
            ));
        }
        if self.client_id.is_none() {
            missing.push(("DATABRICKS_CLIENT_ID", "OAuth service principal client ID"));
        }
        if self.client_secret.is_none() {
            missing.push((
                "DATABRICKS_CLIENT_SECRET",
                "OAuth service principal client secret",
            ));
        }
        if self
            .normalized_volume_path()
            .map_or(true, |p| p.is_empty())
        {
            missing.push((
                "DATABRICKS_VOLUME_PATH",
                "Unity Catalog volume path (or set SANZARU_MEDIA_PATH)",
            ));
        }
        missing
    }
}

/// Storage configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Raw `STORAGE_BACKEND` value; parsed by [`StorageConfig::backend`].
    pub storage_backend: String,
    pub local: LocalPathsConfig,
    pub databricks: DatabricksConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_backend: DEFAULT_STORAGE_BACKEND.to_string(),
            local: LocalPathsConfig::default(),
            databricks: DatabricksConfig::default(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_path = |name: &str| get(name).map(PathBuf::from);

        let media_root = get(MEDIA_PATH_VAR);

        let http_timeout_secs = match get("DATABRICKS_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|e| {
                anyhow::anyhow!("DATABRICKS_HTTP_TIMEOUT_SECS must be an integer: {}", e)
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let defaults = DatabricksConfig::default();
        let config = StorageConfig {
            storage_backend: get("STORAGE_BACKEND")
                .unwrap_or_else(|| DEFAULT_STORAGE_BACKEND.to_string()),
            local: LocalPathsConfig {
                video_path: get_path("VIDEO_PATH"),
                image_path: get_path("IMAGE_PATH"),
                audio_path: get_path("AUDIO_PATH"),
                media_root: media_root.clone().map(PathBuf::from),
            },
            databricks: DatabricksConfig {
                host: get("DATABRICKS_HOST"),
                client_id: get("DATABRICKS_CLIENT_ID"),
                client_secret: get("DATABRICKS_CLIENT_SECRET"),
                volume_path: get("DATABRICKS_VOLUME_PATH").or(media_root),
                video_dir: get("DATABRICKS_VIDEO_DIR").unwrap_or(defaults.video_dir),
                image_dir: get("DATABRICKS_IMAGE_DIR").unwrap_or(defaults.image_dir),
                audio_dir: get("DATABRICKS_AUDIO_DIR").unwrap_or(defaults.audio_dir),
                http_timeout_secs,
            },
        };

        Ok(config)
    }

    /// Parse the backend selector. Unknown names are an error.
    pub fn backend(&self) -> Result<StorageBackend, anyhow::Error> {
        self.storage_backend.parse()
    }
}
