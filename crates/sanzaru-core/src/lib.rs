//! Sanzaru Core Library
//!
//! Domain types, per-request identity and configuration shared by the storage
//! layer and the media tools that consume it.

pub mod config;
pub mod models;
pub mod storage_types;
pub mod user_context;

// Re-export commonly used types
pub use config::{DatabricksConfig, LocalPathsConfig, LocalRoot, StorageConfig, MEDIA_PATH_VAR};
pub use models::{file_extension, FileInfo};
pub use storage_types::{PathType, StorageBackend};
pub use user_context::{user_slug, UserContext, UserContextError, FORWARDED_EMAIL_HEADER};
