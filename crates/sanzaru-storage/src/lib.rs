//! Sanzaru Storage Library
//!
//! Storage abstraction for generated media (videos, reference images, audio).
//! Tools read and write through the [`Storage`] trait without knowing whether
//! bytes live on local disk or in a Databricks Unity Catalog Volume.
//!
//! # Path layout
//!
//! Every operation addresses a file by `(PathType, filename)`. The filename is
//! reduced to a basename and resolved under the root for its path type:
//!
//! - **Local**: `{VIDEO_PATH|IMAGE_PATH|AUDIO_PATH}/{filename}`, or
//!   `{SANZARU_MEDIA_PATH}/{videos|images|audio}/{filename}`
//! - **Databricks**: `/Volumes/{volume}/[{user_slug}/]{subdir}/{filename}`
//!
//! No operation can resolve outside that root. Locally this is enforced by
//! rejecting symlinks and canonicalizing (see [`security`]); remotely by
//! sanitizing the filename to a single path segment.
//!
//! # Wiring
//!
//! Build one backend at startup with [`create_storage`], share the returned
//! `Arc<dyn Storage>`, and wrap it per request in a [`StorageScope`] carrying
//! the caller's [`UserContext`].

#[cfg(feature = "storage-databricks")]
pub mod databricks;
pub mod factory;
pub mod filter;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod scope;
pub mod security;
pub mod temp;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-databricks")]
pub use databricks::DatabricksStorage;
pub use factory::create_storage;
pub use filter::FileFilter;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use sanzaru_core::{FileInfo, PathType, StorageBackend, UserContext, UserContextError};
pub use scope::StorageScope;
pub use temp::{LocalPath, LocalTempfile};
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
