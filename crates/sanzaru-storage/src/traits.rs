//! The storage contract shared by the local and Databricks backends, plus
//! the error type every operation reports.

use crate::temp::{LocalPath, LocalTempfile};
use crate::{FileInfo, PathType, StorageBackend, UserContext, UserContextError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::collections::HashSet;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    /// Security violations and malformed arguments. Never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Non-404 failures talking to a remote backend.
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<UserContextError> for StorageError {
    fn from(err: UserContextError) -> Self {
        StorageError::InvalidArgument(err.to_string())
    }
}

#[cfg(feature = "storage-databricks")]
impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::TransportError(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Incrementally produced byte chunks, e.g. a video download in progress.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Storage abstraction trait
///
/// All storage backends (local filesystem, Databricks Volumes) implement this
/// trait, so the media tools can work with either without knowing where the
/// bytes live.
///
/// Every operation takes the `PathType` selecting the configured root and a
/// `filename` which is reduced to its basename. Backends guarantee that the
/// resolved location never leaves the root for that path type (plus the
/// tenant prefix when `user` is set and the backend is multi-tenant).
///
/// `user` is the identity of the request on whose behalf the call is made;
/// pass `None` for single-tenant deployments.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read an entire file.
    ///
    /// Fails with `NotFound` if the file does not exist and with
    /// `InvalidArgument` if `filename` fails security validation.
    async fn read(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<Vec<u8>>;

    /// Read up to `length` bytes starting at `offset`.
    ///
    /// A negative `offset` is rejected with `InvalidArgument` before any I/O.
    /// Reads past the end of the file are truncated.
    async fn read_range(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
        offset: i64,
        length: u64,
    ) -> StorageResult<Vec<u8>>;

    /// Create or overwrite a file. Returns a human-readable location.
    async fn write(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
        data: Vec<u8>,
    ) -> StorageResult<String>;

    /// Write a file from a chunk stream.
    ///
    /// Equivalent to concatenating every chunk in order and calling `write`.
    /// A chunk error aborts the write and is returned to the caller.
    async fn write_stream(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
        chunks: ByteStream,
    ) -> StorageResult<String>;

    /// List regular files whose basename matches the glob `pattern` and,
    /// when given, whose lowercased extension is in `extensions`.
    ///
    /// Results are sorted by name. Directories are never returned.
    async fn list_files(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        pattern: &str,
        extensions: Option<&HashSet<String>>,
    ) -> StorageResult<Vec<FileInfo>>;

    /// File metadata. Fails with `NotFound` if absent.
    async fn stat(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<FileInfo>;

    /// Whether the file exists. Any failure, including security violations
    /// and transport errors, is reported as `false`.
    async fn exists(&self, user: Option<&UserContext>, path_type: PathType, filename: &str)
        -> bool;

    /// A real filesystem path to the file for libraries that need one.
    ///
    /// Local backends return the file itself. Remote backends download to a
    /// private temporary file that is deleted when the guard is dropped.
    async fn local_path(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<LocalPath>;

    /// A local path to write into, stored on [`LocalTempfile::commit`].
    ///
    /// Dropping the guard without committing discards the written bytes for
    /// remote backends. The temporary file is always removed.
    fn local_tempfile(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<LocalTempfile<'_>>;

    /// Human-readable location for user-facing messages. Performs no I/O
    /// beyond what path validation needs.
    fn resolve_display_path(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Release long-lived resources such as HTTP connection pools.
    ///
    /// Dropping the backend has the same effect; this exists for shutdown
    /// paths that hold the backend behind a shared handle.
    async fn close(&self) {}
}

/// Reject negative range offsets before any I/O happens.
pub(crate) fn check_range_offset(offset: i64) -> StorageResult<u64> {
    u64::try_from(offset).map_err(|_| {
        StorageError::InvalidArgument(format!("offset must be non-negative, got {}", offset))
    })
}

#[cfg_attr(not(feature = "storage-databricks"), allow(dead_code))]
pub(crate) fn slice_range(data: &[u8], start: u64, length: u64) -> &[u8] {
    let len = data.len() as u64;
    let start = start.min(len);
    let end = start.saturating_add(length).min(len);
    &data[start as usize..end as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_offset_rejected() {
        let err = check_range_offset(-1).unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(ref m) if m.contains("non-negative")));
        assert_eq!(check_range_offset(0).unwrap(), 0);
    }

    #[test]
    fn test_slice_range_clamps_to_data() {
        let data = b"0123456789";
        assert_eq!(slice_range(data, 2, 3), b"234");
        assert_eq!(slice_range(data, 8, 100), b"89");
        assert_eq!(slice_range(data, 20, 5), b"");
        assert_eq!(slice_range(data, 0, u64::MAX), data);
    }

    #[test]
    fn test_user_context_error_is_invalid_argument() {
        let err: StorageError = UserContextError::EmptySlug("+@x.com".to_string()).into();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
    }
}
