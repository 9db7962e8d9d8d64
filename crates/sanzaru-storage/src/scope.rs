//! Request-scoped storage handle.
//!
//! A [`StorageScope`] pairs the shared backend with the identity of the
//! current request, so tool code carries a single value instead of passing
//! the user to every call. Build one per request and drop it when the request
//! finishes; the backend itself is shared.

use crate::temp::{LocalPath, LocalTempfile};
use crate::traits::{ByteStream, Storage, StorageResult};
use crate::{FileInfo, PathType, StorageBackend, UserContext};
use http::HeaderMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct StorageScope {
    storage: Arc<dyn Storage>,
    user: Option<UserContext>,
}

impl StorageScope {
    pub fn new(storage: Arc<dyn Storage>, user: Option<UserContext>) -> Self {
        Self { storage, user }
    }

    /// Scope for a request whose identity comes from the proxy header.
    ///
    /// A missing header yields an anonymous scope; a malformed one is
    /// `InvalidArgument`.
    pub fn from_headers(storage: Arc<dyn Storage>, headers: &HeaderMap) -> StorageResult<Self> {
        let user = UserContext::from_headers(headers)?;
        Ok(Self { storage, user })
    }

    pub fn user(&self) -> Option<&UserContext> {
        self.user.as_ref()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn backend_type(&self) -> StorageBackend {
        self.storage.backend_type()
    }

    pub async fn read(&self, path_type: PathType, filename: &str) -> StorageResult<Vec<u8>> {
        self.storage.read(self.user(), path_type, filename).await
    }

    pub async fn read_range(
        &self,
        path_type: PathType,
        filename: &str,
        offset: i64,
        length: u64,
    ) -> StorageResult<Vec<u8>> {
        self.storage
            .read_range(self.user(), path_type, filename, offset, length)
            .await
    }

    pub async fn write(
        &self,
        path_type: PathType,
        filename: &str,
        data: Vec<u8>,
    ) -> StorageResult<String> {
        self.storage
            .write(self.user(), path_type, filename, data)
            .await
    }

    pub async fn write_stream(
        &self,
        path_type: PathType,
        filename: &str,
        chunks: ByteStream,
    ) -> StorageResult<String> {
        self.storage
            .write_stream(self.user(), path_type, filename, chunks)
            .await
    }

    pub async fn list_files(
        &self,
        path_type: PathType,
        pattern: &str,
        extensions: Option<&HashSet<String>>,
    ) -> StorageResult<Vec<FileInfo>> {
        self.storage
            .list_files(self.user(), path_type, pattern, extensions)
            .await
    }

    pub async fn stat(&self, path_type: PathType, filename: &str) -> StorageResult<FileInfo> {
        self.storage.stat(self.user(), path_type, filename).await
    }

    pub async fn exists(&self, path_type: PathType, filename: &str) -> bool {
        self.storage.exists(self.user(), path_type, filename).await
    }

    pub async fn local_path(
        &self,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<LocalPath> {
        self.storage
            .local_path(self.user(), path_type, filename)
            .await
    }

    pub fn local_tempfile(
        &self,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<LocalTempfile<'_>> {
        self.storage.local_tempfile(self.user(), path_type, filename)
    }

    pub fn resolve_display_path(
        &self,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<String> {
        self.storage
            .resolve_display_path(self.user(), path_type, filename)
    }
}

impl fmt::Debug for StorageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageScope")
            .field("backend", &self.storage.backend_type())
            .field("user", &self.user)
            .finish()
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::{LocalStorage, StorageError};
    use http::HeaderValue;
    use sanzaru_core::FORWARDED_EMAIL_HEADER;
    use std::collections::HashMap;

    async fn local_scope(dir: &std::path::Path, user: Option<UserContext>) -> StorageScope {
        let storage = LocalStorage::new(HashMap::from([(PathType::Reference, dir.to_path_buf())]))
            .await
            .unwrap();
        StorageScope::new(Arc::new(storage), user)
    }

    #[tokio::test]
    async fn test_scope_forwards_operations() {
        let dir = tempfile::tempdir().unwrap();
        let scope = local_scope(dir.path(), None).await;

        scope
            .write(PathType::Reference, "cat.png", b"meow".to_vec())
            .await
            .unwrap();
        assert!(scope.exists(PathType::Reference, "cat.png").await);
        assert_eq!(scope.read(PathType::Reference, "cat.png").await.unwrap(), b"meow");
        assert_eq!(
            scope
                .read_range(PathType::Reference, "cat.png", 1, 2)
                .await
                .unwrap(),
            b"eo"
        );
        assert_eq!(scope.stat(PathType::Reference, "cat.png").await.unwrap().size_bytes, 4);

        let listed = scope
            .list_files(PathType::Reference, "*.png", None)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(scope.backend_type(), StorageBackend::Local);
    }

    #[tokio::test]
    async fn test_scope_from_headers() {
        let dir = tempfile::tempdir().unwrap();
        let storage = local_scope(dir.path(), None).await.storage().clone();

        let mut headers = HeaderMap::new();
        let scope = StorageScope::from_headers(storage.clone(), &headers).unwrap();
        assert!(scope.user().is_none());

        headers.insert(
            FORWARDED_EMAIL_HEADER,
            HeaderValue::from_static("Jane.Doe@example.com"),
        );
        let scope = StorageScope::from_headers(storage.clone(), &headers).unwrap();
        assert_eq!(scope.user().unwrap().email(), "Jane.Doe@example.com");

        headers.insert(FORWARDED_EMAIL_HEADER, HeaderValue::from_static("no-at-sign"));
        let result = StorageScope::from_headers(storage, &headers);
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
    }
}
