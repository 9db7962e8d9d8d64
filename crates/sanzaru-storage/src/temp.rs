//! Scoped local files handed out by `Storage::local_path` and
//! `Storage::local_tempfile`.
//!
//! Temporary files are owned by a [`tempfile::TempPath`], so they are removed
//! when the guard is dropped: on success, on an early `?` return, and when the
//! owning future is cancelled.

use crate::traits::{Storage, StorageResult};
use crate::{PathType, UserContext};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

const TEMP_PREFIX: &str = "sanzaru-";

/// Create an empty, uniquely named temp file whose suffix matches the
/// extension of `filename` (image libraries sniff formats from it).
pub(crate) fn create_temp(filename: &str) -> StorageResult<TempPath> {
    let suffix = Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&suffix)
        .tempfile()?;
    Ok(file.into_temp_path())
}

/// A readable local path for the duration of the guard.
pub struct LocalPath {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl LocalPath {
    /// A file that already lives on local disk; nothing is deleted on drop.
    pub(crate) fn existing(path: PathBuf) -> Self {
        Self { path, temp: None }
    }

    /// A downloaded copy, deleted on drop.
    pub(crate) fn temporary(temp: TempPath) -> Self {
        Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

impl Deref for LocalPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for LocalPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPath")
            .field("path", &self.path)
            .field("temporary", &self.is_temporary())
            .finish()
    }
}

struct PendingUpload<'a> {
    storage: &'a dyn Storage,
    user: Option<UserContext>,
    path_type: PathType,
    filename: String,
}

/// A writable local path whose contents are stored by [`LocalTempfile::commit`].
///
/// For the local backend the path is the destination itself and `commit` only
/// reports the display path. For remote backends the path is a private temp
/// file; `commit` uploads it through `Storage::write`, and the temp file is
/// removed afterwards whether or not the upload succeeded.
pub struct LocalTempfile<'a> {
    path: PathBuf,
    display_path: String,
    temp: Option<TempPath>,
    upload: Option<PendingUpload<'a>>,
}

impl<'a> LocalTempfile<'a> {
    pub(crate) fn direct(path: PathBuf) -> Self {
        let display_path = path.display().to_string();
        Self {
            path,
            display_path,
            temp: None,
            upload: None,
        }
    }

    pub(crate) fn staged(
        storage: &'a dyn Storage,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<Self> {
        // Validates the filename before anything touches the disk.
        let display_path = storage.resolve_display_path(user, path_type, filename)?;
        let temp = create_temp(filename)?;
        Ok(Self {
            path: temp.to_path_buf(),
            display_path,
            temp: Some(temp),
            upload: Some(PendingUpload {
                storage,
                user: user.cloned(),
                path_type,
                filename: filename.to_string(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the file will be visible once committed.
    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Store the written bytes and return the display path.
    pub async fn commit(mut self) -> StorageResult<String> {
        let Some(upload) = self.upload.take() else {
            return Ok(self.display_path.clone());
        };

        let data = tokio::fs::read(&self.path).await?;
        upload
            .storage
            .write(
                upload.user.as_ref(),
                upload.path_type,
                &upload.filename,
                data,
            )
            .await
    }
}

impl Drop for LocalTempfile<'_> {
    fn drop(&mut self) {
        if let Some(upload) = &self.upload {
            tracing::warn!(
                path = %self.path.display(),
                filename = %upload.filename,
                "Local tempfile dropped without commit, discarding contents"
            );
        }
    }
}

impl fmt::Debug for LocalTempfile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTempfile")
            .field("path", &self.path)
            .field("display_path", &self.display_path)
            .field("temporary", &self.is_temporary())
            .finish()
    }
}
