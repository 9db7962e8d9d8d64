use crate::filter::FileFilter;
use crate::security::{check_not_symlink, is_within, safe_basename, validate_safe_path};
use crate::temp::{LocalPath, LocalTempfile};
use crate::traits::{check_range_offset, ByteStream, Storage, StorageError, StorageResult};
use crate::{FileInfo, PathType, StorageBackend, UserContext};
use async_trait::async_trait;
use futures::StreamExt;
use sanzaru_core::{LocalPathsConfig, LocalRoot, MEDIA_PATH_VAR};
use std::collections::{HashMap, HashSet};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Local filesystem storage implementation
///
/// Each [`PathType`] maps to its own root directory. Roots are validated and
/// canonicalized once at construction; filenames are always reduced to a
/// basename directly under their root.
///
/// Local deployments are single-tenant, so the `user` argument of every
/// operation is accepted and ignored.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    roots: HashMap<PathType, PathBuf>,
}

fn not_found_or_io(err: std::io::Error, filename: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(filename.to_string())
    } else {
        StorageError::IoError(err)
    }
}

fn modified_secs(meta: &std::fs::Metadata) -> f64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Validate one configured root and return its canonical form.
async fn prepare_root(path_type: PathType, root: &LocalRoot) -> StorageResult<PathBuf> {
    let path = &root.path;
    let label = format!("{} directory", path_type);

    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.file_type().is_symlink() => {
            return Err(StorageError::ConfigError(format!(
                "{}: {} cannot be a symbolic link: {}",
                root.source_var,
                label,
                path.display()
            )));
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound && root.unified => {
            fs::create_dir_all(path).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to auto-create {} at {}: {}",
                    label,
                    path.display(),
                    e
                ))
            })?;
            tracing::info!(path = %path.display(), "Auto-created directory");
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StorageError::ConfigError(format!(
                "{}: {} does not exist: {}",
                root.source_var,
                label,
                path.display()
            )));
        }
        Err(e) => {
            return Err(StorageError::ConfigError(format!(
                "Cannot validate {} {}: {}",
                label,
                path.display(),
                e
            )));
        }
    }

    let canonical = fs::canonicalize(path).await.map_err(|e| {
        StorageError::ConfigError(format!(
            "Failed to canonicalize {} {}: {}",
            label,
            path.display(),
            e
        ))
    })?;
    if !fs::metadata(&canonical).await?.is_dir() {
        return Err(StorageError::ConfigError(format!(
            "{}: {} is not a directory: {}",
            root.source_var,
            label,
            canonical.display()
        )));
    }
    Ok(canonical)
}

impl LocalStorage {
    /// Create a new LocalStorage from explicit roots.
    ///
    /// Every root must be an existing directory and must not be a symbolic
    /// link. Path types without a root fail with `ConfigError` when used.
    pub async fn new(roots: HashMap<PathType, PathBuf>) -> StorageResult<Self> {
        let mut prepared = HashMap::with_capacity(roots.len());
        for (path_type, path) in roots {
            let root = LocalRoot {
                path,
                source_var: LocalPathsConfig::env_var(path_type),
                unified: false,
            };
            prepared.insert(path_type, prepare_root(path_type, &root).await?);
        }
        Ok(LocalStorage { roots: prepared })
    }

    /// Create a LocalStorage from `VIDEO_PATH` / `IMAGE_PATH` / `AUDIO_PATH`
    /// or the unified `SANZARU_MEDIA_PATH`, creating unified subdirectories
    /// when they are missing.
    pub async fn from_config(config: &LocalPathsConfig) -> StorageResult<Self> {
        let mut roots = HashMap::new();
        for path_type in PathType::ALL {
            if let Some(root) = config.resolve(path_type) {
                roots.insert(path_type, prepare_root(path_type, &root).await?);
            }
        }
        Ok(LocalStorage { roots })
    }

    /// Canonical root directory for `path_type`.
    pub fn root(&self, path_type: PathType) -> StorageResult<&Path> {
        self.roots.get(&path_type).map(PathBuf::as_path).ok_or_else(|| {
            StorageError::ConfigError(format!(
                "{} directory not configured. Set {} or {}",
                path_type,
                LocalPathsConfig::env_var(path_type),
                MEDIA_PATH_VAR
            ))
        })
    }

    /// Symlink check on the unresolved path, then containment validation.
    fn resolve(&self, path_type: PathType, filename: &str) -> StorageResult<PathBuf> {
        let base = self.root(path_type)?;
        let name = safe_basename(filename)?;
        check_not_symlink(&base.join(name), &format!("{} file", path_type))?;
        validate_safe_path(base, filename, true)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<Vec<u8>> {
        let path = self.resolve(path_type, filename)?;
        let start = Instant::now();

        let data = fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(e, filename))?;

        tracing::info!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read successful"
        );

        Ok(data)
    }

    async fn read_range(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
        offset: i64,
        length: u64,
    ) -> StorageResult<Vec<u8>> {
        let offset = check_range_offset(offset)?;
        let path = self.resolve(path_type, filename)?;

        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(e, filename))?;
        if length == 0 {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let mut data = Vec::new();
        file.take(length).read_to_end(&mut data).await?;
        Ok(data)
    }

    async fn write(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
        data: Vec<u8>,
    ) -> StorageResult<String> {
        let path = self.resolve(path_type, filename)?;
        let start = Instant::now();

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        tracing::info!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(path.display().to_string())
    }

    async fn write_stream(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
        mut chunks: ByteStream,
    ) -> StorageResult<String> {
        let path = self.resolve(path_type, filename)?;
        let start = Instant::now();

        let mut file = fs::File::create(&path).await?;
        let mut written = 0usize;
        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    if let Err(remove_err) = fs::remove_file(&path).await {
                        tracing::warn!(
                            path = %path.display(),
                            error = %remove_err,
                            "Failed to remove partial file"
                        );
                    }
                    return Err(e);
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.sync_all().await?;

        tracing::info!(
            path = %path.display(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream write successful"
        );

        Ok(path.display().to_string())
    }

    async fn list_files(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        pattern: &str,
        extensions: Option<&HashSet<String>>,
    ) -> StorageResult<Vec<FileInfo>> {
        let base = self.root(path_type)?;
        let filter = FileFilter::new(pattern, extensions)?;

        let mut results = Vec::new();
        let mut entries = fs::read_dir(base).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(path = %path.display(), "Skipping non UTF-8 filename");
                continue;
            };

            let meta = match fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            if !filter.matches(&name) {
                continue;
            }
            if !is_within(base, &path) {
                tracing::debug!(path = %path.display(), "Skipping file outside base path");
                continue;
            }

            results.push(FileInfo::new(name, meta.len(), modified_secs(&meta)));
        }

        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    async fn stat(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<FileInfo> {
        let path = self.resolve(path_type, filename)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(e, filename))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(filename.to_string()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(FileInfo::new(name, meta.len(), modified_secs(&meta)))
    }

    async fn exists(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> bool {
        match self.resolve(path_type, filename) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn local_path(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<LocalPath> {
        let path = self.resolve(path_type, filename)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(filename.to_string()));
        }
        Ok(LocalPath::existing(path))
    }

    fn local_tempfile(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<LocalTempfile<'_>> {
        let path = self.resolve(path_type, filename)?;
        Ok(LocalTempfile::direct(path))
    }

    fn resolve_display_path(
        &self,
        _user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<String> {
        Ok(self.resolve(path_type, filename)?.display().to_string())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
