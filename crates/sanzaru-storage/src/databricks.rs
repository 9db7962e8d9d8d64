//! Databricks Unity Catalog Volumes backend.
//!
//! Files are read and written through the Files API
//! (`/api/2.0/fs/files/Volumes/...`) and listed through the Directories API
//! (`/api/2.0/fs/directories/Volumes/...`). Requests authenticate with an
//! OAuth client-credentials token that is cached and refreshed shortly
//! before it expires.
//!
//! When a [`UserContext`] is supplied, every path gains the user's slug as a
//! prefix under the volume root:
//! `/Volumes/{volume}/{slug}/{subdir}/{filename}`.

use crate::filter::FileFilter;
use crate::temp::{create_temp, LocalPath, LocalTempfile};
use crate::traits::{
    check_range_offset, slice_range, ByteStream, Storage, StorageError, StorageResult,
};
use crate::{FileInfo, PathType, StorageBackend, UserContext};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use sanzaru_core::DatabricksConfig;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Refresh this long before the token's nominal expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;
const MAX_TOKEN_LIFETIME_SECS: u64 = 24 * 3600;

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize, Default)]
struct DirectoryListing {
    #[serde(default)]
    contents: Vec<DirectoryEntry>,
}

#[derive(Deserialize)]
struct DirectoryEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_directory: bool,
    #[serde(default)]
    file_size: u64,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    last_modified: i64,
}

/// Reduce a caller-supplied filename to a single safe path segment.
///
/// There are no symlinks to check remotely, so the name itself is the only
/// thing to validate: it is cut to its last `/` or `\` separated segment and
/// rejected if empty, `.`, `..`, or if the input contains `..` anywhere.
fn sanitize_filename(filename: &str) -> StorageResult<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidArgument(format!(
            "Invalid filename: {:?}",
            filename
        )));
    }
    if filename.contains("..") {
        return Err(StorageError::InvalidArgument(format!(
            "Invalid filename (path traversal detected): {}",
            filename
        )));
    }
    Ok(name)
}

/// Percent-encode each segment of a `/`-separated path.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Databricks Volumes storage implementation
pub struct DatabricksStorage {
    host: String,
    client_id: String,
    client_secret: String,
    volume_path: String,
    subdirs: HashMap<PathType, String>,
    /// `None` once [`Storage::close`] has run.
    client: RwLock<Option<Client>>,
    /// Held across the token exchange so concurrent callers share one refresh.
    token: Mutex<Option<CachedToken>>,
}

impl DatabricksStorage {
    /// Create a new DatabricksStorage instance
    ///
    /// Fails with `ConfigError` listing every missing required setting.
    pub fn from_config(config: &DatabricksConfig) -> StorageResult<Self> {
        let missing = config.missing_required();
        if !missing.is_empty() {
            let details = missing
                .iter()
                .map(|(name, description)| format!("  - {}: {}", name, description))
                .collect::<Vec<_>>()
                .join("\n");
            return Err(StorageError::ConfigError(format!(
                "Missing required Databricks environment variable(s):\n{}",
                details
            )));
        }

        let (Some(host), Some(client_id), Some(client_secret), Some(volume_path)) = (
            config.normalized_host(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.normalized_volume_path(),
        ) else {
            return Err(StorageError::ConfigError(
                "Incomplete Databricks configuration".to_string(),
            ));
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| {
                StorageError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let subdirs = PathType::ALL
            .into_iter()
            .map(|path_type| {
                let subdir = config.subdir(path_type).trim_matches('/').to_string();
                (path_type, subdir)
            })
            .collect();

        tracing::info!(
            host = %host,
            volume_path = %volume_path,
            "Databricks storage initialized"
        );

        Ok(DatabricksStorage {
            host,
            client_id,
            client_secret,
            volume_path,
            subdirs,
            client: RwLock::new(Some(client)),
            token: Mutex::new(None),
        })
    }

    fn client(&self) -> StorageResult<Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                StorageError::TransportError("Databricks storage backend is closed".to_string())
            })
    }

    /// Return a bearer token, exchanging client credentials when the cached
    /// one is missing or within the refresh margin.
    async fn access_token(&self, client: &Client) -> StorageResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let requested_at = Instant::now();
        let response = client
            .post(format!("{}/oidc/v1/token", self.host))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", "all-apis"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(status = %status, "Databricks OAuth token request failed");
            return Err(StorageError::TransportError(format!(
                "OAuth token request failed: {} - {}",
                status, error_text
            )));
        }

        let payload: TokenResponse = response.json().await?;
        let lifetime = payload
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
            .min(MAX_TOKEN_LIFETIME_SECS);
        tracing::debug!(expires_in_secs = lifetime, "Acquired Databricks OAuth token");

        *cached = Some(CachedToken {
            access_token: payload.access_token.clone(),
            expires_at: requested_at + Duration::from_secs(lifetime),
        });
        Ok(payload.access_token)
    }

    async fn request(&self, method: Method, url: &str) -> StorageResult<RequestBuilder> {
        let client = self.client()?;
        let token = self.access_token(&client).await?;
        Ok(client.request(method, url).bearer_auth(token))
    }

    /// `{volume}/[{slug}/]{subdir}` without a leading slash.
    fn relative_dir(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
    ) -> StorageResult<String> {
        let subdir = self
            .subdirs
            .get(&path_type)
            .map(String::as_str)
            .unwrap_or_else(|| path_type.default_subdir());
        match user {
            Some(user) => Ok(format!("{}/{}/{}", self.volume_path, user.slug()?, subdir)),
            None => Ok(format!("{}/{}", self.volume_path, subdir)),
        }
    }

    fn volume_file_path(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<String> {
        let name = sanitize_filename(filename)?;
        Ok(format!(
            "/Volumes/{}/{}",
            self.relative_dir(user, path_type)?,
            name
        ))
    }

    fn file_url(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<String> {
        let path = self.volume_file_path(user, path_type, filename)?;
        Ok(format!("{}/api/2.0/fs/files{}", self.host, encode_path(&path)))
    }

    fn dir_url(&self, user: Option<&UserContext>, path_type: PathType) -> StorageResult<String> {
        let path = format!("/Volumes/{}", self.relative_dir(user, path_type)?);
        Ok(format!(
            "{}/api/2.0/fs/directories{}",
            self.host,
            encode_path(&path)
        ))
    }

    /// Map 404 to `NotFound` and any other failure status to `TransportError`.
    async fn check_status(
        response: Response,
        operation: &str,
        filename: &str,
    ) -> StorageResult<Response> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(filename.to_string()));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                status = %status,
                operation = operation,
                filename = %filename,
                "Databricks request failed"
            );
            return Err(StorageError::TransportError(format!(
                "Databricks {} failed for {}: {} - {}",
                operation, filename, status, error_text
            )));
        }
        Ok(response)
    }

    async fn head(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<Response> {
        let url = self.file_url(user, path_type, filename)?;
        let response = self.request(Method::HEAD, &url).await?.send().await?;
        Ok(response)
    }
}

impl fmt::Debug for DatabricksStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabricksStorage")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("volume_path", &self.volume_path)
            .field("subdirs", &self.subdirs)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Storage for DatabricksStorage {
    async fn read(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<Vec<u8>> {
        let url = self.file_url(user, path_type, filename)?;
        let start = Instant::now();

        let response = self.request(Method::GET, &url).await?.send().await?;
        let response = Self::check_status(response, "read", filename).await?;
        let data = response.bytes().await?.to_vec();

        tracing::info!(
            url = %url,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Databricks storage read successful"
        );

        Ok(data)
    }

    async fn read_range(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
        offset: i64,
        length: u64,
    ) -> StorageResult<Vec<u8>> {
        let offset = check_range_offset(offset)?;
        let url = self.file_url(user, path_type, filename)?;
        if length == 0 {
            return Ok(Vec::new());
        }

        let end = offset.saturating_add(length - 1);
        let response = self
            .request(Method::GET, &url)
            .await?
            .header(RANGE, format!("bytes={}-{}", offset, end))
            .send()
            .await?;

        // Offset at or past the end of the object.
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(Vec::new());
        }
        let response = Self::check_status(response, "read_range", filename).await?;
        let partial = response.status() == StatusCode::PARTIAL_CONTENT;
        let body = response.bytes().await?;

        if partial {
            Ok(body.to_vec())
        } else {
            // Server ignored the Range header and sent the whole object.
            Ok(slice_range(&body, offset, length).to_vec())
        }
    }

    async fn write(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
        data: Vec<u8>,
    ) -> StorageResult<String> {
        let display_path = self.volume_file_path(user, path_type, filename)?;
        let url = self.file_url(user, path_type, filename)?;
        let size = data.len();
        let start = Instant::now();

        let response = self
            .request(Method::PUT, &url)
            .await?
            .query(&[("overwrite", "true")])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        Self::check_status(response, "write", filename).await?;

        tracing::info!(
            path = %display_path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Databricks storage write successful"
        );

        Ok(display_path)
    }

    async fn write_stream(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
        mut chunks: ByteStream,
    ) -> StorageResult<String> {
        sanitize_filename(filename)?;

        // The Files API needs the complete body up front, so the whole
        // stream is buffered in memory before the PUT.
        let mut buffer = Vec::new();
        while let Some(chunk) = chunks.next().await {
            buffer.extend_from_slice(&chunk?);
        }

        self.write(user, path_type, filename, buffer).await
    }

    async fn list_files(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        pattern: &str,
        extensions: Option<&HashSet<String>>,
    ) -> StorageResult<Vec<FileInfo>> {
        let filter = FileFilter::new(pattern, extensions)?;
        let url = self.dir_url(user, path_type)?;

        let response = self.request(Method::GET, &url).await?.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            // Tenant directories only appear after the first write.
            tracing::debug!(url = %url, "Directory not found, listing as empty");
            return Ok(Vec::new());
        }
        let response = Self::check_status(response, "list", path_type.as_str()).await?;
        let listing: DirectoryListing = response.json().await?;

        let mut results: Vec<FileInfo> = listing
            .contents
            .into_iter()
            .filter(|entry| !entry.is_directory && !entry.name.is_empty())
            .filter(|entry| filter.matches(&entry.name))
            .map(|entry| {
                FileInfo::new(
                    entry.name,
                    entry.file_size,
                    entry.last_modified as f64 / 1000.0,
                )
            })
            .collect();

        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    async fn stat(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<FileInfo> {
        let name = sanitize_filename(filename)?;
        let response = self.head(user, path_type, filename).await?;
        let response = Self::check_status(response, "stat", filename).await?;

        let size_bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);

        // HEAD carries no modification time.
        Ok(FileInfo::new(name, size_bytes, 0.0))
    }

    async fn exists(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> bool {
        match self.head(user, path_type, filename).await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!(error = %e, filename = %filename, "exists check failed");
                false
            }
        }
    }

    async fn local_path(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<LocalPath> {
        let data = self.read(user, path_type, filename).await?;
        let temp = create_temp(sanitize_filename(filename)?)?;
        tokio::fs::write(&temp, &data).await?;
        Ok(LocalPath::temporary(temp))
    }

    fn local_tempfile(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<LocalTempfile<'_>> {
        LocalTempfile::staged(self, user, path_type, filename)
    }

    fn resolve_display_path(
        &self,
        user: Option<&UserContext>,
        path_type: PathType,
        filename: &str,
    ) -> StorageResult<String> {
        self.volume_file_path(user, path_type, filename)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Databricks
    }

    async fn close(&self) {
        let client = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.token.lock().await.take();
        if client.is_some() {
            tracing::info!(host = %self.host, "Databricks storage closed");
        }
    }
}
