#[cfg(feature = "storage-databricks")]
use crate::DatabricksStorage;
#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use sanzaru_core::StorageConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
///
/// Call once at startup and share the returned handle; each call builds a new
/// backend with its own HTTP client and token cache. An unknown
/// `STORAGE_BACKEND` value is reported here as `ConfigError`.
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    let backend = config
        .backend()
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;

    let storage: Arc<dyn Storage> = match backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => Arc::new(LocalStorage::from_config(&config.local).await?),

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => {
            return Err(StorageError::ConfigError(
                "Local storage backend not available (storage-local feature not enabled)"
                    .to_string(),
            ))
        }

        #[cfg(feature = "storage-databricks")]
        StorageBackend::Databricks => {
            Arc::new(DatabricksStorage::from_config(&config.databricks)?)
        }

        #[cfg(not(feature = "storage-databricks"))]
        StorageBackend::Databricks => {
            return Err(StorageError::ConfigError(
                "Databricks storage backend not available (storage-databricks feature not enabled)"
                    .to_string(),
            ))
        }
    };

    tracing::info!(backend = %backend, "Storage backend initialized");
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_backend_is_config_error() {
        let config = StorageConfig {
            storage_backend: "s3".to_string(),
            ..Default::default()
        };
        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(ref m)) if m.contains("s3")));
    }

    #[cfg(feature = "storage-local")]
    #[tokio::test]
    async fn test_local_backend_selected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorageConfig::default();
        config.local.media_root = Some(dir.path().to_path_buf());

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }

    #[cfg(feature = "storage-databricks")]
    #[tokio::test]
    async fn test_databricks_backend_selected() {
        let mut config = StorageConfig {
            storage_backend: "Databricks".to_string(),
            ..Default::default()
        };
        config.databricks.host = Some("adb-1.azuredatabricks.net".to_string());
        config.databricks.client_id = Some("id".to_string());
        config.databricks.client_secret = Some("secret".to_string());
        config.databricks.volume_path = Some("main/media/vol".to_string());

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Databricks);
    }

    #[cfg(feature = "storage-databricks")]
    #[tokio::test]
    async fn test_databricks_without_credentials_fails() {
        let config = StorageConfig {
            storage_backend: "databricks".to_string(),
            ..Default::default()
        };
        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(ref m)) if m.contains("DATABRICKS_HOST")));
    }
}
