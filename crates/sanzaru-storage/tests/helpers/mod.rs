//! Shared fixtures for the storage integration tests.

use mockito::{Matcher, Mock, Server, ServerGuard};
use sanzaru_core::StorageConfig;
use sanzaru_storage::{create_storage, Storage};
use std::sync::Arc;
use tempfile::TempDir;

pub const VOLUME: &str = "catalog/schema/vol";
pub const FILES: &str = "/api/2.0/fs/files/Volumes/catalog/schema/vol";
pub const DIRS: &str = "/api/2.0/fs/directories/Volumes/catalog/schema/vol";

/// Local backend rooted in a unified media directory.
pub struct TestLocal {
    pub temp_dir: TempDir,
    pub storage: Arc<dyn Storage>,
}

impl TestLocal {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = StorageConfig::default();
        config.local.media_root = Some(temp_dir.path().to_path_buf());
        let storage = create_storage(&config)
            .await
            .expect("Failed to create local storage");
        Self { temp_dir, storage }
    }
}

/// Databricks backend talking to a mock workspace.
pub struct TestDatabricks {
    pub server: ServerGuard,
    pub storage: Arc<dyn Storage>,
    _token: Mock,
}

impl TestDatabricks {
    pub async fn new() -> Self {
        let mut server = Server::new_async().await;
        let token = server
            .mock("POST", "/oidc/v1/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"integration-token","expires_in":3600}"#)
            .create_async()
            .await;

        let config = StorageConfig::from_lookup(|name| match name {
            "STORAGE_BACKEND" => Some("databricks".to_string()),
            "DATABRICKS_HOST" => Some(server.url()),
            "DATABRICKS_CLIENT_ID" => Some("client".to_string()),
            "DATABRICKS_CLIENT_SECRET" => Some("secret".to_string()),
            "DATABRICKS_VOLUME_PATH" => Some(format!("/Volumes/{}", VOLUME)),
            _ => None,
        })
        .expect("Failed to build config");
        let storage = create_storage(&config)
            .await
            .expect("Failed to create Databricks storage");

        Self {
            server,
            storage,
            _token: token,
        }
    }

    /// Expect one PUT of exactly `body` and serve it back on GET.
    pub async fn mock_object(&mut self, path: &str, body: &'static str) -> (Mock, Mock) {
        let url = format!("{}/{}", FILES, path);
        let put = self
            .server
            .mock("PUT", url.as_str())
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer integration-token")
            .match_body(body)
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let get = self
            .server
            .mock("GET", url.as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        (put, get)
    }
}
