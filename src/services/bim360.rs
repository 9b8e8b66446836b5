//! BIM 360 hubs, projects and items.
//!
//! All responses follow JSON:API; only the `data` member is returned.

use crate::client::{RequestExecutor, RequestSpec};
use crate::errors::{ForgeError, ForgeResult};
use crate::transport::encode_component as enc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Scopes for all BIM 360 operations.
pub const READ_SCOPES: &[&str] = &["data:read"];

#[derive(Deserialize)]
struct Document<T> {
    data: T,
}

/// Service for BIM 360 and A360 hubs.
pub struct Bim360Service {
    executor: Arc<RequestExecutor>,
}

impl Bim360Service {
    /// Creates a new BIM 360 service.
    pub(crate) fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    async fn data<T: DeserializeOwned>(&self, path: String) -> ForgeResult<T> {
        let document: Value = self
            .executor
            .execute(RequestSpec::get(path).scopes(READ_SCOPES))
            .await?
            .into_json()?;
        let document: Document<T> = serde_json::from_value(document)
            .map_err(|e| ForgeError::deserialization(format!("Missing or invalid data member: {}", e)))?;
        Ok(document.data)
    }

    /// Lists hubs available to the user.
    pub async fn hubs(&self) -> ForgeResult<Vec<Value>> {
        self.data("/project/v1/hubs".to_string()).await
    }

    /// Gets a hub.
    pub async fn hub(&self, id: &str) -> ForgeResult<Value> {
        self.data(format!("/project/v1/hubs/{}", enc(id))).await
    }

    /// Lists projects of a hub.
    pub async fn projects(&self, hub: &str) -> ForgeResult<Vec<Value>> {
        self.data(format!("/project/v1/hubs/{}/projects", enc(hub))).await
    }

    /// Lists top-level folders of a project.
    pub async fn folders(&self, hub: &str, project: &str) -> ForgeResult<Vec<Value>> {
        self.data(format!("/project/v1/hubs/{}/projects/{}/topFolders", enc(hub), enc(project)))
            .await
    }

    /// Lists items and folders inside a folder.
    pub async fn contents(&self, project: &str, folder: &str) -> ForgeResult<Vec<Value>> {
        self.data(format!("/data/v1/projects/{}/folders/{}/contents", enc(project), enc(folder)))
            .await
    }

    /// Lists versions of an item.
    pub async fn versions(&self, project: &str, item: &str) -> ForgeResult<Vec<Value>> {
        self.data(format!("/data/v1/projects/{}/items/{}/versions", enc(project), enc(item)))
            .await
    }

    /// Gets the latest version of an item.
    pub async fn tip(&self, project: &str, item: &str) -> ForgeResult<Value> {
        self.data(format!("/data/v1/projects/{}/items/{}/tip", enc(project), enc(item)))
            .await
    }
}
