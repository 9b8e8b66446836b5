//! Model derivative service.
//!
//! Manifests, metadata and property trees are produced asynchronously; the service
//! answers "202 Accepted" until they are ready, so those requests are re-issued until
//! a final response arrives.

use crate::client::{Payload, RequestExecutor, RequestSpec};
use crate::errors::{ForgeError, ForgeResult};
use crate::transport::encode_component as enc;
use crate::types::{DerivativeFormats, DerivativeJob, DerivativeOutputType, Region};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Root path of the model derivative API.
pub const ROOT_PATH: &str = "/modelderivative/v2";

/// Scopes for read operations.
pub const READ_SCOPES: &[&str] = &["data:read"];

/// Scopes for write operations.
pub const WRITE_SCOPES: &[&str] = &["data:read", "data:write", "data:create"];

#[derive(Deserialize)]
struct FormatsResponse {
    formats: DerivativeFormats,
}

/// Service for model translation.
pub struct ModelDerivativeService {
    executor: Arc<RequestExecutor>,
}

impl ModelDerivativeService {
    /// Creates a new model derivative service.
    pub(crate) fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Path of a design data resource, with the regional prefix for EMEA.
    fn design_data(&self, urn: &str, suffix: &str) -> String {
        let region = match self.executor.region() {
            Region::Emea => "/regions/eu",
            Region::Us => "",
        };
        format!("{}{}/designdata/{}{}", ROOT_PATH, region, enc(urn), suffix)
    }

    async fn poll(&self, path: String) -> ForgeResult<Value> {
        self.executor
            .execute(RequestSpec::get(path).scopes(READ_SCOPES).repeat_on_processing())
            .await?
            .into_json()
    }

    /// Lists supported translation formats: output format mapped to input formats.
    pub async fn formats(&self) -> ForgeResult<DerivativeFormats> {
        let path = format!("{}/designdata/formats", ROOT_PATH);
        let response: FormatsResponse = self
            .executor
            .execute_json(RequestSpec::get(path).scopes(READ_SCOPES))
            .await?;
        Ok(response.formats)
    }

    /// Submits a translation job for a base64-encoded URN.
    pub async fn submit_job(&self, urn: &str, outputs: &[DerivativeOutputType]) -> ForgeResult<DerivativeJob> {
        if urn.is_empty() {
            return Err(ForgeError::request("urn is required"));
        }
        let payload = Payload::json(&json!({
            "input": { "urn": urn },
            "output": { "formats": outputs },
        }))?;
        let path = format!("{}/designdata/job", ROOT_PATH);

        self.executor
            .execute_json(RequestSpec::post(path).payload(payload).scopes(WRITE_SCOPES))
            .await
    }

    /// Gets the derivative manifest, waiting while it is being generated.
    pub async fn get_manifest(&self, urn: &str) -> ForgeResult<Value> {
        self.poll(self.design_data(urn, "/manifest")).await
    }

    /// Gets the list of viewables, waiting while it is being generated.
    pub async fn get_metadata(&self, urn: &str) -> ForgeResult<Value> {
        self.poll(self.design_data(urn, "/metadata")).await
    }

    /// Gets the object tree of a viewable.
    pub async fn get_viewable_tree(&self, urn: &str, guid: &str) -> ForgeResult<Value> {
        self.poll(self.design_data(urn, &format!("/metadata/{}", enc(guid)))).await
    }

    /// Gets the properties of all objects of a viewable.
    pub async fn get_viewable_properties(&self, urn: &str, guid: &str) -> ForgeResult<Value> {
        self.poll(self.design_data(urn, &format!("/metadata/{}/properties?forceget=true", enc(guid))))
            .await
    }
}
