//! Data management (OSS) service.
//!
//! Buckets and objects of the Object Storage Service:
//! - bucket listing, details and creation
//! - object listing, upload (simple and resumable), download and deletion
//! - signed URLs

use super::require;
use crate::client::{ForgeResponse, Payload, RequestExecutor, RequestSpec};
use crate::errors::{ForgeResult, ResponseError};
use crate::pagination::{PageIterator, PaginationStyle};
use crate::transport::encode_component as enc;
use crate::types::*;
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Root path of the OSS API.
pub const ROOT_PATH: &str = "/oss/v2";

/// Scopes for read operations.
pub const READ_SCOPES: &[&str] = &["bucket:read", "data:read"];

/// Scopes for write operations.
pub const WRITE_SCOPES: &[&str] = &["bucket:create", "data:write"];

/// Default page size for bucket and object iteration.
pub const DEFAULT_PAGE_SIZE: u32 = 16;

/// Content type used for resumable uploads when none is given.
pub const DEFAULT_RESUMABLE_CONTENT_TYPE: &str = "application/stream";

/// Service for OSS buckets and objects.
pub struct DataManagementService {
    executor: Arc<RequestExecutor>,
}

impl DataManagementService {
    /// Creates a new data management service.
    pub(crate) fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    fn pages<T: serde::de::DeserializeOwned>(&self, endpoint: String, limit: Option<u32>) -> PageIterator<T> {
        PageIterator::new(
            self.executor.clone(),
            format!("{}{}", ROOT_PATH, endpoint),
            READ_SCOPES,
            PaginationStyle::StartAt { limit },
        )
    }

    fn buckets_endpoint(&self) -> String {
        format!("/buckets?region={}", self.executor.region())
    }

    fn objects_endpoint(bucket: &str, begins_with: Option<&str>) -> String {
        let mut endpoint = format!("/buckets/{}/objects", enc(bucket));
        if let Some(prefix) = begins_with.filter(|p| !p.is_empty()) {
            endpoint.push_str(&format!("?beginsWith={}", enc(prefix)));
        }
        endpoint
    }

    // Buckets

    /// Iterates over buckets of the current region in pages of `limit` (1-100).
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use integrations_forge::*;
    /// # async fn example(client: ForgeClient) -> ForgeResult<()> {
    /// let mut pages = client.data_management().iterate_buckets(Some(16));
    /// while let Some(buckets) = pages.next_page().await? {
    ///     for bucket in buckets {
    ///         println!("{}", bucket.bucket_key);
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn iterate_buckets(&self, limit: Option<u32>) -> PageIterator<Bucket> {
        self.pages(self.buckets_endpoint(), Some(limit.unwrap_or(DEFAULT_PAGE_SIZE)))
    }

    /// Lists all buckets of the current region.
    pub async fn list_buckets(&self) -> ForgeResult<Vec<Bucket>> {
        self.pages(self.buckets_endpoint(), None).collect_all().await
    }

    /// Gets details of a bucket.
    pub async fn get_bucket_details(&self, bucket: &str) -> ForgeResult<BucketDetail> {
        require("bucket", bucket)?;
        let path = format!("{}/buckets/{}/details", ROOT_PATH, enc(bucket));
        self.executor
            .execute_json(RequestSpec::get(path).scopes(READ_SCOPES))
            .await
    }

    /// Creates a bucket in the current region.
    pub async fn create_bucket(&self, bucket: &str, policy: DataRetentionPolicy) -> ForgeResult<BucketDetail> {
        require("bucket", bucket)?;
        let region = self.executor.region();
        debug!(bucket = %bucket, region = %region, "Creating bucket");

        let payload = Payload::json(&json!({ "bucketKey": bucket, "policyKey": policy }))?;
        let spec = RequestSpec::post(format!("{}/buckets", ROOT_PATH))
            .payload(payload)
            .header("x-ads-region", region.as_str())
            .scopes(WRITE_SCOPES);

        self.executor.execute_json(spec).await
    }

    // Objects

    /// Iterates over objects of a bucket in pages of `limit` (1-100), optionally
    /// filtered by key prefix.
    pub fn iterate_objects(
        &self,
        bucket: &str,
        limit: Option<u32>,
        begins_with: Option<&str>,
    ) -> ForgeResult<PageIterator<ObjectDetail>> {
        require("bucket", bucket)?;
        Ok(self.pages(
            Self::objects_endpoint(bucket, begins_with),
            Some(limit.unwrap_or(DEFAULT_PAGE_SIZE)),
        ))
    }

    /// Lists all objects of a bucket, optionally filtered by key prefix.
    pub async fn list_objects(&self, bucket: &str, begins_with: Option<&str>) -> ForgeResult<Vec<ObjectDetail>> {
        require("bucket", bucket)?;
        self.pages(Self::objects_endpoint(bucket, begins_with), None)
            .collect_all()
            .await
    }

    /// Uploads an object in a single request.
    pub async fn upload_object(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        data: impl Into<Bytes>,
    ) -> ForgeResult<ObjectDetail> {
        require("bucket", bucket)?;
        require("name", name)?;
        let path = format!("{}/buckets/{}/objects/{}", ROOT_PATH, enc(bucket), enc(name));
        let spec = RequestSpec::put(path)
            .payload(Payload::buffer(data))
            .header("Content-Type", content_type)
            .scopes(WRITE_SCOPES);

        self.executor.execute_json(spec).await
    }

    /// Uploads one chunk of a resumable upload session.
    ///
    /// `byte_offset` is the position of `data` in the target object of `total_bytes`.
    /// Intermediate chunks are answered with "202 Accepted" and an empty body; the last
    /// one with the object details.
    #[allow(clippy::too_many_arguments)]
    pub async fn upload_object_resumable(
        &self,
        bucket: &str,
        name: &str,
        data: impl Into<Bytes>,
        byte_offset: u64,
        total_bytes: u64,
        session_id: &str,
        content_type: Option<&str>,
    ) -> ForgeResult<ForgeResponse> {
        require("bucket", bucket)?;
        require("name", name)?;
        require("session_id", session_id)?;

        let data = data.into();
        if data.is_empty() {
            return Err(crate::errors::ForgeError::request("Chunk must not be empty"));
        }
        let last = byte_offset + data.len() as u64 - 1;
        if last >= total_bytes {
            return Err(crate::errors::ForgeError::request(format!(
                "Chunk ends at byte {} beyond total size {}",
                last, total_bytes
            )));
        }

        let path = format!("{}/buckets/{}/objects/{}/resumable", ROOT_PATH, enc(bucket), enc(name));
        let spec = RequestSpec::put(path)
            .payload(Payload::buffer(data))
            .header("Content-Type", content_type.unwrap_or(DEFAULT_RESUMABLE_CONTENT_TYPE))
            .header("Content-Range", format!("bytes {}-{}/{}", byte_offset, last, total_bytes))
            .header("Session-Id", session_id)
            .scopes(WRITE_SCOPES);

        self.executor.execute(spec).await
    }

    /// Gets the byte ranges already received by a resumable upload session.
    pub async fn get_resumable_upload_status(
        &self,
        bucket: &str,
        name: &str,
        session_id: &str,
    ) -> ForgeResult<Vec<ResumableUploadRange>> {
        require("bucket", bucket)?;
        require("name", name)?;
        require("session_id", session_id)?;
        let path = format!(
            "{}/buckets/{}/objects/{}/status/{}",
            ROOT_PATH,
            enc(bucket),
            enc(name),
            enc(session_id)
        );
        let response = self
            .executor
            .execute_raw(RequestSpec::get(path).scopes(READ_SCOPES))
            .await?;

        let range = response
            .headers
            .get(reqwest::header::RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        parse_ranges(range)
    }

    /// Downloads the content of an object.
    pub async fn download_object(&self, bucket: &str, name: &str) -> ForgeResult<Bytes> {
        require("bucket", bucket)?;
        require("name", name)?;
        let path = format!("{}/buckets/{}/objects/{}", ROOT_PATH, enc(bucket), enc(name));
        let response = self
            .executor
            .execute_raw(RequestSpec::get(path).scopes(READ_SCOPES))
            .await?;
        Ok(response.body)
    }

    /// Gets details of an object.
    pub async fn get_object_details(&self, bucket: &str, name: &str) -> ForgeResult<ObjectDetail> {
        require("bucket", bucket)?;
        require("name", name)?;
        let path = format!("{}/buckets/{}/objects/{}/details", ROOT_PATH, enc(bucket), enc(name));
        self.executor
            .execute_json(RequestSpec::get(path).scopes(READ_SCOPES))
            .await
    }

    /// Creates a signed URL for an object. `access` defaults to `readwrite`.
    pub async fn create_signed_url(&self, bucket: &str, name: &str, access: Option<&str>) -> ForgeResult<SignedUrl> {
        require("bucket", bucket)?;
        require("name", name)?;
        let path = format!(
            "{}/buckets/{}/objects/{}/signed?access={}",
            ROOT_PATH,
            enc(bucket),
            enc(name),
            enc(access.unwrap_or("readwrite"))
        );
        let spec = RequestSpec::post(path)
            .payload(Payload::json(&json!({}))?)
            .scopes(WRITE_SCOPES);

        self.executor.execute_json(spec).await
    }

    /// Deletes an object.
    pub async fn delete_object(&self, bucket: &str, name: &str) -> ForgeResult<()> {
        require("bucket", bucket)?;
        require("name", name)?;
        let path = format!("{}/buckets/{}/objects/{}", ROOT_PATH, enc(bucket), enc(name));
        self.executor
            .execute(RequestSpec::delete(path).scopes(WRITE_SCOPES))
            .await?;
        Ok(())
    }
}

/// Parses a `Range: bytes=a-b,c-d` header.
fn parse_ranges(header: &str) -> ForgeResult<Vec<ResumableUploadRange>> {
    let unexpected = || ResponseError::UnexpectedFormat(format!("Unexpected range format: {}", header));

    let list = header.strip_prefix("bytes=").ok_or_else(unexpected)?;

    list.split(',')
        .map(|range| -> ForgeResult<ResumableUploadRange> {
            let (start, end) = range.split_once('-').ok_or_else(unexpected)?;
            if !is_digits(start) || !is_digits(end) {
                return Err(unexpected().into());
            }
            let start = start.parse().map_err(|_| unexpected())?;
            let end = end.parse().map_err(|_| unexpected())?;
            Ok(ResumableUploadRange { start, end })
        })
        .collect()
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
