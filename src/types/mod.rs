//! Type definitions for Forge APIs.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Forge availability region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Region {
    /// United States.
    #[default]
    #[serde(rename = "US")]
    Us,
    /// Europe, Middle East and Africa.
    #[serde(rename = "EMEA")]
    Emea,
}

impl Region {
    /// Returns the region code used in query strings and headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Emea => "EMEA",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Ok(Region::Us),
            "EMEA" | "EU" => Ok(Region::Emea),
            _ => Err(ConfigurationError::UnknownRegion(s.to_string())),
        }
    }
}

/// Data retention policy for objects uploaded to a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataRetentionPolicy {
    /// Objects are kept for 24 hours.
    Transient,
    /// Objects are kept for 30 days.
    Temporary,
    /// Objects are kept until deleted.
    Persistent,
}

// Data management (OSS)

/// Bucket summary returned by bucket listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket key.
    pub bucket_key: String,
    /// Creation timestamp (milliseconds since epoch).
    pub created_date: i64,
    /// Retention policy.
    pub policy_key: DataRetentionPolicy,
}

/// Bucket permission entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketPermission {
    /// Application or user id.
    pub auth_id: String,
    /// Access level.
    pub access: String,
}

/// Bucket details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDetail {
    /// Bucket key.
    pub bucket_key: String,
    /// Owning application id.
    pub bucket_owner: String,
    /// Creation timestamp (milliseconds since epoch).
    pub created_date: i64,
    /// Granted permissions.
    #[serde(default)]
    pub permissions: Vec<BucketPermission>,
    /// Retention policy.
    pub policy_key: DataRetentionPolicy,
}

/// Object stored in a bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDetail {
    /// Bucket key.
    pub bucket_key: String,
    /// Object key (name).
    pub object_key: String,
    /// Object URN.
    pub object_id: String,
    /// SHA-1 of the content.
    #[serde(default)]
    pub sha1: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Download location.
    #[serde(default)]
    pub location: Option<String>,
    /// Content type, when known.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Signed URL resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrl {
    /// The signed URL.
    pub signed_url: String,
    /// Expiration timestamp.
    #[serde(default)]
    pub expiration: Option<i64>,
    /// Whether the URL can be used once only.
    #[serde(default)]
    pub single_use: Option<bool>,
}

/// Byte range already received by a resumable upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumableUploadRange {
    /// First byte offset (inclusive).
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

// Model derivative

/// Requested translation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivativeOutputType {
    /// Output format, for example `svf`.
    #[serde(rename = "type")]
    pub format: String,
    /// Requested views, for example `["2d", "3d"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<String>,
}

impl DerivativeOutputType {
    /// SVF output with 2D and 3D views.
    pub fn svf() -> Self {
        Self {
            format: "svf".to_string(),
            views: vec!["2d".to_string(), "3d".to_string()],
        }
    }
}

/// Supported translation formats: output format mapped to accepted input formats.
pub type DerivativeFormats = HashMap<String, Vec<String>>;

/// Submitted translation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivativeJob {
    /// Result, for example `created` or `success`.
    pub result: String,
    /// Source URN.
    pub urn: String,
    /// Accepted outputs.
    #[serde(default)]
    pub accepted_jobs: Option<Value>,
}

// Design automation

/// Alias of an app bundle or activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alias {
    /// Alias name.
    pub id: String,
    /// Version the alias points to.
    pub version: u32,
    /// Receiver, when shared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

/// Design automation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineDetail {
    /// Fully qualified engine id, for example `Autodesk.AutoCAD+23`.
    pub id: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Product version.
    #[serde(default)]
    pub product_version: Option<String>,
    /// Engine version.
    #[serde(default)]
    pub version: Option<u32>,
}

/// Upload target for a new app bundle package.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParameters {
    /// URL to POST the package to.
    pub endpoint_url: String,
    /// Form fields to send along with the package.
    #[serde(default)]
    pub form_data: HashMap<String, String>,
}

/// App bundle (a version of it).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppBundleDetail {
    /// Bundle id.
    pub id: String,
    /// Engine id.
    pub engine: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Version number.
    pub version: u32,
    /// Download URL of the package, once uploaded.
    #[serde(default)]
    pub package: Option<String>,
    /// Where to upload the package; returned on creation.
    #[serde(default)]
    pub upload_parameters: Option<UploadParameters>,
}

/// Activity (a version of it).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetail {
    /// Activity id.
    pub id: String,
    /// Engine id.
    pub engine: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Version number.
    pub version: u32,
    /// Command line, a string or a list of strings.
    #[serde(default)]
    pub command_line: Value,
    /// Parameters by name.
    #[serde(default)]
    pub parameters: Value,
    /// Fully qualified app bundle ids.
    #[serde(default)]
    pub appbundles: Vec<String>,
    /// Settings, such as the script.
    #[serde(default)]
    pub settings: Option<Value>,
}

/// Work item status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemStatus {
    /// Work item id.
    pub id: String,
    /// Status, for example `pending`, `inprogress` or `success`.
    pub status: String,
    /// Progress description.
    #[serde(default)]
    pub progress: Option<String>,
    /// URL of the execution report.
    #[serde(default)]
    pub report_url: Option<String>,
    /// Timing statistics.
    #[serde(default)]
    pub stats: Option<Value>,
}

/// Activity input or output parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityParam {
    /// Parameter name.
    pub name: String,
    /// HTTP verb; defaults to `get` for inputs and `put` for outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Local file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
    /// Whether the parameter is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Whether the parameter is a zip archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<bool>,
    /// Whether the parameter is fetched on demand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ondemand: Option<bool>,
}

impl ActivityParam {
    /// Creates a parameter with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Work item input or output argument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemParam {
    /// Argument name, matching an activity parameter.
    pub name: String,
    /// URL to download from or upload to.
    pub url: String,
    /// HTTP verb; defaults to `get` for inputs and `put` for outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    /// Local file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
    /// Whether the argument is optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    /// Path inside a zip archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_in_zip: Option<String>,
    /// Extra headers for the transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl WorkItemParam {
    /// Creates an argument with a name and URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}
