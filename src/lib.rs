//! Autodesk Forge Integration Module
//!
//! This module provides a type-safe interface to the Autodesk Forge REST APIs. A single
//! request pipeline handles 2-legged token acquisition and caching, payload encoding,
//! polling of resources that are still being generated, response decoding and error
//! classification; endpoint families are thin services on top of it.
//!
//! # Features
//!
//! - **Authentication**: 2-legged tokens cached per scope set, 3-legged code exchange
//!   and refresh, or a pre-generated static token
//! - **Data Management (OSS)**: Buckets, objects, resumable uploads, signed URLs
//! - **Model Derivative**: Translation jobs, manifests, viewable metadata and properties
//! - **Design Automation**: Engines, app bundles, activities, aliases, work items
//! - **BIM 360**: Hubs, projects, folders, items and versions
//! - **Pagination**: Lazy page iterators for `startAt` and token cursors
//!
//! # Example
//!
//! ```no_run
//! use integrations_forge::{ForgeClient, ForgeConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ForgeConfig::from_env()?;
//! let client = ForgeClient::new(config)?;
//!
//! let mut buckets = client.data_management().iterate_buckets(Some(16));
//! while let Some(page) = buckets.next_page().await? {
//!     for bucket in page {
//!         println!("{}", bucket.bucket_key);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod pagination;
pub mod resilience;
pub mod services;
pub mod transport;
pub mod types;

// Test doubles, also used by the integration tests
pub mod mocks;

// Re-exports for convenience
pub use auth::{AuthenticationClient, Credentials, ThreeLeggedToken, TwoLeggedToken};
pub use client::{ForgeClient, ForgeClientBuilder, RequestExecutor, RequestSpec};
pub use config::{ForgeConfig, ForgeConfigBuilder};
pub use errors::{ApiError, ForgeError, ForgeResult};
pub use types::Region;

/// Prelude module with commonly used types and traits.
///
/// ```no_run
/// use integrations_forge::prelude::*;
/// ```
pub mod prelude {
    // Client
    pub use crate::client::{ForgeClient, ForgeClientBuilder, ForgeResponse, Payload, RequestSpec};

    // Configuration
    pub use crate::config::{ForgeConfig, ForgeConfigBuilder};

    // Authentication
    pub use crate::auth::{AuthenticationClient, Credentials, ThreeLeggedToken, TwoLeggedToken};

    // Services
    pub use crate::services::{
        ActivityRequest, Bim360Service, DataManagementService, DesignAutomationId, DesignAutomationService,
        ModelDerivativeService,
    };

    // Common types
    pub use crate::types::{
        ActivityParam, Alias, Bucket, DataRetentionPolicy, DerivativeOutputType, ObjectDetail, Region,
        WorkItemParam, WorkItemStatus,
    };

    // Errors
    pub use crate::errors::{ApiError, ErrorBody, ForgeError, ForgeResult};

    // Pagination
    pub use crate::pagination::{PageIterator, PaginationStyle};
}
