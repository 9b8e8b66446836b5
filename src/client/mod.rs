//! Forge API client implementation.

use crate::auth::{AuthenticationClient, Clock, Credentials, SystemClock};
use crate::config::{ForgeConfig, ForgeConfigBuilder};
use crate::errors::{ForgeError, ForgeResult};
use crate::services::*;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::Region;
use std::sync::Arc;
use std::time::Duration;

mod executor;
pub use executor::{classify, decode, ForgeResponse, Payload, RequestExecutor, RequestSpec};

/// Forge API client.
///
/// This is the main entry point. All services handed out by a client share one
/// [`RequestExecutor`], and with it one token cache, so a token fetched for a set of
/// scopes by one service is reused by the others.
pub struct ForgeClient {
    executor: Arc<RequestExecutor>,
}

impl ForgeClient {
    /// Creates a new client talking to Forge over HTTPS.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use integrations_forge::{ForgeClient, ForgeConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ForgeConfig::builder()
    ///     .client_credentials("client_id", "client_secret")
    ///     .build()?;
    ///
    /// let client = ForgeClient::new(config)?;
    /// let buckets = client.data_management().list_buckets().await?;
    /// for bucket in buckets {
    ///     println!("{}", bucket.bucket_key);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: ForgeConfig) -> ForgeResult<Self> {
        let transport = ReqwestTransport::with_user_agent(&config.user_agent)
            .map_err(|e| ForgeError::configuration(format!("Failed to create transport: {}", e)))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client with a custom transport.
    pub fn with_transport(config: ForgeConfig, transport: Arc<dyn HttpTransport>) -> ForgeResult<Self> {
        Self::with_parts(config, transport, Arc::new(SystemClock))
    }

    fn with_parts(config: ForgeConfig, transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> ForgeResult<Self> {
        let executor = RequestExecutor::new(&config, transport, clock)?;
        Ok(Self {
            executor: Arc::new(executor),
        })
    }

    /// Creates a new client builder.
    pub fn builder() -> ForgeClientBuilder {
        ForgeClientBuilder::new()
    }

    // Service accessors

    /// Buckets and objects (OSS).
    pub fn data_management(&self) -> DataManagementService {
        DataManagementService::new(self.executor.clone())
    }

    /// Translation jobs, manifests and viewable metadata.
    pub fn model_derivative(&self) -> ModelDerivativeService {
        ModelDerivativeService::new(self.executor.clone())
    }

    /// Engines, app bundles, activities and work items.
    pub fn design_automation(&self) -> DesignAutomationService {
        DesignAutomationService::new(self.executor.clone())
    }

    /// Hubs, projects, folders and items.
    pub fn bim360(&self) -> Bim360Service {
        Bim360Service::new(self.executor.clone())
    }

    /// Authentication client, when the client holds client credentials.
    ///
    /// Shares the token cache used by the services.
    pub fn authentication(&self) -> Option<AuthenticationClient> {
        self.executor.authentication()
    }

    /// Replaces credentials, host and/or region for all services of this client.
    pub fn reset(&self, credentials: Option<Credentials>, host: Option<String>, region: Option<Region>) -> ForgeResult<()> {
        self.executor.reset(credentials, host, region)
    }

    /// Current host.
    pub fn host(&self) -> String {
        self.executor.host()
    }

    /// Current region.
    pub fn region(&self) -> Region {
        self.executor.region()
    }

    /// Gets the request executor (for endpoints without a service method).
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }
}

/// Builder for ForgeClient.
pub struct ForgeClientBuilder {
    config_builder: ForgeConfigBuilder,
    transport: Option<Arc<dyn HttpTransport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ForgeClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config_builder: ForgeConfig::builder(),
            transport: None,
            clock: None,
        }
    }

    /// Sets the credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config_builder = self.config_builder.credentials(credentials);
        self
    }

    /// Sets client credentials for 2-legged authentication.
    pub fn client_credentials(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.client_credentials(client_id, client_secret);
        self
    }

    /// Sets a pre-generated access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.access_token(token);
        self
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.host(host);
        self
    }

    /// Sets the region.
    pub fn region(mut self, region: Region) -> Self {
        self.config_builder = self.config_builder.region(region);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the delay between polls of a "202 Accepted" resource.
    pub fn processing_retry_delay(mut self, delay: Duration) -> Self {
        self.config_builder = self.config_builder.processing_retry_delay(delay);
        self
    }

    /// Sets the maximum number of polls; `None` polls until a final response.
    pub fn max_processing_attempts(mut self, attempts: Option<u32>) -> Self {
        self.config_builder = self.config_builder.max_processing_attempts(attempts);
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_agent(ua);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the clock used for token expiry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the client.
    pub fn build(self) -> ForgeResult<ForgeClient> {
        let config = self.config_builder.build()?;
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::with_user_agent(&config.user_agent)
                    .map_err(|e| ForgeError::configuration(format!("Failed to create transport: {}", e)))?,
            ),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        ForgeClient::with_parts(config, transport, clock)
    }
}

impl Default for ForgeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
