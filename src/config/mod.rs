//! Configuration for the Forge client.

use crate::auth::Credentials;
use crate::errors::{ConfigurationError, ForgeError, ForgeResult};
use crate::types::Region;
use std::env;
use std::time::Duration;
use url::Url;

/// Default Forge host.
pub const DEFAULT_HOST: &str = "https://developer.api.autodesk.com";

/// Default delay between requests while a job answers "202 Accepted".
pub const DEFAULT_PROCESSING_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default number of requests issued before giving up on a "202 Accepted" job.
pub const DEFAULT_MAX_PROCESSING_ATTEMPTS: u32 = 120;

/// Returns the user agent sent when none is configured.
pub fn default_user_agent() -> String {
    format!("integrations-forge/{}", env!("CARGO_PKG_VERSION"))
}

/// Configuration for the Forge client.
#[derive(Clone, Debug)]
pub struct ForgeConfig {
    /// Credentials used to authorize requests.
    pub credentials: Credentials,

    /// Forge host, without a trailing slash.
    pub host: String,

    /// Availability region.
    pub region: Region,

    /// Per-request timeout. `None` leaves the transport default in place.
    pub timeout: Option<Duration>,

    /// Delay between requests while a job is still processing.
    pub processing_retry_delay: Duration,

    /// Maximum number of requests while a job is still processing. `None` polls forever.
    pub max_processing_attempts: Option<u32>,

    /// User agent string.
    pub user_agent: String,
}

impl ForgeConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ForgeConfigBuilder {
        ForgeConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// Reads `FORGE_CLIENT_ID` and `FORGE_CLIENT_SECRET`, falling back to
    /// `FORGE_ACCESS_TOKEN` when either is missing. `FORGE_HOST` and `FORGE_REGION`
    /// are optional.
    pub fn from_env() -> ForgeResult<Self> {
        let mut builder = ForgeConfigBuilder::new();

        match (env::var("FORGE_CLIENT_ID"), env::var("FORGE_CLIENT_SECRET")) {
            (Ok(client_id), Ok(client_secret)) => {
                builder = builder.client_credentials(client_id, client_secret);
            }
            _ => {
                if let Ok(token) = env::var("FORGE_ACCESS_TOKEN") {
                    builder = builder.access_token(token);
                }
            }
        }

        if let Ok(host) = env::var("FORGE_HOST") {
            builder = builder.host(host);
        }

        if let Ok(region) = env::var("FORGE_REGION") {
            builder = builder.region(region.parse()?);
        }

        builder.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ForgeResult<()> {
        validate_host(&self.host)?;

        if let Credentials::ClientCredentials { client_id, .. } = &self.credentials {
            if client_id.is_empty() {
                return Err(ForgeError::Configuration(ConfigurationError::MissingCredentials(
                    "Client id must not be empty".to_string(),
                )));
            }
        }

        if self.max_processing_attempts == Some(0) {
            return Err(ForgeError::configuration(
                "Maximum processing attempts must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Checks that a host is an absolute http(s) URL.
pub(crate) fn validate_host(host: &str) -> ForgeResult<()> {
    let url = Url::parse(host)
        .map_err(|e| ForgeError::configuration(format!("Invalid host {}: {}", host, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ForgeError::configuration("Host must use HTTP or HTTPS"));
    }

    Ok(())
}

/// Builder for ForgeConfig.
pub struct ForgeConfigBuilder {
    credentials: Option<Credentials>,
    host: Option<String>,
    region: Region,
    timeout: Option<Duration>,
    processing_retry_delay: Duration,
    max_processing_attempts: Option<u32>,
    user_agent: Option<String>,
}

impl ForgeConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            credentials: None,
            host: None,
            region: Region::default(),
            timeout: None,
            processing_retry_delay: DEFAULT_PROCESSING_RETRY_DELAY,
            max_processing_attempts: Some(DEFAULT_MAX_PROCESSING_ATTEMPTS),
            user_agent: None,
        }
    }

    /// Sets the credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Uses client credentials (two-legged authentication).
    pub fn client_credentials(self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.credentials(Credentials::client_credentials(client_id, client_secret))
    }

    /// Uses a pre-obtained access token.
    pub fn access_token(self, token: impl Into<String>) -> Self {
        self.credentials(Credentials::token(token))
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the region.
    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the delay between requests while a job is processing.
    pub fn processing_retry_delay(mut self, delay: Duration) -> Self {
        self.processing_retry_delay = delay;
        self
    }

    /// Sets the maximum number of requests while a job is processing.
    pub fn max_processing_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_processing_attempts = attempts;
        self
    }

    /// Sets the user agent string.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ForgeResult<ForgeConfig> {
        let credentials = self.credentials.ok_or_else(|| {
            ForgeError::Configuration(ConfigurationError::MissingCredentials(
                "Client credentials or an access token are required".to_string(),
            ))
        })?;

        let host = self
            .host
            .map(|h| h.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let config = ForgeConfig {
            credentials,
            host,
            region: self.region,
            timeout: self.timeout,
            processing_retry_delay: self.processing_retry_delay,
            max_processing_attempts: self.max_processing_attempts,
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
        };

        config.validate()?;

        Ok(config)
    }
}

impl Default for ForgeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
