//! Authentication for Forge APIs.
//!
//! Two ways of authorizing requests are supported:
//! - client credentials (two-legged), where tokens are requested on demand per scope
//!   set and cached by [`AuthenticationClient`];
//! - a pre-obtained access token (two- or three-legged), used verbatim.
//!
//! [`AuthenticationClient`] also covers the three-legged flow: building the login
//! redirect URL and exchanging the returned authorization code.
//!
//! # Example
//!
//! ```no_run
//! use integrations_forge::auth::{AuthenticationClient, scopes};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = AuthenticationClient::new("client_id", "client_secret")?;
//! let token = auth.authenticate(&[scopes::BUCKET_READ, scopes::DATA_READ], false).await?;
//! println!("{} (expires in {}s)", token.access_token, token.expires_in);
//! # Ok(())
//! # }
//! ```

mod cache;
mod clock;

pub use cache::{Expiry, Lease, TokenCache, TokenFuture};
pub use clock::{Clock, SystemClock};

use crate::config::DEFAULT_HOST;
use crate::errors::{AuthenticationError, ForgeError, ForgeResult, RequestError};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport, ReqwestTransport};
use bytes::Bytes;
use chrono::Duration;
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Root path of the authentication API.
pub const ROOT_PATH: &str = "/authentication/v1";

/// OAuth scopes used by Forge APIs.
pub mod scopes {
    /// Read bucket metadata.
    pub const BUCKET_READ: &str = "bucket:read";
    /// Create buckets.
    pub const BUCKET_CREATE: &str = "bucket:create";
    /// Update buckets.
    pub const BUCKET_UPDATE: &str = "bucket:update";
    /// Delete buckets.
    pub const BUCKET_DELETE: &str = "bucket:delete";
    /// Read data.
    pub const DATA_READ: &str = "data:read";
    /// Write data.
    pub const DATA_WRITE: &str = "data:write";
    /// Create data.
    pub const DATA_CREATE: &str = "data:create";
    /// Search data.
    pub const DATA_SEARCH: &str = "data:search";
    /// Full access to Design Automation.
    pub const CODE_ALL: &str = "code:all";
    /// Read the user profile.
    pub const USER_PROFILE_READ: &str = "user-profile:read";
}

/// Credentials a client authorizes its requests with.
#[derive(Clone)]
pub enum Credentials {
    /// Application id and secret; tokens are requested per scope set.
    ClientCredentials {
        /// Forge application client id.
        client_id: String,
        /// Forge application client secret.
        client_secret: SecretString,
    },
    /// Pre-obtained access token, sent as-is regardless of requested scopes.
    Token(SecretString),
}

impl Credentials {
    /// Client id and secret.
    pub fn client_credentials(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Credentials::ClientCredentials {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }

    /// Pre-obtained access token.
    pub fn token(token: impl Into<String>) -> Self {
        Credentials::Token(SecretString::new(token.into()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"[REDACTED]").finish(),
        }
    }
}

/// Two-legged token. `expires_in` is relative to the moment it was returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoLeggedToken {
    /// Access token.
    pub access_token: String,
    /// Seconds until expiry.
    pub expires_in: i64,
}

/// Three-legged token obtained through the authorization-code flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeLeggedToken {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Seconds until expiry.
    pub expires_in: i64,
}

/// Token endpoint of a single Forge application.
struct TokenEndpoint {
    client_id: String,
    client_secret: SecretString,
    host: String,
    transport: Arc<dyn HttpTransport>,
}

impl TokenEndpoint {
    /// POSTs a urlencoded form to `<host>/authentication/v1<endpoint>`.
    async fn post<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> ForgeResult<T> {
        let url = format!("{}{}{}", self.host, ROOT_PATH, endpoint);
        let url = Url::parse(&url).map_err(|e| RequestError::InvalidUrl(format!("{}: {}", url, e)))?;

        let body = serde_urlencoded::to_string(params)
            .map_err(|e| RequestError::ValidationError(format!("Invalid form: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        let request = HttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(Bytes::from(body)),
            timeout: None,
        };

        let response = self.transport.send(request).await?;

        if !response.status.is_success() {
            return Err(AuthenticationError::TokenRequestFailed {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            }
            .into());
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            AuthenticationError::InvalidTokenResponse(format!("Failed to parse response: {}", e)).into()
        })
    }
}

#[derive(Deserialize)]
struct ClientCredentialsResponse {
    access_token: String,
    expires_in: i64,
}

/// Client for the Forge authentication API.
///
/// Two-legged tokens are cached per scope set until they expire; concurrent requests
/// for the same scope set share a single call to the token endpoint. Clones share the
/// same cache.
#[derive(Clone)]
pub struct AuthenticationClient {
    endpoint: Arc<TokenEndpoint>,
    cache: Arc<TokenCache>,
    clock: Arc<dyn Clock>,
}

impl AuthenticationClient {
    /// Creates a client for the default host with a default reqwest transport.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> ForgeResult<Self> {
        let transport = ReqwestTransport::with_user_agent(&crate::config::default_user_agent())?;
        Ok(Self::with_transport(
            client_id,
            SecretString::new(client_secret.into()),
            DEFAULT_HOST,
            Arc::new(transport),
        ))
    }

    /// Creates a client with an explicit host and transport.
    pub fn with_transport(
        client_id: impl Into<String>,
        client_secret: SecretString,
        host: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            endpoint: Arc::new(TokenEndpoint {
                client_id: client_id.into(),
                client_secret,
                host: host.into(),
                transport,
            }),
            cache: Arc::new(TokenCache::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Forge application client id.
    pub fn client_id(&self) -> &str {
        &self.endpoint.client_id
    }

    /// Host the client talks to.
    pub fn host(&self) -> &str {
        &self.endpoint.host
    }

    /// Retrieves a two-legged token for a set of scopes.
    ///
    /// Unless `force` is set, a cached token for the same scopes is returned while it
    /// is valid, with `expires_in` recomputed against the current time.
    pub async fn authenticate(&self, scopes: &[&str], force: bool) -> ForgeResult<TwoLeggedToken> {
        let key = TokenCache::key(scopes);
        let scope = scopes.join(" ");

        let lease = self.cache.lease(&key, self.clock.now(), force, |expiry| {
            self.fetch_two_legged(scope, expiry)
        });

        let access_token = match lease.token.await {
            Ok(token) => token,
            Err(err) => {
                self.cache.evict(&key, &lease.expiry);
                return Err(err);
            }
        };

        let expires_at = lease.expiry.get().ok_or_else(|| {
            ForgeError::from(AuthenticationError::InvalidTokenResponse(
                "Token resolved without an expiry".to_string(),
            ))
        })?;
        let remaining = expires_at - self.clock.now();

        Ok(TwoLeggedToken {
            access_token,
            expires_in: remaining.num_milliseconds().div_euclid(1000),
        })
    }

    fn fetch_two_legged(&self, scope: String, expiry: Expiry) -> BoxFuture<'static, ForgeResult<String>> {
        let endpoint = self.endpoint.clone();
        let clock = self.clock.clone();

        async move {
            debug!(scope = %scope, "Requesting two-legged token");

            let response: ClientCredentialsResponse = match endpoint
                .post(
                    "/authenticate",
                    &[
                        ("client_id", endpoint.client_id.as_str()),
                        ("client_secret", endpoint.client_secret.expose_secret().as_str()),
                        ("grant_type", "client_credentials"),
                        ("scope", scope.as_str()),
                    ],
                )
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    // Expire the entry before any awaiter sees the error.
                    expiry.resolve(clock.now());
                    return Err(err);
                }
            };

            expiry.resolve(clock.now() + Duration::seconds(response.expires_in));
            info!(scope = %scope, expires_in = response.expires_in, "Issued two-legged token");

            Ok(response.access_token)
        }
        .boxed()
    }

    /// Builds the Autodesk login URL for the three-legged flow.
    pub fn get_authorize_redirect(&self, scopes: &[&str], redirect_uri: &str) -> ForgeResult<String> {
        let base = format!("{}{}/authorize", self.endpoint.host, ROOT_PATH);
        let scope = scopes.join(" ");
        let url = Url::parse_with_params(
            &base,
            &[
                ("response_type", "code"),
                ("client_id", self.endpoint.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
            ],
        )
        .map_err(|e| RequestError::InvalidUrl(format!("{}: {}", base, e)))?;

        Ok(url.into())
    }

    /// Exchanges an authorization code for a three-legged token. Never cached.
    pub async fn get_token(&self, code: &str, redirect_uri: &str) -> ForgeResult<ThreeLeggedToken> {
        debug!("Exchanging authorization code");
        self.endpoint
            .post(
                "/gettoken",
                &[
                    ("client_id", self.endpoint.client_id.as_str()),
                    ("client_secret", self.endpoint.client_secret.expose_secret().as_str()),
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                ],
            )
            .await
    }

    /// Refreshes a three-legged token. Never cached.
    pub async fn refresh_token(&self, refresh_token: &str, scopes: &[&str]) -> ForgeResult<ThreeLeggedToken> {
        debug!("Refreshing three-legged token");
        let scope = scopes.join(" ");
        let mut params = vec![
            ("client_id", self.endpoint.client_id.as_str()),
            ("client_secret", self.endpoint.client_secret.expose_secret().as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if !scopes.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        self.endpoint.post("/refreshtoken", &params).await
    }
}

/// How the executor obtains the bearer token for a request.
#[derive(Clone)]
pub(crate) enum Authorizer {
    /// Two-legged tokens from the authentication API.
    TwoLegged(AuthenticationClient),
    /// A fixed token.
    Static(SecretString),
}

impl Authorizer {
    /// Builds the authorizer for a set of credentials.
    pub(crate) fn new(
        credentials: &Credentials,
        host: &str,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        match credentials {
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => Authorizer::TwoLegged(
                AuthenticationClient::with_transport(client_id.clone(), client_secret.clone(), host, transport)
                    .with_clock(clock),
            ),
            Credentials::Token(token) => Authorizer::Static(token.clone()),
        }
    }

    /// Returns the `Authorization` header value for a request needing `scopes`.
    pub(crate) async fn bearer(&self, scopes: &[&str]) -> ForgeResult<String> {
        match self {
            Authorizer::TwoLegged(auth) => {
                let token = auth.authenticate(scopes, false).await?;
                Ok(format!("Bearer {}", token.access_token))
            }
            Authorizer::Static(token) => Ok(format!("Bearer {}", token.expose_secret())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{ManualClock, MockResponse, MockTransport};
    use serde_json::json;

    const HOST: &str = "https://forge.example.com";

    fn client(transport: Arc<MockTransport>, clock: Arc<ManualClock>) -> AuthenticationClient {
        AuthenticationClient::with_transport(
            "client-id",
            SecretString::new("client-secret".to_string()),
            HOST,
            transport,
        )
        .with_clock(clock)
    }

    fn token_response(token: &str, expires_in: i64) -> MockResponse {
        MockResponse::json(200, json!({"access_token": token, "token_type": "Bearer", "expires_in": expires_in}))
    }

    #[tokio::test]
    async fn test_authenticate_caches_per_scope_set() {
        let transport = Arc::new(MockTransport::with_responses(vec![token_response("T1", 3600)]));
        let clock = Arc::new(ManualClock::new());
        let auth = client(transport.clone(), clock.clone());

        let first = auth.authenticate(&["a", "b"], false).await.unwrap();
        assert_eq!(first, TwoLeggedToken { access_token: "T1".to_string(), expires_in: 3600 });

        clock.advance(Duration::minutes(10));
        let second = auth.authenticate(&["a", "b"], false).await.unwrap();
        assert_eq!(second, TwoLeggedToken { access_token: "T1".to_string(), expires_in: 3000 });

        assert_eq!(transport.request_count(), 1);
        let request = transport.last_request().unwrap();
        assert_eq!(request.url.as_str(), "https://forge.example.com/authentication/v1/authenticate");
        let body = String::from_utf8(request.body.unwrap().to_vec()).unwrap();
        assert_eq!(
            body,
            "client_id=client-id&client_secret=client-secret&grant_type=client_credentials&scope=a+b"
        );
    }

    #[tokio::test]
    async fn test_expires_in_decreases() {
        let transport = Arc::new(MockTransport::with_responses(vec![token_response("T1", 100)]));
        let clock = Arc::new(ManualClock::new());
        let auth = client(transport.clone(), clock.clone());

        let mut previous = auth.authenticate(&["data:read"], false).await.unwrap().expires_in;
        for _ in 0..5 {
            clock.advance(Duration::milliseconds(1500));
            let current = auth.authenticate(&["data:read"], false).await.unwrap().expires_in;
            assert!(current < previous);
            assert!(current <= 100);
            previous = current;
        }
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_force_and_expiry_refetch() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            token_response("T1", 60),
            token_response("T2", 60),
            token_response("T3", 60),
        ]));
        let clock = Arc::new(ManualClock::new());
        let auth = client(transport.clone(), clock.clone());

        assert_eq!(auth.authenticate(&["a"], false).await.unwrap().access_token, "T1");
        assert_eq!(auth.authenticate(&["a"], true).await.unwrap().access_token, "T2");

        clock.advance(Duration::seconds(60));
        assert_eq!(auth.authenticate(&["a"], false).await.unwrap().access_token, "T3");
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_scope_order_is_significant() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            token_response("T1", 3600),
            token_response("T2", 3600),
        ]));
        let auth = client(transport.clone(), Arc::new(ManualClock::new()));

        auth.authenticate(&["a", "b"], false).await.unwrap();
        auth.authenticate(&["b", "a"], false).await.unwrap();
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_fetch() {
        let transport = Arc::new(
            MockTransport::with_responses(vec![token_response("T1", 3600)])
                .with_delay(std::time::Duration::from_millis(50)),
        );
        let auth = client(transport.clone(), Arc::new(ManualClock::new()));

        let (a, b) = tokio::join!(
            auth.authenticate(&["a", "b"], false),
            auth.authenticate(&["a", "b"], false)
        );
        assert_eq!(a.unwrap().access_token, "T1");
        assert_eq!(b.unwrap().access_token, "T1");
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_surfaces_body_and_is_not_cached() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::text(401, "{\"developerMessage\":\"The client_id specified does not have access\"}"),
            token_response("T1", 3600),
        ]));
        let auth = client(transport.clone(), Arc::new(ManualClock::new()));

        let err = auth.authenticate(&["a"], false).await.unwrap_err();
        match err {
            ForgeError::Authentication(AuthenticationError::TokenRequestFailed { status, body }) => {
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert!(body.contains("does not have access"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(auth.authenticate(&["a"], false).await.unwrap().access_token, "T1");
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_expires_entry_before_eviction() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::text(500, "unavailable"),
            token_response("T2", 3600),
        ]));
        let clock = Arc::new(ManualClock::new());
        let auth = client(transport.clone(), clock.clone());
        let key = TokenCache::key(&["a"]);

        let lease = auth
            .cache
            .lease(&key, clock.now(), false, |expiry| auth.fetch_two_legged("a".to_string(), expiry));
        assert!(lease.token.clone().await.is_err());

        // Entry is still cached but no longer served.
        assert_eq!(auth.cache.len(), 1);
        assert!(!lease.expiry.is_live(clock.now()));

        assert_eq!(auth.authenticate(&["a"], false).await.unwrap().access_token, "T2");
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn test_authorize_redirect() {
        let auth = client(Arc::new(MockTransport::new()), Arc::new(ManualClock::new()));
        let url = auth
            .get_authorize_redirect(&["data:read", "data:write"], "https://app.example.com/callback")
            .unwrap();
        assert_eq!(
            url,
            "https://forge.example.com/authentication/v1/authorize?response_type=code&client_id=client-id\
             &redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback&scope=data%3Aread+data%3Awrite"
        );
    }

    #[tokio::test]
    async fn test_get_token_is_never_cached() {
        let body = json!({"access_token": "U1", "refresh_token": "R1", "expires_in": 3599, "token_type": "Bearer"});
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::json(200, body.clone()),
            MockResponse::json(200, body),
        ]));
        let auth = client(transport.clone(), Arc::new(ManualClock::new()));

        let token = auth.get_token("code-1", "https://app.example.com/cb").await.unwrap();
        assert_eq!(token.refresh_token, "R1");
        auth.get_token("code-1", "https://app.example.com/cb").await.unwrap();

        assert_eq!(transport.request_count(), 2);
        let request = transport.last_request().unwrap();
        assert_eq!(request.url.path(), "/authentication/v1/gettoken");
        let body = String::from_utf8(request.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=code-1"));
    }

    #[tokio::test]
    async fn test_refresh_token() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::json(
            200,
            json!({"access_token": "U2", "refresh_token": "R2", "expires_in": 3599}),
        )]));
        let auth = client(transport.clone(), Arc::new(ManualClock::new()));

        let token = auth.refresh_token("R1", &["data:read", "viewables:read"]).await.unwrap();
        assert_eq!(token.access_token, "U2");
        assert_eq!(token.refresh_token, "R2");

        let request = transport.last_request().unwrap();
        assert_eq!(request.url.path(), "/authentication/v1/refreshtoken");
        let body = String::from_utf8(request.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("grant_type=refresh_token"));
        assert!(body.contains("refresh_token=R1"));
        assert!(body.contains("scope=data%3Aread+viewables%3Aread"));
    }

    #[tokio::test]
    async fn test_static_authorizer_ignores_scopes() {
        let authorizer = Authorizer::Static(SecretString::new("fixed".to_string()));
        assert_eq!(authorizer.bearer(&["code:all"]).await.unwrap(), "Bearer fixed");
        assert_eq!(authorizer.bearer(&[]).await.unwrap(), "Bearer fixed");
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let debug = format!("{:?}", Credentials::client_credentials("id", "super-secret"));
        assert!(debug.contains("id"));
        assert!(!debug.contains("super-secret"));
    }
}
