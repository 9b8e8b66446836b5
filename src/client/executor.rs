//! Request executor with authorization, payload encoding, polling and error mapping.

use crate::auth::{AuthenticationClient, Authorizer, Clock, Credentials};
use crate::config::{validate_host, ForgeConfig};
use crate::errors::{ApiError, ErrorBody, ForgeError, ForgeResult, RequestError, ResponseError};
use crate::resilience::{PollConfig, ProcessingPoller};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::types::Region;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Request payload.
///
/// A payload normally carries exactly one encoding. When several are set the form body
/// wins over JSON, which wins over the raw buffer; a payload with none of them cannot be
/// sent.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    /// `application/x-www-form-urlencoded` body, already encoded.
    pub urlencoded: Option<String>,
    /// JSON body.
    pub json: Option<Value>,
    /// Raw body; content type comes from the request headers.
    pub buffer: Option<Bytes>,
}

impl Payload {
    /// Urlencoded form payload.
    pub fn form<T: Serialize + ?Sized>(params: &T) -> ForgeResult<Self> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| ForgeError::request(format!("Invalid form payload: {}", e)))?;
        Ok(Self {
            urlencoded: Some(encoded),
            ..Default::default()
        })
    }

    /// JSON payload.
    pub fn json<T: Serialize + ?Sized>(body: &T) -> ForgeResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ForgeError::request(format!("Invalid JSON payload: {}", e)))?;
        Ok(Self {
            json: Some(value),
            ..Default::default()
        })
    }

    /// Raw payload.
    pub fn buffer(data: impl Into<Bytes>) -> Self {
        Self {
            buffer: Some(data.into()),
            ..Default::default()
        }
    }

    /// Encodes the payload, returning the content type (if implied) and the body.
    fn encode(&self) -> ForgeResult<(Option<&'static str>, Bytes)> {
        if let Some(form) = &self.urlencoded {
            return Ok((Some("application/x-www-form-urlencoded"), Bytes::from(form.clone())));
        }
        if let Some(json) = &self.json {
            let body = serde_json::to_vec(json)
                .map_err(|e| ForgeError::request(format!("Invalid JSON payload: {}", e)))?;
            return Ok((Some("application/json"), Bytes::from(body)));
        }
        if let Some(buffer) = &self.buffer {
            return Ok((None, buffer.clone()));
        }
        Err(RequestError::UnsupportedContentType.into())
    }
}

/// A single call against a Forge endpoint.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path relative to the host, including the API root path and any query string.
    pub path: String,
    /// Optional payload.
    pub payload: Option<Payload>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Scopes the access token must grant.
    pub scopes: Vec<String>,
    /// Re-issue the request while the server answers "202 Accepted".
    pub repeat_on_processing: bool,
}

impl RequestSpec {
    /// Creates a request with the given method and path.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            payload: None,
            headers: Vec::new(),
            scopes: Vec::new(),
            repeat_on_processing: false,
        }
    }

    /// GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    /// DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Sets the payload.
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the required scopes.
    pub fn scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Enables polling while the server answers "202 Accepted".
    pub fn repeat_on_processing(mut self) -> Self {
        self.repeat_on_processing = true;
        self
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ForgeResponse {
    /// `application/json` or `application/vnd.api+json`.
    Json(Value),
    /// `application/xml` or `text/plain`.
    Text(String),
    /// Anything else.
    Binary(Bytes),
}

impl ForgeResponse {
    /// Returns the JSON body or an error if the response was not JSON.
    pub fn into_json(self) -> ForgeResult<Value> {
        match self {
            ForgeResponse::Json(value) => Ok(value),
            ForgeResponse::Text(_) => Err(ResponseError::UnexpectedFormat("Expected JSON, got text".to_string()).into()),
            ForgeResponse::Binary(_) => {
                Err(ResponseError::UnexpectedFormat("Expected JSON, got binary content".to_string()).into())
            }
        }
    }

    /// Returns the raw bytes of the body.
    pub fn into_bytes(self) -> Bytes {
        match self {
            ForgeResponse::Json(value) => Bytes::from(value.to_string()),
            ForgeResponse::Text(text) => Bytes::from(text),
            ForgeResponse::Binary(bytes) => bytes,
        }
    }
}

/// Swappable connection state.
#[derive(Clone)]
struct ExecutorState {
    credentials: Credentials,
    host: String,
    region: Region,
    authorizer: Authorizer,
}

/// Request executor shared by all services of a client.
///
/// The executor:
/// - obtains bearer tokens for the scopes each request declares
/// - encodes payloads and sets content headers
/// - polls "202 Accepted" responses when asked to
/// - decodes responses by media type and classifies non-2xx responses
pub struct RequestExecutor {
    state: RwLock<ExecutorState>,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    user_agent: HeaderValue,
    timeout: Option<Duration>,
    poll: PollConfig,
}

impl RequestExecutor {
    /// Creates a new request executor.
    pub fn new(config: &ForgeConfig, transport: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> ForgeResult<Self> {
        config.validate()?;

        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| RequestError::InvalidHeader(format!("Invalid user agent: {}", e)))?;

        let authorizer = Authorizer::new(&config.credentials, &config.host, transport.clone(), clock.clone());

        Ok(Self {
            state: RwLock::new(ExecutorState {
                credentials: config.credentials.clone(),
                host: config.host.clone(),
                region: config.region,
                authorizer,
            }),
            transport,
            clock,
            user_agent,
            timeout: config.timeout,
            poll: PollConfig {
                delay: config.processing_retry_delay,
                max_attempts: config.max_processing_attempts,
            },
        })
    }

    /// Current host.
    pub fn host(&self) -> String {
        self.state.read().host.clone()
    }

    /// Current region.
    pub fn region(&self) -> Region {
        self.state.read().region
    }

    /// Client id, when the executor authenticates with client credentials.
    pub fn client_id(&self) -> Option<String> {
        match &self.state.read().credentials {
            Credentials::ClientCredentials { client_id, .. } => Some(client_id.clone()),
            Credentials::Token(_) => None,
        }
    }

    /// Authentication client, when the executor authenticates with client credentials.
    pub fn authentication(&self) -> Option<AuthenticationClient> {
        match &self.state.read().authorizer {
            Authorizer::TwoLegged(auth) => Some(auth.clone()),
            Authorizer::Static(_) => None,
        }
    }

    /// Replaces credentials, host and/or region.
    ///
    /// New credentials or a new host start with an empty token cache. Requests already
    /// in flight finish with the state they started with.
    pub fn reset(
        &self,
        credentials: Option<Credentials>,
        host: Option<String>,
        region: Option<Region>,
    ) -> ForgeResult<()> {
        let host = host.map(|h| h.trim_end_matches('/').to_string());
        if let Some(host) = &host {
            validate_host(host)?;
        }

        let mut state = self.state.write();
        let rebuild = credentials.is_some() || host.is_some();

        if let Some(credentials) = credentials {
            state.credentials = credentials;
        }
        if let Some(host) = host {
            state.host = host;
        }
        if let Some(region) = region {
            state.region = region;
        }
        if rebuild {
            state.authorizer = Authorizer::new(
                &state.credentials,
                &state.host,
                self.transport.clone(),
                self.clock.clone(),
            );
        }

        debug!(host = %state.host, region = %state.region, "Client state reset");
        Ok(())
    }

    /// Executes a request and decodes the response by media type.
    pub async fn execute(&self, spec: RequestSpec) -> ForgeResult<ForgeResponse> {
        let response = self.execute_raw(spec).await?;
        decode(&response)
    }

    /// Executes a request and deserializes the JSON response.
    pub async fn execute_json<T: DeserializeOwned>(&self, spec: RequestSpec) -> ForgeResult<T> {
        let value = self.execute(spec).await?.into_json()?;
        serde_json::from_value(value)
            .map_err(|e| ForgeError::deserialization(format!("Failed to deserialize response: {}", e)))
    }

    /// Executes a request and returns the undecoded response.
    ///
    /// Non-2xx responses are still classified into [`ApiError`].
    pub async fn execute_raw(&self, spec: RequestSpec) -> ForgeResult<HttpResponse> {
        let (host, authorizer) = {
            let state = self.state.read();
            (state.host.clone(), state.authorizer.clone())
        };

        let encoded = spec.payload.as_ref().map(Payload::encode).transpose()?;

        let url_string = format!("{}{}", host, spec.path);
        let url = Url::parse(&url_string)
            .map_err(|e| RequestError::InvalidUrl(format!("{}: {}", url_string, e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &spec.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RequestError::InvalidHeader(format!("{}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RequestError::InvalidHeader(format!("{}: {}", name, e)))?;
            headers.insert(name, value);
        }
        headers.insert(USER_AGENT, self.user_agent.clone());

        let body = match encoded {
            Some((content_type, body)) => {
                match content_type {
                    Some(content_type) => {
                        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
                    }
                    None => {
                        if !headers.contains_key(CONTENT_TYPE) {
                            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
                        }
                    }
                }
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
                Some(body)
            }
            None => None,
        };

        let scopes: Vec<&str> = spec.scopes.iter().map(String::as_str).collect();
        let bearer = authorizer.bearer(&scopes).await?;
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|e| RequestError::InvalidHeader(format!("Invalid authorization header: {}", e)))?,
        );

        let request = HttpRequest {
            method: spec.method,
            url,
            headers,
            body,
            timeout: self.timeout,
        };

        debug!(method = ?request.method, url = %request.url, "Sending request");

        let response = if spec.repeat_on_processing {
            ProcessingPoller::new(self.poll)
                .execute(&url_string, || self.send(request.clone()))
                .await?
        } else {
            self.send(request).await?
        };

        if !response.status.is_success() {
            let error = classify(&url_string, &response);
            warn!(url = %url_string, status = response.status.as_u16(), "Request failed");
            return Err(error.into());
        }

        Ok(response)
    }

    async fn send(&self, request: HttpRequest) -> ForgeResult<HttpResponse> {
        Ok(self.transport.send(request).await?)
    }
}

/// Classifies a non-2xx response.
///
/// `application/json` bodies are kept as JSON; anything else as text.
pub fn classify(url: &str, response: &HttpResponse) -> ApiError {
    let body = if response.media_type() == "application/json" {
        match serde_json::from_slice::<Value>(&response.body) {
            Ok(value) => ErrorBody::Json(value),
            Err(_) => ErrorBody::Text(String::from_utf8_lossy(&response.body).into_owned()),
        }
    } else {
        ErrorBody::Text(String::from_utf8_lossy(&response.body).into_owned())
    };

    ApiError::new(url, response.status, body)
}

/// Decodes a successful response by media type.
pub fn decode(response: &HttpResponse) -> ForgeResult<ForgeResponse> {
    match response.media_type() {
        "application/json" | "application/vnd.api+json" => {
            if response.body.is_empty() {
                return Ok(ForgeResponse::Json(Value::Null));
            }
            serde_json::from_slice(&response.body)
                .map(ForgeResponse::Json)
                .map_err(|e| ForgeError::deserialization(format!("Invalid JSON response: {}", e)))
        }
        "application/xml" | "text/plain" => Ok(ForgeResponse::Text(
            String::from_utf8_lossy(&response.body).into_owned(),
        )),
        _ => Ok(ForgeResponse::Binary(response.body.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ProcessingError, TransportError};
    use crate::mocks::{ManualClock, MockResponse, MockTransport};
    use reqwest::StatusCode;
    use serde_json::json;

    const HOST: &str = "https://forge.example.com";

    fn executor(transport: Arc<MockTransport>, credentials: Credentials) -> RequestExecutor {
        let config = ForgeConfig::builder()
            .credentials(credentials)
            .host(HOST)
            .processing_retry_delay(Duration::from_millis(1))
            .max_processing_attempts(Some(3))
            .build()
            .unwrap();
        RequestExecutor::new(&config, transport, Arc::new(ManualClock::new())).unwrap()
    }

    fn token_response() -> MockResponse {
        MockResponse::json(200, json!({"access_token": "T1", "expires_in": 3600}))
    }

    #[tokio::test]
    async fn test_static_token_used_verbatim() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::json(
            200,
            json!({"ok": true}),
        )]));
        let executor = executor(transport.clone(), Credentials::token("fixed"));

        let response = executor
            .execute(RequestSpec::get("/oss/v2/buckets").scopes(&["bucket:read"]))
            .await
            .unwrap();

        assert_eq!(response, ForgeResponse::Json(json!({"ok": true})));
        assert_eq!(transport.request_count(), 1);
        let request = transport.last_request().unwrap();
        assert_eq!(request.headers[AUTHORIZATION], "Bearer fixed");
        assert_eq!(request.url.as_str(), "https://forge.example.com/oss/v2/buckets");
    }

    #[tokio::test]
    async fn test_client_credentials_fetch_token_for_scopes() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            token_response(),
            MockResponse::json(200, json!({})),
        ]));
        let executor = executor(transport.clone(), Credentials::client_credentials("id", "secret"));

        executor
            .execute(RequestSpec::get("/oss/v2/buckets").scopes(&["bucket:read", "data:read"]))
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        let token_body = String::from_utf8(requests[0].body.clone().unwrap().to_vec()).unwrap();
        assert!(token_body.ends_with("scope=bucket%3Aread+data%3Aread"));
        assert_eq!(requests[1].headers[AUTHORIZATION], "Bearer T1");
    }

    #[tokio::test]
    async fn test_payload_encodings() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::json(200, json!({})),
            MockResponse::json(200, json!({})),
            MockResponse::json(200, json!({})),
        ]));
        let executor = executor(transport.clone(), Credentials::token("t"));

        executor
            .execute(RequestSpec::post("/a").payload(Payload::form(&[("x", "1 2")]).unwrap()))
            .await
            .unwrap();
        executor
            .execute(RequestSpec::post("/b").payload(Payload::json(&json!({"k": "v"})).unwrap()))
            .await
            .unwrap();
        executor
            .execute(
                RequestSpec::put("/c")
                    .payload(Payload::buffer(vec![1u8, 2, 3]))
                    .header("Content-Type", "image/png"),
            )
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].headers[CONTENT_TYPE], "application/x-www-form-urlencoded");
        assert_eq!(requests[0].body.as_deref(), Some(&b"x=1+2"[..]));
        assert_eq!(requests[1].headers[CONTENT_TYPE], "application/json");
        assert_eq!(requests[1].headers[CONTENT_LENGTH], "9");
        assert_eq!(requests[2].headers[CONTENT_TYPE], "image/png");
        assert_eq!(requests[2].headers[CONTENT_LENGTH], "3");
    }

    #[test]
    fn test_payload_precedence() {
        let payload = Payload {
            urlencoded: Some("a=1".to_string()),
            json: Some(json!({"a": 1})),
            buffer: Some(Bytes::from_static(b"raw")),
        };
        let (content_type, body) = payload.encode().unwrap();
        assert_eq!(content_type, Some("application/x-www-form-urlencoded"));
        assert_eq!(&body[..], b"a=1");

        let (content_type, body) = Payload::buffer(Bytes::from_static(b"raw")).encode().unwrap();
        assert_eq!(content_type, None);
        assert_eq!(&body[..], b"raw");
    }

    #[tokio::test]
    async fn test_empty_payload_fails_before_network() {
        let transport = Arc::new(MockTransport::new());
        let executor = executor(transport.clone(), Credentials::client_credentials("id", "secret"));

        let err = executor
            .execute(RequestSpec::post("/a").payload(Payload::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, ForgeError::Request(RequestError::UnsupportedContentType)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_classified() {
        // No scripted responses: the transport fails with a network error.
        let transport = Arc::new(MockTransport::new());
        let executor = executor(transport.clone(), Credentials::token("fixed"));

        let err = executor.execute(RequestSpec::get("/oss/v2/buckets")).await.unwrap_err();

        assert!(err.is_transport());
        assert!(matches!(err, ForgeError::Transport(TransportError::Network(_))));
        assert!(err.as_api().is_none());
        assert_eq!(err.status_code(), None);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_error_classification() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::json(404, json!({"reason": "Bucket not found"})),
            MockResponse::text(409, "Bucket already exists"),
        ]));
        let executor = executor(transport.clone(), Credentials::token("t"));

        let err = executor.execute(RequestSpec::get("/oss/v2/buckets/x/details")).await.unwrap_err();
        let api = err.as_api().unwrap();
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.status_text, "Not Found");
        assert_eq!(api.url, "https://forge.example.com/oss/v2/buckets/x/details");
        assert_eq!(api.body.as_json(), Some(&json!({"reason": "Bucket not found"})));

        let err = executor.execute(RequestSpec::post("/oss/v2/buckets").payload(Payload::json(&json!({})).unwrap()))
            .await
            .unwrap_err();
        assert_eq!(err.as_api().unwrap().body.as_text(), Some("Bucket already exists"));
    }

    #[tokio::test]
    async fn test_response_decoding() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::new(200)
                .with_header("content-type", "application/vnd.api+json; charset=utf-8")
                .with_body(r#"{"data":[]}"#),
            MockResponse::text(200, "hello"),
            MockResponse::new(200)
                .with_header("content-type", "application/octet-stream")
                .with_body(vec![0u8, 1, 2]),
        ]));
        let executor = executor(transport, Credentials::token("t"));

        let json = executor.execute(RequestSpec::get("/a")).await.unwrap();
        assert_eq!(json, ForgeResponse::Json(json!({"data": []})));
        let text = executor.execute(RequestSpec::get("/b")).await.unwrap();
        assert_eq!(text, ForgeResponse::Text("hello".to_string()));
        let binary = executor.execute(RequestSpec::get("/c")).await.unwrap();
        assert_eq!(binary, ForgeResponse::Binary(Bytes::from_static(&[0, 1, 2])));
    }

    #[tokio::test]
    async fn test_accepted_is_success_without_polling() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::json(
            202,
            json!({"result": "created"}),
        )]));
        let executor = executor(transport.clone(), Credentials::token("t"));

        let response = executor.execute(RequestSpec::get("/job")).await.unwrap();
        assert_eq!(response, ForgeResponse::Json(json!({"result": "created"})));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_polling_reissues_identical_request() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::json(202, json!({})),
            MockResponse::json(202, json!({})),
            MockResponse::json(200, json!({"status": "success"})),
        ]));
        let executor = executor(transport.clone(), Credentials::token("t"));

        let response = executor
            .execute(RequestSpec::get("/manifest").repeat_on_processing())
            .await
            .unwrap();
        assert_eq!(response, ForgeResponse::Json(json!({"status": "success"})));

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.url == requests[0].url));
        assert!(requests.iter().all(|r| r.headers[AUTHORIZATION] == "Bearer t"));
    }

    #[tokio::test]
    async fn test_polling_bound() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::json(202, json!({})),
            MockResponse::json(202, json!({})),
            MockResponse::json(202, json!({})),
        ]));
        let executor = executor(transport.clone(), Credentials::token("t"));

        let err = executor
            .execute(RequestSpec::get("/manifest").repeat_on_processing())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Processing(ProcessingError::NotReady { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_reset_swaps_credentials_and_region() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::json(200, json!({})),
            MockResponse::json(200, json!({})),
        ]));
        let executor = executor(transport.clone(), Credentials::token("old"));
        assert_eq!(executor.client_id(), None);

        executor.execute(RequestSpec::get("/a")).await.unwrap();
        executor
            .reset(Some(Credentials::token("new")), Some("https://other.example.com/".to_string()), Some(Region::Emea))
            .unwrap();
        executor.execute(RequestSpec::get("/a")).await.unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.headers[AUTHORIZATION], "Bearer new");
        assert_eq!(request.url.as_str(), "https://other.example.com/a");
        assert_eq!(executor.region(), Region::Emea);

        assert!(executor.reset(None, Some("nope".to_string()), None).is_err());
    }
}
