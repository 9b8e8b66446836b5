//! Shared helpers for integration tests.

#![allow(dead_code)]

use integrations_forge::mocks::ManualClock;
use integrations_forge::ForgeClient;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/authentication/v1/authenticate";

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client with client credentials pointing to the mock server.
pub fn client(server: &MockServer, clock: Arc<ManualClock>) -> ForgeClient {
    ForgeClient::builder()
        .client_credentials("test-client", "test-secret")
        .host(server.uri())
        .processing_retry_delay(Duration::from_millis(5))
        .clock(clock)
        .build()
        .expect("Failed to build client")
}

/// Client with a static token pointing to the mock server.
pub fn static_client(server: &MockServer, token: &str) -> ForgeClient {
    ForgeClient::builder()
        .access_token(token)
        .host(server.uri())
        .processing_retry_delay(Duration::from_millis(5))
        .build()
        .expect("Failed to build client")
}

/// Mounts a token endpoint answering every request with the same token.
pub async fn mount_token(server: &MockServer, token: &str, expires_in: i64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        })))
        .mount(server)
        .await;
}
