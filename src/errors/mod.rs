//! Error types for the Forge integration.

use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type for Forge operations.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Top-level error type for the Forge integration.
///
/// Errors are `Clone` so that a single failed token fetch can be handed to every
/// caller that was awaiting it.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Authentication error (token endpoint).
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// Classified error response from a Forge endpoint.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Transport error (connection, DNS, timeout).
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Request could not be built.
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Response could not be decoded.
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    /// A "202 Accepted" job did not finish within the polling budget.
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),
}

impl ForgeError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        ForgeError::Configuration(ConfigurationError::InvalidConfiguration(msg.into()))
    }

    /// Creates a request validation error.
    pub fn request(msg: impl Into<String>) -> Self {
        ForgeError::Request(RequestError::ValidationError(msg.into()))
    }

    /// Creates a deserialization error.
    pub fn deserialization(msg: impl Into<String>) -> Self {
        ForgeError::Response(ResponseError::DeserializationError(msg.into()))
    }

    /// Returns the classified API error, if this is one.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            ForgeError::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the HTTP status code if the server produced one.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ForgeError::Api(err) => Some(err.status),
            ForgeError::Authentication(AuthenticationError::TokenRequestFailed {
                status, ..
            }) => Some(*status),
            _ => None,
        }
    }

    /// Returns true if this is a transport-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, ForgeError::Transport(_))
    }
}

/// Decoded body of an error response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    /// `application/json` error body.
    Json(Value),
    /// Any other body, kept as text.
    Text(String),
}

impl ErrorBody {
    /// Returns the JSON body, if the server sent one.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ErrorBody::Json(value) => Some(value),
            ErrorBody::Text(_) => None,
        }
    }

    /// Returns the text body, if the server sent one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ErrorBody::Text(text) => Some(text),
            ErrorBody::Json(_) => None,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            ErrorBody::Json(value) => value.is_null(),
            ErrorBody::Text(text) => text.is_empty(),
        }
    }
}

/// Non-2xx response from a Forge endpoint.
#[derive(Debug, Clone, Error)]
pub struct ApiError {
    /// Request URL.
    pub url: String,
    /// HTTP status.
    pub status: StatusCode,
    /// Status text (canonical reason phrase).
    pub status_text: String,
    /// Decoded response body.
    pub body: ErrorBody,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(url: impl Into<String>, status: StatusCode, body: ErrorBody) -> Self {
        Self {
            url: url.into(),
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            return write!(f, "{}: {} {}", self.url, self.status.as_u16(), self.status_text);
        }
        match &self.body {
            ErrorBody::Json(value) => write!(f, "{}: {}", self.url, value),
            ErrorBody::Text(text) => write!(f, "{}: {}", self.url, text),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// Missing credentials.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Unknown availability region.
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}

/// Authentication errors.
#[derive(Debug, Clone, Error)]
pub enum AuthenticationError {
    /// The token endpoint answered with a non-2xx status; carries the raw body.
    #[error("{body}")]
    TokenRequestFailed {
        /// HTTP status.
        status: StatusCode,
        /// Raw response body.
        body: String,
    },

    /// The token endpoint answered with something that is not a token.
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// The operation needs a client id, but the client holds a static token.
    #[error("Client credentials required: {0}")]
    ClientCredentialsRequired(String),
}

/// Request errors.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// Payload matched none of the supported encodings.
    #[error("Content type not supported")]
    UnsupportedContentType,

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid header.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Response errors.
#[derive(Debug, Clone, Error)]
pub enum ResponseError {
    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Unexpected format.
    #[error("Unexpected response format: {0}")]
    UnexpectedFormat(String),
}

/// Processing (202 Accepted) errors.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    /// The endpoint still answered 202 after the configured number of attempts.
    #[error("{url} still processing after {attempts} attempts")]
    NotReady {
        /// Request URL.
        url: String,
        /// Number of requests issued.
        attempts: u32,
    },
}

/// Transport errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Network(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}
