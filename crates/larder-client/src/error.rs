//! Client error types.

use thiserror::Error;

use crate::events::ExpiryReason;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// The server answered `401` and the pipeline did not recover it: the
    /// request carried no access token, or it was already retried once
    /// after a refresh.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The session ended and the token store has been cleared.
    #[error("Session expired: {0}")]
    SessionExpired(ExpiryReason),

    /// A token handed to the store was empty.
    #[error("Invalid token: {0}")]
    InvalidToken(&'static str),

    /// Persisting or loading the session failed.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request rejected before it was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_)) || matches!(self, Error::Api { status: 404, .. })
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::SessionExpired(_))
            || matches!(self, Error::Api { status: 401, .. })
    }

    /// Check if the session was torn down by this error.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::SessionExpired(_))
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::Api { status: 429, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error body returned by the server.
///
/// The service reports failures as `{ "error": "..." }`; some handlers use
/// `message` instead.
#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub(crate) fn into_message(self, status: u16) -> String {
        self.error
            .or(self.message)
            .unwrap_or_else(|| format!("HTTP {}", status))
    }
}
