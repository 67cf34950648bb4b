//! Error types for the OAuth client.

use std::time::Duration;

use crate::types::OAuth2ErrorResponse;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Coarse classification of an [`OAuthError`].
///
/// Callers branch on this to decide whether to prompt again, fall back to
/// another authentication mode, or abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The redirect callback failed state validation.
    SecurityValidation,
    /// The authorization server returned a structured OAuth error.
    Protocol,
    /// A successful response whose body could not be understood.
    MalformedResponse,
    /// The user wait was cancelled or exceeded its bound.
    TimeoutOrCancellation,
    /// Network-level failure, or an HTTP error without a usable body.
    Transport,
    /// The client was not configured for the requested operation.
    Configuration,
    /// The caller passed something the client refuses to send.
    InvalidRequest,
}

/// Errors that can occur while talking to an authorization server.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The `state` returned on the redirect did not match the one we sent.
    #[error("security validation failed: {0}")]
    StateMismatch(String),

    /// Structured `error` reply from an authorization or token endpoint.
    #[error("{0}")]
    Protocol(OAuth2ErrorResponse),

    /// A 2xx reply that did not parse into the expected envelope.
    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    /// Non-2xx reply without a parseable OAuth error body.
    #[error("HTTP {status} from {endpoint}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The wait for the user exceeded its bound.
    #[error("timed out after {}s waiting for authorization", .0.as_secs())]
    Timeout(Duration),

    /// The caller cancelled the wait.
    #[error("authorization was cancelled")]
    Cancelled,

    /// Network/HTTP error.
    #[error("network error: {0}")]
    Network(String),

    /// Local I/O error (binding the loopback listener, launching the browser).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl OAuthError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OAuthError::StateMismatch(_) => ErrorKind::SecurityValidation,
            OAuthError::Protocol(_) => ErrorKind::Protocol,
            OAuthError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            OAuthError::Timeout(_) | OAuthError::Cancelled => ErrorKind::TimeoutOrCancellation,
            OAuthError::HttpStatus { .. } | OAuthError::Network(_) | OAuthError::Io(_) => {
                ErrorKind::Transport
            }
            OAuthError::Config(_) => ErrorKind::Configuration,
            OAuthError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// The error code reported by the upstream server, if any.
    pub fn upstream_code(&self) -> Option<&str> {
        match self {
            OAuthError::Protocol(response) => Some(response.error.as_str()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}
