//! Error types for credential resolution.

use gitcred_config::ConfigError;
use gitcred_oauth::{ErrorKind as OAuthErrorKind, OAuthError};

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No host provider accepts the request.
    Resolution,
    SecurityValidation,
    Protocol,
    MalformedResponse,
    TimeoutOrCancellation,
    Transport,
    Configuration,
    InvalidInput,
    Store,
}

/// Errors surfaced while resolving or acquiring a credential.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No registered provider matched the request.
    #[error("no host provider available to service '{0}'")]
    Resolution(String),

    /// OAuth client failure.
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Settings could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Settings are missing or forbid the requested operation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed request from Git or a bad registry call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Credential store failure.
    #[error("credential store error: {0}")]
    Store(String),

    /// Network failure outside the OAuth client (the detection probe).
    #[error("network error: {0}")]
    Transport(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Resolution(_) => ErrorKind::Resolution,
            Error::OAuth(e) => match e.kind() {
                OAuthErrorKind::SecurityValidation => ErrorKind::SecurityValidation,
                OAuthErrorKind::Protocol => ErrorKind::Protocol,
                OAuthErrorKind::MalformedResponse => ErrorKind::MalformedResponse,
                OAuthErrorKind::TimeoutOrCancellation => ErrorKind::TimeoutOrCancellation,
                OAuthErrorKind::Transport => ErrorKind::Transport,
                OAuthErrorKind::Configuration => ErrorKind::Configuration,
                OAuthErrorKind::InvalidRequest => ErrorKind::InvalidInput,
            },
            Error::Config(_) | Error::Configuration(_) => ErrorKind::Configuration,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Store(_) => ErrorKind::Store,
            Error::Transport(_) => ErrorKind::Transport,
        }
    }

    /// The error code reported by an upstream authorization server, if any.
    pub fn upstream_code(&self) -> Option<&str> {
        match self {
            Error::OAuth(e) => e.upstream_code(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}
