//! Success and error envelopes exchanged with an authorization server.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Polling interval used when the device authorization response omits one.
pub const DEFAULT_DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest polling interval accepted from a device authorization reply.
pub const MIN_DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Endpoints of the authorization server a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2ServerEndpoints {
    pub authorization: Url,
    pub token: Url,
    pub device_authorization: Option<Url>,
}

impl OAuth2ServerEndpoints {
    pub fn new(authorization: Url, token: Url) -> Self {
        Self {
            authorization,
            token,
            device_authorization: None,
        }
    }

    pub fn with_device_authorization(mut self, endpoint: Url) -> Self {
        self.device_authorization = Some(endpoint);
        self
    }
}

// ============================================================================
// Error envelope
// ============================================================================

/// Well-known OAuth 2.0 error codes (RFC 6749 §5.2, RFC 8628 §3.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuth2ErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    AccessDenied,
    AuthorizationPending,
    SlowDown,
    ExpiredToken,
    Other(String),
}

impl OAuth2ErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "invalid_request" => Self::InvalidRequest,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unauthorized_client" => Self::UnauthorizedClient,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "invalid_scope" => Self::InvalidScope,
            "access_denied" => Self::AccessDenied,
            "authorization_pending" => Self::AuthorizationPending,
            "slow_down" => Self::SlowDown,
            "expired_token" => Self::ExpiredToken,
            other => Self::Other(other.to_string()),
        }
    }
}

/// OAuth error response body (`error`, `error_description`, `error_uri`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuth2ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: None,
            error_uri: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    pub fn code(&self) -> OAuth2ErrorCode {
        OAuth2ErrorCode::parse(&self.error)
    }
}

impl fmt::Display for OAuth2ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OAuth error '{}'", self.error)?;
        if let Some(description) = &self.error_description {
            write!(f, ": {}", description)?;
        }
        if let Some(uri) = &self.error_uri {
            write!(f, " (see {})", uri)?;
        }
        Ok(())
    }
}

// ============================================================================
// Token envelope
// ============================================================================

/// Tokens returned by a successful token endpoint exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenResult {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<Duration>,
    pub refresh_token: Option<String>,
    pub scopes: Option<Vec<String>>,
}

impl fmt::Debug for TokenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResult")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Raw JSON shape of a token endpoint reply.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenEndpointResponse {
    access_token: String,
    token_type: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl From<TokenEndpointResponse> for TokenResult {
    fn from(raw: TokenEndpointResponse) -> Self {
        Self {
            access_token: raw.access_token,
            token_type: raw.token_type,
            expires_in: raw.expires_in.map(Duration::from_secs),
            refresh_token: raw.refresh_token.filter(|t| !t.is_empty()),
            scopes: raw
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect()),
        }
    }
}

// ============================================================================
// Grant results
// ============================================================================

/// Outcome of the browser step of the authorization code grant.
///
/// The verifier travels with the code so the token exchange can bind to it.
#[derive(Clone)]
pub struct AuthorizationCodeResult {
    pub code: String,
    pub redirect_uri: Option<Url>,
    pub code_verifier: String,
}

impl fmt::Debug for AuthorizationCodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationCodeResult")
            .field("code", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("code_verifier", &"<redacted>")
            .finish()
    }
}

/// Device authorization grant, ready to be shown to the user and polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCodeResult {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub expires_in: Duration,
    pub interval: Duration,
}

/// Raw JSON shape of a device authorization reply.
#[derive(Debug, Deserialize)]
pub(crate) struct DeviceAuthorizationResponse {
    device_code: String,
    user_code: String,
    // GitHub and some older servers send `verification_url`.
    #[serde(alias = "verification_url")]
    verification_uri: String,
    #[serde(default)]
    verification_uri_complete: Option<String>,
    expires_in: u64,
    #[serde(default)]
    interval: Option<u64>,
}

impl From<DeviceAuthorizationResponse> for DeviceCodeResult {
    fn from(raw: DeviceAuthorizationResponse) -> Self {
        Self {
            device_code: raw.device_code,
            user_code: raw.user_code,
            verification_uri: raw.verification_uri,
            verification_uri_complete: raw.verification_uri_complete,
            expires_in: Duration::from_secs(raw.expires_in),
            interval: raw
                .interval
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DEVICE_POLL_INTERVAL)
                .max(MIN_DEVICE_POLL_INTERVAL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_without_refresh() {
        let raw: TokenEndpointResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"bearer","expires_in":3600}"#,
        )
        .unwrap();
        let result = TokenResult::from(raw);
        assert_eq!(result.access_token, "abc");
        assert_eq!(result.token_type, "bearer");
        assert_eq!(result.expires_in, Some(Duration::from_secs(3600)));
        assert_eq!(result.refresh_token, None);
        assert_eq!(result.scopes, None);
    }

    #[test]
    fn test_token_response_scopes_keep_order() {
        let raw: TokenEndpointResponse = serde_json::from_str(
            r#"{"access_token":"a","token_type":"Bearer","scope":"repo  read:user gist"}"#,
        )
        .unwrap();
        let result = TokenResult::from(raw);
        assert_eq!(
            result.scopes,
            Some(vec![
                "repo".to_string(),
                "read:user".to_string(),
                "gist".to_string()
            ])
        );
    }

    #[test]
    fn test_token_result_debug_redacts() {
        let result = TokenResult {
            access_token: "secret-access".into(),
            token_type: "bearer".into(),
            expires_in: None,
            refresh_token: Some("secret-refresh".into()),
            scopes: None,
        };
        let debug = format!("{:?}", result);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn test_device_response_default_interval() {
        let raw: DeviceAuthorizationResponse = serde_json::from_str(
            r#"{"device_code":"d","user_code":"ABCD-1234","verification_url":"https://example.com/device","expires_in":900}"#,
        )
        .unwrap();
        let result = DeviceCodeResult::from(raw);
        assert_eq!(result.interval, DEFAULT_DEVICE_POLL_INTERVAL);
        assert_eq!(result.expires_in, Duration::from_secs(900));
        assert_eq!(result.verification_uri, "https://example.com/device");
    }

    #[test]
    fn test_device_response_zero_interval_is_clamped() {
        let raw: DeviceAuthorizationResponse = serde_json::from_str(
            r#"{"device_code":"d","user_code":"U","verification_uri":"https://example.com/device","expires_in":900,"interval":0}"#,
        )
        .unwrap();
        assert_eq!(DeviceCodeResult::from(raw).interval, MIN_DEVICE_POLL_INTERVAL);
    }

    #[test]
    fn test_error_display() {
        let err = OAuth2ErrorResponse::new("invalid_grant").with_description("code expired");
        assert_eq!(err.to_string(), "OAuth error 'invalid_grant': code expired");
        assert_eq!(err.code(), OAuth2ErrorCode::InvalidGrant);
        assert_eq!(
            OAuth2ErrorResponse::new("weird").code(),
            OAuth2ErrorCode::Other("weird".into())
        );
    }
}
