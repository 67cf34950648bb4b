//! OAuth 2.0 client: authorization code + PKCE, device code, and refresh grants.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::browser::WebBrowser;
use crate::error::{OAuthError, Result};
use crate::listener::LoopbackListener;
use crate::pkce::{PkceParameters, new_nonce};
use crate::types::{
    AuthorizationCodeResult, DeviceAuthorizationResponse, DeviceCodeResult, OAuth2ErrorCode,
    OAuth2ErrorResponse, OAuth2ServerEndpoints, TokenEndpointResponse, TokenResult,
};

/// Grant type for polling the token endpoint during the device flow (RFC 8628).
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Amount added to the polling interval on `slow_down`.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Default timeout for a single HTTP request to the authorization server.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Query parameters the client owns on the authorization URL.
const STANDARD_AUTHORIZE_PARAMS: &[&str] = &[
    "response_type",
    "client_id",
    "redirect_uri",
    "state",
    "code_challenge",
    "code_challenge_method",
    "scope",
];

/// Settings for an [`OAuth2Client`].
#[derive(Debug, Clone)]
pub struct OAuth2ClientConfig {
    pub endpoints: OAuth2ServerEndpoints,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<Url>,
    /// Also send `client_id:client_secret` as HTTP Basic auth on token requests.
    pub use_auth_header: bool,
    pub http_timeout: Duration,
    /// Upper bound on the browser wait, in addition to the cancellation token.
    pub browser_timeout: Option<Duration>,
}

impl OAuth2ClientConfig {
    pub fn new(endpoints: OAuth2ServerEndpoints, client_id: impl Into<String>) -> Self {
        Self {
            endpoints,
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: None,
            use_auth_header: true,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            browser_timeout: None,
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
        self.redirect_uri = Some(redirect_uri);
        self
    }

    pub fn with_auth_header(mut self, enabled: bool) -> Self {
        self.use_auth_header = enabled;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_browser_timeout(mut self, timeout: Duration) -> Self {
        self.browser_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Authorization state
// ============================================================================

/// State of one in-flight authorization attempt.
///
/// Consumed by [`accept_callback`](Self::accept_callback); a fresh instance
/// is created for every attempt.
#[derive(Debug)]
pub struct AuthorizationState {
    nonce: String,
    redirect_uri: Url,
    scopes: Vec<String>,
    pkce: PkceParameters,
}

impl AuthorizationState {
    pub fn new(redirect_uri: Url, scopes: &[String]) -> Self {
        Self {
            nonce: new_nonce(),
            redirect_uri,
            scopes: scopes.to_vec(),
            pkce: PkceParameters::generate(),
        }
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    pub fn pkce(&self) -> &PkceParameters {
        &self.pkce
    }

    /// Validate a redirect callback and extract the authorization code.
    ///
    /// `state` is checked before anything else in the callback is looked at.
    /// When both `error` and `code` are present, `error` wins.
    pub fn accept_callback(self, callback: &Url) -> Result<AuthorizationCodeResult> {
        let params: HashMap<String, String> = callback.query_pairs().into_owned().collect();

        match params.get("state").map(String::as_str) {
            None => {
                return Err(OAuthError::StateMismatch(
                    "redirect did not include a state parameter".to_string(),
                ));
            }
            Some("") => {
                return Err(OAuthError::StateMismatch(
                    "redirect included an empty state parameter".to_string(),
                ));
            }
            Some(state) if state != self.nonce => {
                return Err(OAuthError::StateMismatch(
                    "redirect state does not match the request".to_string(),
                ));
            }
            Some(_) => {}
        }

        if let Some(error) = params.get("error") {
            return Err(OAuthError::Protocol(OAuth2ErrorResponse {
                error: error.clone(),
                error_description: params.get("error_description").cloned(),
                error_uri: params.get("error_uri").cloned(),
            }));
        }

        match params.get("code") {
            Some(code) if !code.is_empty() => Ok(AuthorizationCodeResult {
                code: code.clone(),
                redirect_uri: Some(self.redirect_uri),
                code_verifier: self.pkce.code_verifier,
            }),
            _ => Err(OAuthError::Protocol(
                OAuth2ErrorResponse::new("invalid_request")
                    .with_description("redirect did not include an authorization code"),
            )),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// OAuth 2.0 client bound to one authorization server and client id.
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    http: reqwest::Client,
    config: OAuth2ClientConfig,
}

impl OAuth2Client {
    /// Create a client with its own HTTP connection pool.
    pub fn new(config: OAuth2ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("gitcred/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    /// Create a client that reuses an existing HTTP client.
    pub fn with_http_client(http: reqwest::Client, config: OAuth2ClientConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OAuth2ClientConfig {
        &self.config
    }

    /// Build the authorization endpoint URL for an attempt.
    ///
    /// Extra parameters are appended after the standard ones and may not
    /// override them.
    pub fn authorization_url(
        &self,
        state: &AuthorizationState,
        extra_params: &[(String, String)],
    ) -> Result<Url> {
        check_extra_params(extra_params)?;

        let mut params: Vec<(&str, &str)> = vec![
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", state.redirect_uri.as_str()),
            ("state", state.nonce.as_str()),
            ("code_challenge", state.pkce.code_challenge.as_str()),
            ("code_challenge_method", state.pkce.challenge_method()),
        ];
        let scope = state.scopes.join(" ");
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        for (name, value) in extra_params {
            params.push((name.as_str(), value.as_str()));
        }

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut url = self.config.endpoints.authorization.clone();
        let combined = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, query),
            _ => query,
        };
        url.set_query(Some(&combined));
        Ok(url)
    }

    /// Run the browser step of the authorization code grant.
    ///
    /// The loopback listener is accepting before the browser is asked to
    /// navigate. The wait ends on the redirect, on `cancel`, or on the
    /// configured browser timeout.
    pub async fn get_authorization_code(
        &self,
        scopes: &[String],
        extra_params: &[(String, String)],
        browser: &dyn WebBrowser,
        cancel: &CancellationToken,
    ) -> Result<AuthorizationCodeResult> {
        let redirect_uri = self.config.redirect_uri.as_ref().ok_or_else(|| {
            OAuthError::Config("no redirect URI configured for the authorization code grant".into())
        })?;
        check_extra_params(extra_params)?;

        let listener = LoopbackListener::bind(redirect_uri).await?;
        let state = AuthorizationState::new(listener.redirect_uri().clone(), scopes);
        let url = self.authorization_url(&state, extra_params)?;

        tracing::info!(
            endpoint = %self.config.endpoints.authorization,
            redirect = %state.redirect_uri,
            "Starting authorization code flow"
        );
        browser.open(&url).await?;

        let callback = listener.wait(cancel, self.config.browser_timeout).await?;
        let result = state.accept_callback(&callback)?;
        tracing::debug!("Authorization code received");
        Ok(result)
    }

    /// Exchange an authorization code for tokens.
    pub async fn get_token_by_authorization_code(
        &self,
        authorization: &AuthorizationCodeResult,
    ) -> Result<TokenResult> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", authorization.code.as_str()),
            ("code_verifier", authorization.code_verifier.as_str()),
        ];
        if let Some(redirect_uri) = &authorization.redirect_uri {
            form.push(("redirect_uri", redirect_uri.as_str()));
        }
        self.push_client_credentials(&mut form);

        let endpoint = &self.config.endpoints.token;
        let (status, body) = self.post_form(endpoint, &form).await?;
        parse_response::<TokenEndpointResponse>(endpoint, status, &body).map(TokenResult::from)
    }

    /// Start a device authorization grant.
    pub async fn get_device_code(&self, scopes: &[String]) -> Result<DeviceCodeResult> {
        let endpoint = self
            .config
            .endpoints
            .device_authorization
            .as_ref()
            .ok_or_else(|| {
                OAuthError::Config("no device authorization endpoint configured".into())
            })?;

        let scope = scopes.join(" ");
        let mut form: Vec<(&str, &str)> = vec![("client_id", self.config.client_id.as_str())];
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }

        let (status, body) = self.post_form(endpoint, &form).await?;
        let device: DeviceCodeResult =
            parse_response::<DeviceAuthorizationResponse>(endpoint, status, &body)?.into();
        tracing::debug!(
            expires_in = device.expires_in.as_secs(),
            interval = device.interval.as_secs(),
            "Device code issued"
        );
        Ok(device)
    }

    /// Poll the token endpoint until the user completes the device grant.
    ///
    /// Polling stops on success, on any error other than
    /// `authorization_pending`/`slow_down`, on `cancel`, or when the next
    /// wait would run past `expires_in`.
    pub async fn get_token_by_device_code(
        &self,
        device: &DeviceCodeResult,
        cancel: &CancellationToken,
    ) -> Result<TokenResult> {
        // A lifetime too large to represent never expires on its own.
        let deadline = Instant::now().checked_add(device.expires_in);
        let mut interval = device.interval;

        loop {
            let expired = match (deadline, Instant::now().checked_add(interval)) {
                (Some(deadline), Some(next)) => next > deadline,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if expired {
                tracing::warn!("Device code expired before authorization completed");
                return Err(OAuthError::Timeout(device.expires_in));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(OAuthError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }

            match self.request_device_token(device).await {
                Ok(token) => return Ok(token),
                Err(OAuthError::Protocol(error)) => match next_poll_interval(interval, &error) {
                    Some(next) => {
                        tracing::debug!(error = %error.error, interval = next.as_secs(), "Device authorization pending");
                        interval = next;
                    }
                    None => return Err(OAuthError::Protocol(error)),
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Failure is returned to the caller; re-authorization is the caller's call.
    pub async fn get_token_by_refresh_token(&self, refresh_token: &str) -> Result<TokenResult> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(redirect_uri) = &self.config.redirect_uri {
            form.push(("redirect_uri", redirect_uri.as_str()));
        }
        self.push_client_credentials(&mut form);

        let endpoint = &self.config.endpoints.token;
        let (status, body) = self.post_form(endpoint, &form).await?;
        parse_response::<TokenEndpointResponse>(endpoint, status, &body).map(TokenResult::from)
    }

    async fn request_device_token(&self, device: &DeviceCodeResult) -> Result<TokenResult> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", DEVICE_CODE_GRANT_TYPE),
            ("device_code", device.device_code.as_str()),
        ];
        self.push_client_credentials(&mut form);

        let endpoint = &self.config.endpoints.token;
        let (status, body) = self.post_form(endpoint, &form).await?;
        parse_response::<TokenEndpointResponse>(endpoint, status, &body).map(TokenResult::from)
    }

    fn push_client_credentials<'a>(&'a self, form: &mut Vec<(&'a str, &'a str)>) {
        form.push(("client_id", self.config.client_id.as_str()));
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
    }

    async fn post_form(&self, endpoint: &Url, form: &[(&str, &str)]) -> Result<(StatusCode, String)> {
        let mut request = self
            .http
            .post(endpoint.clone())
            .header(ACCEPT, "application/json")
            .form(form);
        if self.config.use_auth_header
            && let Some(secret) = &self.config.client_secret
        {
            request = request.basic_auth(&self.config.client_id, Some(secret));
        }

        let response = request
            .send()
            .await
            .map_err(|e| OAuthError::Network(format!("request to {} failed: {}", endpoint, e)))?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(endpoint = %endpoint, status = status.as_u16(), "Authorization server replied");
        Ok((status, body))
    }
}

/// Decide how polling continues after an OAuth error.
///
/// Returns the next interval, or `None` when the error is terminal.
pub fn next_poll_interval(current: Duration, error: &OAuth2ErrorResponse) -> Option<Duration> {
    match error.code() {
        OAuth2ErrorCode::AuthorizationPending => Some(current),
        OAuth2ErrorCode::SlowDown => Some(current.saturating_add(SLOW_DOWN_INCREMENT)),
        _ => None,
    }
}

fn check_extra_params(extra_params: &[(String, String)]) -> Result<()> {
    for (name, _) in extra_params {
        if STANDARD_AUTHORIZE_PARAMS
            .iter()
            .any(|standard| standard.eq_ignore_ascii_case(name))
        {
            return Err(OAuthError::InvalidRequest(format!(
                "extra query parameter '{}' would override a standard parameter",
                name
            )));
        }
    }
    Ok(())
}

/// Interpret an authorization server reply.
///
/// A 2xx body carrying an `error` member is an OAuth error; other 2xx bodies
/// must parse as `T`. A non-2xx reply is an OAuth error when its body says so
/// and an HTTP status error otherwise.
fn parse_response<T: DeserializeOwned>(endpoint: &Url, status: StatusCode, body: &str) -> Result<T> {
    let malformed = |message: String| OAuthError::MalformedResponse {
        endpoint: endpoint.to_string(),
        message,
    };

    if status.is_success() {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
        if value.get("error").is_some() {
            let error: OAuth2ErrorResponse =
                serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
            return Err(OAuthError::Protocol(error));
        }
        return serde_json::from_value(value).map_err(|e| malformed(e.to_string()));
    }

    match serde_json::from_str::<OAuth2ErrorResponse>(body) {
        Ok(error) => Err(OAuthError::Protocol(error)),
        Err(_) => Err(OAuthError::HttpStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: body.to_string(),
        }),
    }
}
