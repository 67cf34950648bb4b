//! Generic host provider.
//!
//! Handles any remote. HTTP(S) remotes with a complete `oauth` configuration
//! get OAuth tokens; everything else falls back to a username/password prompt.

use async_trait::async_trait;
use gitcred_config::{OAuthField, Settings, parse_bool};
use gitcred_oauth::{OAuth2Client, OAuth2ClientConfig, OAuth2ServerEndpoints, TokenResult};
use url::Url;

use crate::error::{Error, Result};
use crate::input::{Credential, RequestInput};
use crate::prompts::OAuthMode;
use crate::provider::{HostProvider, ProviderContext};

pub const GENERIC_PROVIDER_ID: &str = "generic";

/// Username returned with OAuth tokens when the request carries none.
pub const DEFAULT_OAUTH_USERNAME: &str = "OAUTH_USER";

/// Host prefix of the store entry holding a remote's refresh token.
const REFRESH_TOKEN_HOST_PREFIX: &str = "refresh_token.";

// ============================================================================
// Configuration
// ============================================================================

/// Generic OAuth settings resolved for one remote.
#[derive(Debug, Clone)]
pub struct GenericOAuthConfig {
    pub endpoints: OAuth2ServerEndpoints,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    pub use_auth_header: bool,
    pub default_username: String,
    pub modes: Vec<OAuthMode>,
}

impl GenericOAuthConfig {
    /// Read the configuration for `remote`.
    ///
    /// Returns `None` unless the authorization endpoint, token endpoint,
    /// client id and redirect URI are all set. Relative endpoints are
    /// resolved against the remote URL.
    pub fn from_settings(settings: &Settings, remote: &Url) -> Option<Self> {
        let get = |field: OAuthField| settings.oauth_setting(field, remote).map(|r| r.value);
        let overrides = settings.client_overrides(GENERIC_PROVIDER_ID);

        let authorization = join_endpoint(remote, get(OAuthField::AuthorizeEndpoint)?)?;
        let token = join_endpoint(remote, get(OAuthField::TokenEndpoint)?)?;
        let mut endpoints = OAuth2ServerEndpoints::new(authorization, token);
        if let Some(device) = get(OAuthField::DeviceEndpoint).and_then(|d| join_endpoint(remote, d)) {
            endpoints = endpoints.with_device_authorization(device);
        }

        let Some(client_id) = get(OAuthField::ClientId).or(overrides.client_id.map(|r| r.value))
        else {
            tracing::debug!(remote = %remote, "OAuth configuration has no client id");
            return None;
        };
        let client_secret = get(OAuthField::ClientSecret).or(overrides.client_secret.map(|r| r.value));

        let raw_redirect = get(OAuthField::RedirectUri).or(overrides.redirect_uri.map(|r| r.value))?;
        let redirect_uri = match Url::parse(&raw_redirect) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(value = %raw_redirect, error = %e, "Invalid OAuth redirect URI");
                return None;
            }
        };

        let scopes = get(OAuthField::Scopes)
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let use_auth_header = match get(OAuthField::UseClientAuthHeader) {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Invalid boolean for use_client_auth_header; using true");
                true
            }),
            None => true,
        };

        let default_username = get(OAuthField::DefaultUsername)
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OAUTH_USERNAME.to_string());

        let modes = match get(OAuthField::Modes) {
            Some(raw) => OAuthMode::parse_list(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Invalid OAuth modes; allowing all");
                OAuthMode::ALL.to_vec()
            }),
            None => OAuthMode::ALL.to_vec(),
        };

        Some(Self {
            endpoints,
            client_id,
            client_secret,
            redirect_uri,
            scopes,
            use_auth_header,
            default_username,
            modes,
        })
    }

    pub fn supports_device_code(&self) -> bool {
        self.endpoints.device_authorization.is_some()
    }

    /// Modes that can actually run with this configuration.
    pub fn available_modes(&self) -> Vec<OAuthMode> {
        self.modes
            .iter()
            .copied()
            .filter(|m| *m != OAuthMode::DeviceCode || self.supports_device_code())
            .collect()
    }

    fn client_config(&self, settings: &Settings) -> Result<OAuth2ClientConfig> {
        let mut config = OAuth2ClientConfig::new(self.endpoints.clone(), self.client_id.clone())
            .with_redirect_uri(self.redirect_uri.clone())
            .with_auth_header(self.use_auth_header)
            .with_http_timeout(settings.http_timeout()?.value);
        if let Some(secret) = &self.client_secret {
            config = config.with_client_secret(secret.clone());
        }
        if let Some(timeout) = settings.browser_timeout()? {
            config = config.with_browser_timeout(timeout);
        }
        Ok(config)
    }
}

fn join_endpoint(remote: &Url, value: String) -> Option<Url> {
    match remote.join(&value) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(value = %value, error = %e, "Invalid OAuth endpoint");
            None
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Fallback provider for any remote with a protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericHostProvider;

impl GenericHostProvider {
    async fn oauth_credential(
        &self,
        ctx: &ProviderContext,
        input: &RequestInput,
        remote: &Url,
        config: GenericOAuthConfig,
    ) -> Result<Credential> {
        let client = OAuth2Client::new(config.client_config(&ctx.settings)?)?;
        let username = input
            .username()
            .filter(|u| !u.is_empty())
            .unwrap_or(config.default_username.as_str())
            .to_string();

        let key = self.credential_key(ctx, input);
        let refresh_service = key
            .with_host(&format!("{}{}", REFRESH_TOKEN_HOST_PREFIX, key.host()))
            .service();

        if let Some(stored) = ctx.store.get(&refresh_service, Some(&username)).await? {
            tracing::debug!(remote = %remote, "Trying stored refresh token");
            match client.get_token_by_refresh_token(&stored.secret).await {
                Ok(token) => {
                    self.save_refresh_token(ctx, &refresh_service, &username, &token)
                        .await?;
                    return Ok(Credential::new(username, token.access_token));
                }
                Err(e) if e.kind() == gitcred_oauth::ErrorKind::Protocol => {
                    tracing::info!(error = %e, "Refresh token rejected; authenticating interactively");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !ctx.settings.interactive()? {
            return Err(Error::Configuration(format!(
                "OAuth authentication for {} requires interaction, which is disabled",
                remote
            )));
        }

        let token = match self.select_mode(ctx, remote, &config).await? {
            OAuthMode::Browser => {
                let authorization = client
                    .get_authorization_code(&config.scopes, &[], ctx.browser.as_ref(), &ctx.cancel)
                    .await?;
                client.get_token_by_authorization_code(&authorization).await?
            }
            OAuthMode::DeviceCode => {
                let device = client.get_device_code(&config.scopes).await?;
                ctx.prompts.show_device_code(&device).await?;
                client.get_token_by_device_code(&device, &ctx.cancel).await?
            }
        };

        self.save_refresh_token(ctx, &refresh_service, &username, &token)
            .await?;
        Ok(Credential::new(username, token.access_token))
    }

    async fn select_mode(
        &self,
        ctx: &ProviderContext,
        remote: &Url,
        config: &GenericOAuthConfig,
    ) -> Result<OAuthMode> {
        match config.available_modes().as_slice() {
            [] => Err(Error::Configuration(
                "no OAuth mode is available; device code needs a device endpoint".into(),
            )),
            [only] => Ok(*only),
            modes => ctx.prompts.select_oauth_mode(remote, modes).await,
        }
    }

    async fn save_refresh_token(
        &self,
        ctx: &ProviderContext,
        service: &str,
        account: &str,
        token: &TokenResult,
    ) -> Result<()> {
        if let Some(refresh_token) = &token.refresh_token {
            ctx.store.add_or_update(service, account, refresh_token).await?;
            tracing::debug!(service = %service, "Refresh token stored");
        }
        Ok(())
    }
}

#[async_trait]
impl HostProvider for GenericHostProvider {
    fn id(&self) -> &str {
        GENERIC_PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Generic"
    }

    fn matches(&self, input: &RequestInput) -> bool {
        input.protocol().is_some_and(|p| !p.trim().is_empty())
    }

    async fn generate_credential(
        &self,
        ctx: &ProviderContext,
        input: &RequestInput,
    ) -> Result<Credential> {
        let remote = input
            .remote_url()
            .ok_or_else(|| Error::InvalidInput("request does not form a valid remote URL".into()))?;

        if input.is_http()
            && let Some(config) = GenericOAuthConfig::from_settings(&ctx.settings, &remote)
        {
            return self.oauth_credential(ctx, input, &remote, config).await;
        }

        tracing::debug!(remote = %remote, "Prompting for basic credentials");
        ctx.prompts.basic_credentials(&remote, input.username()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::Prompts;
    use crate::store::{CredentialStore, MemoryCredentialStore};
    use gitcred_config::{EnvVars, GitcredConfig};
    use gitcred_oauth::{DeviceCodeResult, WebBrowser};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records which prompts were shown.
    #[derive(Default)]
    struct RecordingPrompts {
        mode: Option<OAuthMode>,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Prompts for RecordingPrompts {
        async fn select_oauth_mode(&self, _remote: &Url, modes: &[OAuthMode]) -> Result<OAuthMode> {
            self.calls.lock().push("select");
            Ok(self.mode.unwrap_or(modes[0]))
        }

        async fn show_device_code(&self, device: &DeviceCodeResult) -> Result<()> {
            assert_eq!(device.user_code, "ABCD-1234");
            self.calls.lock().push("device");
            Ok(())
        }

        async fn basic_credentials(&self, _remote: &Url, username: Option<&str>) -> Result<Credential> {
            self.calls.lock().push("basic");
            Ok(Credential::new(username.unwrap_or("prompted"), "typed-password"))
        }
    }

    /// Follows the redirect with a matching state, like a consenting user.
    struct ConsentingBrowser;

    #[async_trait]
    impl WebBrowser for ConsentingBrowser {
        async fn open(&self, url: &Url) -> gitcred_oauth::Result<()> {
            let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
            let mut redirect = Url::parse(&params["redirect_uri"]).unwrap();
            redirect.set_query(Some(&format!("code=auth-code&state={}", params["state"])));
            reqwest::get(redirect).await?;
            Ok(())
        }
    }

    const OAUTH_CONFIG: &str = r#"
[oauth]
authorize_endpoint = "/authorize"
token_endpoint = "/token"
client_id = "gitcred-test"
redirect_uri = "http://127.0.0.1/callback"
scopes = "read write"
"#;

    fn settings(toml: &str, env: &[(&str, &str)]) -> Arc<Settings> {
        Arc::new(Settings::new(
            GitcredConfig::from_toml(toml).unwrap(),
            EnvVars::from_pairs(env.iter().copied()),
        ))
    }

    fn context(
        settings: Arc<Settings>,
        prompts: Arc<RecordingPrompts>,
    ) -> (ProviderContext, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let ctx = ProviderContext::new(settings, store.clone())
            .with_prompts(prompts)
            .with_browser(Arc::new(ConsentingBrowser));
        (ctx, store)
    }

    fn remote_input(server: &MockServer) -> RequestInput {
        let url = Url::parse(&server.uri()).unwrap();
        let host = format!("{}:{}", url.host_str().unwrap(), url.port().unwrap());
        RequestInput::new("http", host).with_path("org/repo.git")
    }

    fn refresh_service(server: &MockServer) -> String {
        let url = Url::parse(&server.uri()).unwrap();
        format!(
            "git:http://refresh_token.{}:{}/org/repo.git",
            url.host_str().unwrap(),
            url.port().unwrap()
        )
    }

    #[test]
    fn test_matches_any_protocol() {
        let provider = GenericHostProvider;
        assert!(provider.matches(&RequestInput::new("https", "example.com")));
        assert!(provider.matches(&RequestInput::new("smtp", "mail.example.com")));
        assert!(!provider.matches(&RequestInput::default().with_host("example.com")));
    }

    #[test]
    fn test_config_resolves_relative_endpoints() {
        let remote = Url::parse("https://git.example.com/org/repo.git").unwrap();
        let config = GenericOAuthConfig::from_settings(&settings(OAUTH_CONFIG, &[]), &remote).unwrap();

        assert_eq!(
            config.endpoints.authorization.as_str(),
            "https://git.example.com/authorize"
        );
        assert_eq!(config.endpoints.token.as_str(), "https://git.example.com/token");
        assert_eq!(config.scopes, vec!["read", "write"]);
        assert!(config.use_auth_header);
        assert_eq!(config.default_username, DEFAULT_OAUTH_USERNAME);
        assert!(!config.supports_device_code());
        assert_eq!(config.available_modes(), vec![OAuthMode::Browser]);
    }

    #[test]
    fn test_config_incomplete_or_overridden() {
        let remote = Url::parse("https://git.example.com/").unwrap();
        let no_redirect = r#"
[oauth]
authorize_endpoint = "/authorize"
token_endpoint = "/token"
client_id = "id"
"#;
        assert!(GenericOAuthConfig::from_settings(&settings(no_redirect, &[]), &remote).is_none());

        let config = GenericOAuthConfig::from_settings(
            &settings(
                OAUTH_CONFIG,
                &[
                    ("GITCRED_OAUTH_DEVICE_ENDPOINT", "https://auth.example.com/device"),
                    ("GITCRED_OAUTH_USE_CLIENT_AUTH_HEADER", "false"),
                    ("GITCRED_OAUTH_AUTHMODES", "devicecode"),
                    ("GITCRED_GENERIC_CLIENTSECRET", "s3cret"),
                ],
            ),
            &remote,
        )
        .unwrap();
        assert!(config.supports_device_code());
        assert!(!config.use_auth_header);
        assert_eq!(config.available_modes(), vec![OAuthMode::DeviceCode]);
        assert_eq!(config.client_secret.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_basic_prompt_without_oauth_config() {
        let prompts = Arc::new(RecordingPrompts::default());
        let (ctx, _store) = context(settings("", &[]), prompts.clone());

        let credential = GenericHostProvider
            .get_credential(&ctx, &RequestInput::new("https", "example.com").with_username("alice"))
            .await
            .unwrap();
        assert_eq!(credential, Credential::new("alice", "typed-password"));
        assert_eq!(*prompts.calls.lock(), vec!["basic"]);
    }

    #[tokio::test]
    async fn test_stored_credential_skips_generation() {
        let prompts = Arc::new(RecordingPrompts::default());
        let (ctx, _store) = context(settings("", &[]), prompts.clone());
        let input = RequestInput::new("https", "example.com");

        GenericHostProvider
            .store_credential(&ctx, &input.clone().with_username("alice").with_password("pw"))
            .await
            .unwrap();
        let credential = GenericHostProvider.get_credential(&ctx, &input).await.unwrap();
        assert_eq!(credential, Credential::new("alice", "pw"));
        assert!(prompts.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stored_refresh_token_is_used_and_rotated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "refreshed-access",
                "token_type": "bearer",
                "refresh_token": "new-refresh"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prompts = Arc::new(RecordingPrompts::default());
        let (ctx, store) = context(settings(OAUTH_CONFIG, &[]), prompts.clone());
        store
            .add_or_update(&refresh_service(&server), "OAUTH_USER", "old-refresh")
            .await
            .unwrap();

        let credential = GenericHostProvider
            .get_credential(&ctx, &remote_input(&server))
            .await
            .unwrap();
        assert_eq!(credential, Credential::new("OAUTH_USER", "refreshed-access"));
        assert!(prompts.calls.lock().is_empty());

        let rotated = store
            .get(&refresh_service(&server), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rotated.secret, "new-refresh");
    }

    #[tokio::test]
    async fn test_empty_username_uses_default_account_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=saved-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "refreshed-access",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prompts = Arc::new(RecordingPrompts::default());
        let (ctx, store) = context(settings(OAUTH_CONFIG, &[]), prompts.clone());
        store
            .add_or_update(&refresh_service(&server), DEFAULT_OAUTH_USERNAME, "saved-refresh")
            .await
            .unwrap();

        let credential = GenericHostProvider
            .get_credential(&ctx, &remote_input(&server).with_username(""))
            .await
            .unwrap();
        assert_eq!(credential, Credential::new(DEFAULT_OAUTH_USERNAME, "refreshed-access"));
        assert!(prompts.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_refresh_token_falls_through_to_device_flow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/device"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dev-code",
                "user_code": "ABCD-1234",
                "verification_uri": "https://example.com/activate",
                "expires_in": 60,
                "interval": 1
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("device_code=dev-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "device-access",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prompts = Arc::new(RecordingPrompts::default());
        let (ctx, store) = context(
            settings(
                OAUTH_CONFIG,
                &[
                    ("GITCRED_OAUTH_DEVICE_ENDPOINT", "/device"),
                    ("GITCRED_OAUTH_AUTHMODES", "devicecode"),
                ],
            ),
            prompts.clone(),
        );
        store
            .add_or_update(&refresh_service(&server), "OAUTH_USER", "revoked")
            .await
            .unwrap();

        let credential = GenericHostProvider
            .get_credential(&ctx, &remote_input(&server))
            .await
            .unwrap();
        assert_eq!(credential, Credential::new("OAUTH_USER", "device-access"));
        assert_eq!(*prompts.calls.lock(), vec!["device"]);
    }

    #[tokio::test]
    async fn test_browser_flow_stores_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "browser-access",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "browser-refresh"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prompts = Arc::new(RecordingPrompts {
            mode: Some(OAuthMode::Browser),
            ..Default::default()
        });
        let (ctx, store) = context(
            settings(
                OAUTH_CONFIG,
                &[("GITCRED_OAUTH_DEVICE_ENDPOINT", "/device")],
            ),
            prompts.clone(),
        );

        let input = remote_input(&server).with_username("alice");
        let credential = GenericHostProvider.get_credential(&ctx, &input).await.unwrap();
        assert_eq!(credential, Credential::new("alice", "browser-access"));
        assert_eq!(*prompts.calls.lock(), vec!["select"]);

        let refresh = store
            .get(&refresh_service(&server), Some("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refresh.secret, "browser-refresh");
    }

    #[tokio::test]
    async fn test_non_interactive_oauth_is_configuration_error() {
        let server = MockServer::start().await;
        let prompts = Arc::new(RecordingPrompts::default());
        let (ctx, _store) = context(
            settings(OAUTH_CONFIG, &[("GITCRED_INTERACTIVE", "false")]),
            prompts.clone(),
        );

        let err = GenericHostProvider
            .get_credential(&ctx, &remote_input(&server))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(prompts.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_during_refresh_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let prompts = Arc::new(RecordingPrompts::default());
        let (ctx, store) = context(settings(OAUTH_CONFIG, &[]), prompts.clone());
        store
            .add_or_update(&refresh_service(&server), "OAUTH_USER", "old-refresh")
            .await
            .unwrap();

        let err = GenericHostProvider
            .get_credential(&ctx, &remote_input(&server))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
        assert!(prompts.calls.lock().is_empty());
    }
}
