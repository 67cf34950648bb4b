//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [credential]                           # helper behaviour
//! [oauth]                                # generic OAuth for every remote
//! [remote."https://git.example.com".oauth]  # per-remote OAuth overrides
//! [provider.github]                      # per-provider client overrides
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Replace `base` with `top` when `top` is set.
fn overlay<T>(base: &mut Option<T>, top: Option<T>) {
    if top.is_some() {
        *base = top;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial layers can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitcredConfig {
    pub credential: Option<CredentialSection>,

    /// Generic OAuth settings applied to every remote.
    pub oauth: Option<OAuthSection>,

    /// Per-remote sections keyed by remote URL prefix.
    pub remote: HashMap<String, RemoteSection>,

    /// Per-provider client overrides keyed by provider id.
    pub provider: HashMap<String, ProviderSection>,
}

impl GitcredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Merging is per key: a layer that sets one field of a section keeps
    /// the fields it does not mention.
    pub fn merge(&mut self, other: GitcredConfig) {
        match (&mut self.credential, other.credential) {
            (Some(base), Some(top)) => base.merge(top),
            (base, top) => overlay(base, top),
        }

        match (&mut self.oauth, other.oauth) {
            (Some(base), Some(top)) => base.merge(top),
            (base, top) => overlay(base, top),
        }

        for (url, section) in other.remote {
            match self.remote.get_mut(&url) {
                Some(existing) => existing.merge(section),
                None => {
                    self.remote.insert(url, section);
                }
            }
        }

        for (id, section) in other.provider {
            match self.provider.get_mut(&id) {
                Some(existing) => existing.merge(section),
                None => {
                    self.provider.insert(id, section);
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[credential]`: helper behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSection {
    /// Provider id to use instead of auto-detection (`auto` to detect).
    pub provider: Option<String>,
    /// Prefix of every credential store key.
    pub namespace: Option<String>,
    /// Credential store backend (`plaintext` or `keyring`).
    pub store: Option<String>,
    /// File used by the plaintext store.
    pub store_path: Option<String>,
    /// Timeout for the provider detection probe; 0 disables probing.
    pub autodetect_timeout_ms: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    /// Upper bound on the browser wait; 0 waits until cancelled.
    pub browser_timeout_secs: Option<u64>,
    /// When false, anything that would prompt fails instead.
    pub interactive: Option<bool>,
}

impl CredentialSection {
    fn merge(&mut self, other: CredentialSection) {
        overlay(&mut self.provider, other.provider);
        overlay(&mut self.namespace, other.namespace);
        overlay(&mut self.store, other.store);
        overlay(&mut self.store_path, other.store_path);
        overlay(&mut self.autodetect_timeout_ms, other.autodetect_timeout_ms);
        overlay(&mut self.http_timeout_secs, other.http_timeout_secs);
        overlay(&mut self.browser_timeout_secs, other.browser_timeout_secs);
        overlay(&mut self.interactive, other.interactive);
    }
}

/// `[oauth]` and `[remote."<url>".oauth]`: generic OAuth settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSection {
    /// Absolute, or relative to the remote URL.
    pub authorize_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub device_endpoint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    /// Space-separated scope list.
    pub scopes: Option<String>,
    pub use_client_auth_header: Option<bool>,
    pub default_username: Option<String>,
    /// Comma-separated interactive modes (`browser`, `devicecode`).
    pub modes: Option<String>,
}

impl OAuthSection {
    fn merge(&mut self, other: OAuthSection) {
        overlay(&mut self.authorize_endpoint, other.authorize_endpoint);
        overlay(&mut self.token_endpoint, other.token_endpoint);
        overlay(&mut self.device_endpoint, other.device_endpoint);
        overlay(&mut self.client_id, other.client_id);
        overlay(&mut self.client_secret, other.client_secret);
        overlay(&mut self.redirect_uri, other.redirect_uri);
        overlay(&mut self.scopes, other.scopes);
        overlay(&mut self.use_client_auth_header, other.use_client_auth_header);
        overlay(&mut self.default_username, other.default_username);
        overlay(&mut self.modes, other.modes);
    }

    /// Look up a field as its string form.
    pub fn get(&self, field: OAuthField) -> Option<String> {
        match field {
            OAuthField::AuthorizeEndpoint => self.authorize_endpoint.clone(),
            OAuthField::TokenEndpoint => self.token_endpoint.clone(),
            OAuthField::DeviceEndpoint => self.device_endpoint.clone(),
            OAuthField::ClientId => self.client_id.clone(),
            OAuthField::ClientSecret => self.client_secret.clone(),
            OAuthField::RedirectUri => self.redirect_uri.clone(),
            OAuthField::Scopes => self.scopes.clone(),
            OAuthField::UseClientAuthHeader => self.use_client_auth_header.map(|b| b.to_string()),
            OAuthField::DefaultUsername => self.default_username.clone(),
            OAuthField::Modes => self.modes.clone(),
        }
    }
}

/// The generic OAuth settings, each readable from env or config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthField {
    AuthorizeEndpoint,
    TokenEndpoint,
    DeviceEndpoint,
    ClientId,
    ClientSecret,
    RedirectUri,
    Scopes,
    UseClientAuthHeader,
    DefaultUsername,
    Modes,
}

impl OAuthField {
    /// Environment variable that overrides this field.
    pub fn env_var(&self) -> &'static str {
        match self {
            OAuthField::AuthorizeEndpoint => "GITCRED_OAUTH_AUTHORIZE_ENDPOINT",
            OAuthField::TokenEndpoint => "GITCRED_OAUTH_TOKEN_ENDPOINT",
            OAuthField::DeviceEndpoint => "GITCRED_OAUTH_DEVICE_ENDPOINT",
            OAuthField::ClientId => "GITCRED_OAUTH_CLIENTID",
            OAuthField::ClientSecret => "GITCRED_OAUTH_CLIENTSECRET",
            OAuthField::RedirectUri => "GITCRED_OAUTH_REDIRECTURI",
            OAuthField::Scopes => "GITCRED_OAUTH_SCOPES",
            OAuthField::UseClientAuthHeader => "GITCRED_OAUTH_USE_CLIENT_AUTH_HEADER",
            OAuthField::DefaultUsername => "GITCRED_OAUTH_DEFAULT_USERNAME",
            OAuthField::Modes => "GITCRED_OAUTH_AUTHMODES",
        }
    }

    /// Key of this field inside an `oauth` table.
    pub fn key(&self) -> &'static str {
        match self {
            OAuthField::AuthorizeEndpoint => "authorize_endpoint",
            OAuthField::TokenEndpoint => "token_endpoint",
            OAuthField::DeviceEndpoint => "device_endpoint",
            OAuthField::ClientId => "client_id",
            OAuthField::ClientSecret => "client_secret",
            OAuthField::RedirectUri => "redirect_uri",
            OAuthField::Scopes => "scopes",
            OAuthField::UseClientAuthHeader => "use_client_auth_header",
            OAuthField::DefaultUsername => "default_username",
            OAuthField::Modes => "modes",
        }
    }
}

/// `[remote."<url>"]`: settings scoped to remotes under a URL prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub oauth: Option<OAuthSection>,
}

impl RemoteSection {
    fn merge(&mut self, other: RemoteSection) {
        match (&mut self.oauth, other.oauth) {
            (Some(base), Some(top)) => base.merge(top),
            (base, top) => overlay(base, top),
        }
    }
}

/// `[provider.<id>]`: client registration overrides for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl ProviderSection {
    fn merge(&mut self, other: ProviderSection) {
        overlay(&mut self.client_id, other.client_id);
        overlay(&mut self.client_secret, other.client_secret);
        overlay(&mut self.redirect_uri, other.redirect_uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = GitcredConfig::from_toml(
            r#"
[credential]
provider = "generic"
namespace = "work"
autodetect_timeout_ms = 0
interactive = false

[oauth]
authorize_endpoint = "/login/oauth/authorize"
token_endpoint = "/login/oauth/token"
redirect_uri = "http://127.0.0.1/callback"
scopes = "repo gist"
use_client_auth_header = false

[remote."https://git.example.com/team".oauth]
client_id = "team-client"

[provider.github]
client_id = "gh-client"
"#,
        )
        .unwrap();

        let credential = config.credential.as_ref().unwrap();
        assert_eq!(credential.provider.as_deref(), Some("generic"));
        assert_eq!(credential.autodetect_timeout_ms, Some(0));
        assert_eq!(credential.interactive, Some(false));

        let oauth = config.oauth.as_ref().unwrap();
        assert_eq!(oauth.get(OAuthField::Scopes).as_deref(), Some("repo gist"));
        assert_eq!(
            oauth.get(OAuthField::UseClientAuthHeader).as_deref(),
            Some("false")
        );

        let remote = &config.remote["https://git.example.com/team"];
        assert_eq!(
            remote.oauth.as_ref().unwrap().client_id.as_deref(),
            Some("team-client")
        );
        assert_eq!(
            config.provider["github"].client_id.as_deref(),
            Some("gh-client")
        );
    }

    #[test]
    fn test_empty_config() {
        let config = GitcredConfig::from_toml("").unwrap();
        assert_eq!(config, GitcredConfig::new());
    }

    #[test]
    fn test_merge_keeps_unmentioned_fields() {
        let mut base = GitcredConfig::from_toml(
            r#"
[credential]
namespace = "base"
store = "plaintext"

[oauth]
client_id = "base-client"
scopes = "repo"
"#,
        )
        .unwrap();
        let top = GitcredConfig::from_toml(
            r#"
[credential]
namespace = "top"

[oauth]
client_id = "top-client"

[provider.gitlab]
client_id = "gl"
"#,
        )
        .unwrap();

        base.merge(top);
        let credential = base.credential.as_ref().unwrap();
        assert_eq!(credential.namespace.as_deref(), Some("top"));
        assert_eq!(credential.store.as_deref(), Some("plaintext"));

        let oauth = base.oauth.as_ref().unwrap();
        assert_eq!(oauth.client_id.as_deref(), Some("top-client"));
        assert_eq!(oauth.scopes.as_deref(), Some("repo"));
        assert!(base.provider.contains_key("gitlab"));
    }

    #[test]
    fn test_unknown_type_is_parse_error() {
        let err = GitcredConfig::from_toml("[credential]\ninteractive = \"maybe\"").unwrap_err();
        assert!(matches!(err, crate::ConfigError::Parse(_)));
    }
}
