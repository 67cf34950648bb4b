//! Settings resolution: environment, then config file, then defaults.
//!
//! Every accessor reports where its value came from so `--verbose` output
//! can explain why a setting took effect.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::env::EnvVars;
use crate::types::{GitcredConfig, OAuthField, OAuthSection};
use crate::{ConfigError, LoadedConfig, Result};

/// Namespace prefix of credential store keys.
pub const DEFAULT_NAMESPACE: &str = "git";

/// Provider id that requests auto-detection.
pub const AUTO_PROVIDER: &str = "auto";

pub const DEFAULT_AUTODETECT_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

/// File name of the plaintext store inside the config directory.
const PLAINTEXT_STORE_FILE: &str = "credentials.json";

pub const PROVIDER_ENV: &str = "GITCRED_PROVIDER";
pub const NAMESPACE_ENV: &str = "GITCRED_NAMESPACE";
pub const STORE_ENV: &str = "GITCRED_CREDENTIAL_STORE";
pub const STORE_PATH_ENV: &str = "GITCRED_PLAINTEXT_STORE_PATH";
pub const AUTODETECT_TIMEOUT_ENV: &str = "GITCRED_AUTODETECT_TIMEOUT";
pub const HTTP_TIMEOUT_ENV: &str = "GITCRED_HTTP_TIMEOUT";
pub const BROWSER_TIMEOUT_ENV: &str = "GITCRED_BROWSER_TIMEOUT";
pub const INTERACTIVE_ENV: &str = "GITCRED_INTERACTIVE";

// ─────────────────────────────────────────────────────────────────────────────
// Provenance
// ─────────────────────────────────────────────────────────────────────────────

/// Where a setting was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingSource {
    EnvVar(String),
    /// Dotted config key, e.g. `credential.namespace`.
    ConfigFile(String),
    Default,
}

impl std::fmt::Display for SettingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingSource::EnvVar(var) => write!(f, "env var {}", var),
            SettingSource::ConfigFile(key) => write!(f, "config key {}", key),
            SettingSource::Default => write!(f, "default"),
        }
    }
}

/// A setting value together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: SettingSource,
}

impl<T> Resolved<T> {
    fn new(value: T, source: SettingSource) -> Self {
        Self { value, source }
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            source: self.source,
        }
    }
}

/// Credential store backend selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Plaintext,
    Keyring,
}

impl StoreKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "plaintext" => Some(StoreKind::Plaintext),
            "keyring" | "secretservice" | "keychain" | "wincredman" => Some(StoreKind::Keyring),
            _ => None,
        }
    }
}

/// Client registration overrides for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOverrides {
    pub client_id: Option<Resolved<String>>,
    pub client_secret: Option<Resolved<String>>,
    pub redirect_uri: Option<Resolved<String>>,
}

/// Parse Git-style booleans (`true/1/on/yes`, `false/0/off/no`).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Effective settings: a merged config file plus an environment snapshot.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    config: GitcredConfig,
    env: EnvVars,
    config_dir: Option<PathBuf>,
}

impl Settings {
    pub fn new(config: GitcredConfig, env: EnvVars) -> Self {
        Self {
            config,
            env,
            config_dir: None,
        }
    }

    pub fn from_loaded(loaded: LoadedConfig, env: EnvVars) -> Self {
        Self {
            config: loaded.config,
            env,
            config_dir: loaded.config_dir,
        }
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &GitcredConfig {
        &self.config
    }

    pub fn config_dir(&self) -> Option<&std::path::Path> {
        self.config_dir.as_deref()
    }

    /// Look up a string setting: a non-empty env var wins over the config value.
    fn lookup(
        &self,
        env_var: &str,
        config_key: impl FnOnce() -> String,
        config_value: Option<String>,
    ) -> Option<Resolved<String>> {
        if let Some(value) = self.env.get(env_var) {
            return Some(Resolved::new(
                value.to_string(),
                SettingSource::EnvVar(env_var.to_string()),
            ));
        }
        config_value
            .filter(|v| !v.is_empty())
            .map(|v| Resolved::new(v, SettingSource::ConfigFile(config_key())))
    }

    fn lookup_u64(
        &self,
        env_var: &str,
        config_key: &str,
        config_value: Option<u64>,
    ) -> Result<Option<Resolved<u64>>> {
        if let Some(raw) = self.env.get(env_var) {
            let value = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                setting: env_var.to_string(),
                value: raw.to_string(),
                expected: "a non-negative integer".to_string(),
            })?;
            return Ok(Some(Resolved::new(
                value,
                SettingSource::EnvVar(env_var.to_string()),
            )));
        }
        Ok(config_value.map(|v| Resolved::new(v, SettingSource::ConfigFile(config_key.into()))))
    }

    fn credential_value<T: Clone>(
        &self,
        get: impl FnOnce(&crate::CredentialSection) -> &Option<T>,
    ) -> Option<T> {
        self.config.credential.as_ref().and_then(|c| get(c).clone())
    }

    /// Provider id forced by configuration, or `None` for auto-detection.
    pub fn provider_override(&self) -> Option<Resolved<String>> {
        self.lookup(
            PROVIDER_ENV,
            || "credential.provider".into(),
            self.credential_value(|c| &c.provider),
        )
        .filter(|r| !r.value.eq_ignore_ascii_case(AUTO_PROVIDER))
    }

    pub fn namespace(&self) -> Resolved<String> {
        self.lookup(
            NAMESPACE_ENV,
            || "credential.namespace".into(),
            self.credential_value(|c| &c.namespace),
        )
        .unwrap_or_else(|| Resolved::new(DEFAULT_NAMESPACE.to_string(), SettingSource::Default))
    }

    /// Configured credential store, or `None` to let the caller pick.
    pub fn credential_store(&self) -> Result<Option<Resolved<StoreKind>>> {
        let Some(raw) = self.lookup(
            STORE_ENV,
            || "credential.store".into(),
            self.credential_value(|c| &c.store),
        ) else {
            return Ok(None);
        };
        match StoreKind::parse(&raw.value) {
            Some(kind) => Ok(Some(Resolved::new(kind, raw.source))),
            None => Err(ConfigError::InvalidValue {
                setting: raw.source.to_string(),
                value: raw.value,
                expected: "'plaintext' or 'keyring'".to_string(),
            }),
        }
    }

    /// File backing the plaintext store; defaults into the config directory.
    pub fn plaintext_store_path(&self) -> Option<Resolved<PathBuf>> {
        self.lookup(
            STORE_PATH_ENV,
            || "credential.store_path".into(),
            self.credential_value(|c| &c.store_path),
        )
        .map(|r| r.map(PathBuf::from))
        .or_else(|| {
            self.config_dir
                .as_ref()
                .map(|dir| Resolved::new(dir.join(PLAINTEXT_STORE_FILE), SettingSource::Default))
        })
    }

    /// Timeout of the provider detection probe; zero disables probing.
    pub fn autodetect_timeout(&self) -> Result<Resolved<Duration>> {
        let value = self.lookup_u64(
            AUTODETECT_TIMEOUT_ENV,
            "credential.autodetect_timeout_ms",
            self.credential_value(|c| &c.autodetect_timeout_ms),
        )?;
        Ok(value.map(|r| r.map(Duration::from_millis)).unwrap_or_else(|| {
            Resolved::new(DEFAULT_AUTODETECT_TIMEOUT, SettingSource::Default)
        }))
    }

    pub fn http_timeout(&self) -> Result<Resolved<Duration>> {
        let value = self.lookup_u64(
            HTTP_TIMEOUT_ENV,
            "credential.http_timeout_secs",
            self.credential_value(|c| &c.http_timeout_secs),
        )?;
        Ok(value
            .map(|r| r.map(Duration::from_secs))
            .unwrap_or_else(|| Resolved::new(DEFAULT_HTTP_TIMEOUT, SettingSource::Default)))
    }

    /// Upper bound on the browser wait; `None` waits until cancelled.
    pub fn browser_timeout(&self) -> Result<Option<Duration>> {
        let value = self.lookup_u64(
            BROWSER_TIMEOUT_ENV,
            "credential.browser_timeout_secs",
            self.credential_value(|c| &c.browser_timeout_secs),
        )?;
        Ok(match value {
            Some(r) if r.value == 0 => None,
            Some(r) => Some(Duration::from_secs(r.value)),
            None => Some(DEFAULT_BROWSER_TIMEOUT),
        })
    }

    /// Whether prompting the user is allowed.
    pub fn interactive(&self) -> Result<bool> {
        if let Some(raw) = self.env.get(INTERACTIVE_ENV) {
            return parse_bool(raw).ok_or_else(|| ConfigError::InvalidValue {
                setting: INTERACTIVE_ENV.to_string(),
                value: raw.to_string(),
                expected: "a boolean".to_string(),
            });
        }
        Ok(self.credential_value(|c| &c.interactive).unwrap_or(true))
    }

    /// Resolve a generic OAuth setting for a remote.
    ///
    /// Order: env var, the longest matching `[remote."<url>".oauth]`, then `[oauth]`.
    pub fn oauth_setting(&self, field: OAuthField, remote: &Url) -> Option<Resolved<String>> {
        if let Some(value) = self.env.get(field.env_var()) {
            return Some(Resolved::new(
                value.to_string(),
                SettingSource::EnvVar(field.env_var().to_string()),
            ));
        }

        if let Some((prefix, section)) = self.remote_oauth(remote)
            && let Some(value) = section.get(field).filter(|v| !v.is_empty())
        {
            return Some(Resolved::new(
                value,
                SettingSource::ConfigFile(format!("remote.\"{}\".oauth.{}", prefix, field.key())),
            ));
        }

        self.config
            .oauth
            .as_ref()
            .and_then(|s| s.get(field))
            .filter(|v| !v.is_empty())
            .map(|v| Resolved::new(v, SettingSource::ConfigFile(format!("oauth.{}", field.key()))))
    }

    /// The `[remote."<url>".oauth]` section that best matches `remote`.
    fn remote_oauth(&self, remote: &Url) -> Option<(&str, &OAuthSection)> {
        self.config
            .remote
            .iter()
            .filter_map(|(prefix, section)| {
                let oauth = section.oauth.as_ref()?;
                let len = remote_prefix_len(prefix, remote)?;
                Some((len, prefix.as_str(), oauth))
            })
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, prefix, oauth)| (prefix, oauth))
    }

    /// Client id/secret/redirect overrides for a provider.
    ///
    /// Read from `GITCRED_<ID>_CLIENTID` (and `_CLIENTSECRET`, `_REDIRECTURI`),
    /// then `[provider.<id>]`.
    pub fn client_overrides(&self, provider_id: &str) -> ClientOverrides {
        let prefix = format!("{}{}", crate::env::ENV_PREFIX, env_id(provider_id));
        let section = self.config.provider.get(provider_id);
        let key = |name: &str| format!("provider.{}.{}", provider_id, name);

        ClientOverrides {
            client_id: self.lookup(
                &format!("{}_CLIENTID", prefix),
                || key("client_id"),
                section.and_then(|s| s.client_id.clone()),
            ),
            client_secret: self.lookup(
                &format!("{}_CLIENTSECRET", prefix),
                || key("client_secret"),
                section.and_then(|s| s.client_secret.clone()),
            ),
            redirect_uri: self.lookup(
                &format!("{}_REDIRECTURI", prefix),
                || key("redirect_uri"),
                section.and_then(|s| s.redirect_uri.clone()),
            ),
        }
    }
}

/// Provider id as it appears inside an env var name.
fn env_id(provider_id: &str) -> String {
    provider_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Length of the matched path when `prefix` covers `remote`.
///
/// Scheme, host and port must match; the prefix path must match whole
/// segments.
fn remote_prefix_len(prefix: &str, remote: &Url) -> Option<usize> {
    let prefix = Url::parse(prefix).ok()?;
    if prefix.scheme() != remote.scheme()
        || !prefix.host_str()?.eq_ignore_ascii_case(remote.host_str()?)
        || prefix.port_or_known_default() != remote.port_or_known_default()
    {
        return None;
    }

    let prefix_path = prefix.path().trim_end_matches('/');
    let remote_path = remote.path();
    let covers = prefix_path.is_empty()
        || remote_path == prefix_path
        || remote_path
            .strip_prefix(prefix_path)
            .is_some_and(|rest| rest.starts_with('/'));
    covers.then_some(prefix_path.len())
}
