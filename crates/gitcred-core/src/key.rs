//! Credential store keys.
//!
//! A key renders as `{namespace}:{protocol}://[{user}@]{host}[/{path}]`.
//! Stores index secrets by the user-less [`service`](CredentialKey::service)
//! and the [`account`](CredentialKey::account).

use std::fmt;

use gitcred_config::settings::DEFAULT_NAMESPACE;

use crate::input::RequestInput;

/// Stable, namespaced identity of one stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    namespace: String,
    protocol: String,
    host: String,
    /// Already percent-encoded, without surrounding slashes.
    path: Option<String>,
    account: Option<String>,
}

impl CredentialKey {
    /// Build a key from raw request attributes.
    ///
    /// Protocol and host are lower-cased; the path is trimmed of `/` and
    /// dropped when empty. A `None` username and an empty one give distinct
    /// keys.
    pub fn new(
        namespace: &str,
        protocol: &str,
        host: &str,
        path: Option<&str>,
        username: Option<&str>,
    ) -> Self {
        let path = path
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.split('/')
                    .map(|segment| urlencoding::encode(segment).into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            });

        Self {
            namespace: namespace.to_string(),
            protocol: protocol.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            path,
            account: username.map(str::to_string),
        }
    }

    /// Key for a request. Missing protocol or host contribute empty strings.
    pub fn for_input(namespace: &str, input: &RequestInput) -> Self {
        Self::new(
            namespace,
            input.protocol().unwrap_or_default(),
            input.host().unwrap_or_default(),
            input.path(),
            input.username(),
        )
    }

    /// Same key on a different host, keeping namespace, protocol and path.
    pub fn with_host(&self, host: &str) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            ..self.clone()
        }
    }

    pub fn with_account(&self, account: Option<&str>) -> Self {
        Self {
            account: account.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Everything but the user: the store's service name.
    pub fn service(&self) -> String {
        let mut service = format!(
            "{}:{}://{}",
            self.namespace,
            self.protocol,
            encode_host(&self.host)
        );
        if let Some(path) = &self.path {
            service.push('/');
            service.push_str(path);
        }
        service
    }

    /// The username, unencoded.
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}://", self.namespace, self.protocol)?;
        if let Some(account) = &self.account {
            write!(f, "{}@", urlencoding::encode(account))?;
        }
        write!(f, "{}", encode_host(&self.host))?;
        if let Some(path) = &self.path {
            write!(f, "/{}", path)?;
        }
        Ok(())
    }
}

/// Escape the characters that delimit the user, path and query of a key.
fn encode_host(host: &str) -> String {
    host.replace('%', "%25")
        .replace('@', "%40")
        .replace('/', "%2F")
        .replace('?', "%3F")
}

/// Build a key string in the default `git` namespace.
pub fn build_key(protocol: &str, host: &str, path: Option<&str>, username: Option<&str>) -> String {
    CredentialKey::new(DEFAULT_NAMESPACE, protocol, host, path, username).to_string()
}
