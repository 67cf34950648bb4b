//! Request attributes received from Git and the credential handed back.

use std::fmt;

use url::Url;

/// Attributes of one credential request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestInput {
    protocol: Option<String>,
    /// May include a port (`example.com:8443`).
    host: Option<String>,
    path: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl RequestInput {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            protocol: Some(protocol.into()),
            host: Some(host.into()),
            ..Self::default()
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// True when both protocol and host are present and non-blank.
    pub fn is_resolvable(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.protocol) && present(&self.host)
    }

    pub fn is_http(&self) -> bool {
        self.protocol
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("http") || p.eq_ignore_ascii_case("https"))
    }

    /// `protocol://host/path` of the remote, without user info.
    pub fn remote_url(&self) -> Option<Url> {
        if !self.is_resolvable() {
            return None;
        }
        let protocol = self.protocol.as_deref()?;
        let host = self.host.as_deref()?;
        let path = self.path.as_deref().unwrap_or("").trim_start_matches('/');
        Url::parse(&format!("{}://{}/{}", protocol, host, path)).ok()
    }
}

impl fmt::Debug for RequestInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInput")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("path", &self.path)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

/// Username and password returned to Git.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolvable() {
        assert!(RequestInput::new("https", "example.com").is_resolvable());
        assert!(!RequestInput::new("https", "").is_resolvable());
        assert!(!RequestInput::new(" ", "example.com").is_resolvable());
        assert!(!RequestInput::default().with_host("example.com").is_resolvable());
    }

    #[test]
    fn test_remote_url() {
        let input = RequestInput::new("https", "example.com:8443")
            .with_path("org/repo.git")
            .with_username("alice");
        assert_eq!(
            input.remote_url().unwrap().as_str(),
            "https://example.com:8443/org/repo.git"
        );
        assert!(input.is_http());
        assert!(!RequestInput::new("smtp", "mail.example.com").is_http());
        assert!(RequestInput::default().remote_url().is_none());
    }

    #[test]
    fn test_debug_hides_password() {
        let input = RequestInput::new("https", "example.com").with_password("hunter2");
        assert!(!format!("{:?}", input).contains("hunter2"));

        let credential = Credential::new("alice", "hunter2");
        assert!(!format!("{:?}", credential).contains("hunter2"));
    }
}
