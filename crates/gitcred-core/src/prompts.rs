//! User interaction collaborators.

use std::fmt;

use async_trait::async_trait;
use gitcred_oauth::DeviceCodeResult;
use url::Url;

use crate::error::{Error, Result};
use crate::input::Credential;

/// Interactive OAuth flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthMode {
    /// Authorization code grant through the system browser.
    Browser,
    /// Device authorization grant with a user code.
    DeviceCode,
}

impl OAuthMode {
    pub const ALL: [OAuthMode; 2] = [OAuthMode::Browser, OAuthMode::DeviceCode];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "browser" => Some(OAuthMode::Browser),
            "devicecode" | "device-code" | "device" => Some(OAuthMode::DeviceCode),
            _ => None,
        }
    }

    /// Parse a comma or space separated list; `all` selects every mode.
    ///
    /// Returns `None` if any entry is unknown or the list is empty.
    pub fn parse_list(value: &str) -> Option<Vec<Self>> {
        let mut modes = Vec::new();
        for item in value.split([',', ' ']).filter(|s| !s.trim().is_empty()) {
            if item.trim().eq_ignore_ascii_case("all") {
                return Some(Self::ALL.to_vec());
            }
            let mode = Self::parse(item)?;
            if !modes.contains(&mode) {
                modes.push(mode);
            }
        }
        (!modes.is_empty()).then_some(modes)
    }
}

impl fmt::Display for OAuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthMode::Browser => write!(f, "browser"),
            OAuthMode::DeviceCode => write!(f, "device code"),
        }
    }
}

/// Prompts shown to the user while acquiring a credential.
#[async_trait]
pub trait Prompts: Send + Sync {
    /// Pick one of `modes` (always more than one).
    async fn select_oauth_mode(&self, remote: &Url, modes: &[OAuthMode]) -> Result<OAuthMode>;

    /// Tell the user where to enter the device code. Must not block on input.
    async fn show_device_code(&self, device: &DeviceCodeResult) -> Result<()>;

    /// Ask for a username and password.
    async fn basic_credentials(&self, remote: &Url, username: Option<&str>) -> Result<Credential>;
}

/// Refuses every prompt; used when interaction is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractivePrompts;

fn disabled(what: &str) -> Error {
    Error::Configuration(format!("{} requires interaction, which is disabled", what))
}

#[async_trait]
impl Prompts for NonInteractivePrompts {
    async fn select_oauth_mode(&self, _remote: &Url, _modes: &[OAuthMode]) -> Result<OAuthMode> {
        Err(disabled("choosing an authentication mode"))
    }

    async fn show_device_code(&self, _device: &DeviceCodeResult) -> Result<()> {
        Err(disabled("device code authentication"))
    }

    async fn basic_credentials(&self, remote: &Url, _username: Option<&str>) -> Result<Credential> {
        Err(disabled(&format!("entering credentials for {}", remote)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(OAuthMode::parse("Browser"), Some(OAuthMode::Browser));
        assert_eq!(OAuthMode::parse("devicecode"), Some(OAuthMode::DeviceCode));
        assert_eq!(OAuthMode::parse("carrier-pigeon"), None);

        assert_eq!(
            OAuthMode::parse_list("devicecode, browser"),
            Some(vec![OAuthMode::DeviceCode, OAuthMode::Browser])
        );
        assert_eq!(OAuthMode::parse_list("all"), Some(OAuthMode::ALL.to_vec()));
        assert_eq!(OAuthMode::parse_list("browser,bogus"), None);
        assert_eq!(OAuthMode::parse_list(" , "), None);
    }

    #[tokio::test]
    async fn test_non_interactive_prompts_fail_with_configuration_error() {
        let remote = Url::parse("https://example.com/").unwrap();
        let err = NonInteractivePrompts
            .basic_credentials(&remote, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }
}
