//! Browser collaborator used by the authorization code flow.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

/// Opens an authorization URL for the user.
#[async_trait]
pub trait WebBrowser: Send + Sync {
    async fn open(&self, url: &Url) -> Result<()>;
}

/// Launches the platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

#[async_trait]
impl WebBrowser for SystemBrowser {
    async fn open(&self, url: &Url) -> Result<()> {
        tracing::debug!(host = url.host_str().unwrap_or_default(), "Opening system browser");
        open_url(url.as_str())?;
        Ok(())
    }
}

fn open_url(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        // `start` treats the first quoted argument as a window title.
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()?;
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    Ok(())
}
