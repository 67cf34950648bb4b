//! Loopback redirect listener.
//!
//! A single-shot axum server bound to the redirect URI's host and port. It
//! captures the first request for the redirect path, answers with a small
//! confirmation page, and stops accepting connections. Dropping the listener
//! shuts the server down and releases the port on every exit path.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use url::{Host, Url};

use crate::error::{OAuthError, Result};

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authentication successful</title></head>
<body style="font-family: sans-serif;">
<h1>Authentication successful</h1>
<p>You can close this page and return to Git.</p>
</body>
</html>"#;

/// Returns true when the URL points at this machine.
pub fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// State shared with the callback handler.
struct CallbackState {
    redirect_uri: Url,
    sender: Mutex<Option<oneshot::Sender<Url>>>,
    shutdown: CancellationToken,
}

/// A bound, accepting loopback listener for one authorization attempt.
#[derive(Debug)]
pub struct LoopbackListener {
    redirect_uri: Url,
    local_addr: SocketAddr,
    callback: oneshot::Receiver<Url>,
    shutdown: CancellationToken,
}

impl LoopbackListener {
    /// Bind to the redirect URI's host and port.
    ///
    /// When the URI carries no explicit port an ephemeral one is bound and the
    /// returned listener's [`redirect_uri`](Self::redirect_uri) reflects it.
    /// The listener is accepting connections when this returns.
    pub async fn bind(redirect_uri: &Url) -> Result<Self> {
        if !is_loopback(redirect_uri) {
            return Err(OAuthError::Config(format!(
                "redirect URI '{}' is not a loopback address",
                redirect_uri
            )));
        }

        let ip = match redirect_uri.host() {
            Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
            Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
            _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };
        let port = redirect_uri.port().unwrap_or(0);

        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        let mut redirect_uri = redirect_uri.clone();
        if port == 0 {
            redirect_uri
                .set_port(Some(local_addr.port()))
                .map_err(|_| OAuthError::Config("redirect URI cannot carry a port".to_string()))?;
        }

        let (tx, rx) = oneshot::channel();
        let shutdown = CancellationToken::new();
        let state = Arc::new(CallbackState {
            redirect_uri: redirect_uri.clone(),
            sender: Mutex::new(Some(tx)),
            shutdown: shutdown.clone(),
        });

        let router = callback_router(state);
        let signal = shutdown.clone().cancelled_owned();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(signal)
                .await
            {
                tracing::warn!(error = %e, "Loopback listener terminated with an error");
            }
        });

        tracing::debug!(addr = %local_addr, uri = %redirect_uri, "Loopback listener accepting");

        Ok(Self {
            redirect_uri,
            local_addr,
            callback: rx,
            shutdown,
        })
    }

    /// The redirect URI the authorization server must send the browser to.
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the browser redirect, a cancellation, or the timeout.
    ///
    /// Consumes the listener; the server is stopped whichever way this ends.
    pub async fn wait(
        mut self,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<Url> {
        let deadline = async {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Authorization wait cancelled");
                Err(OAuthError::Cancelled)
            }
            received = &mut self.callback => received.map_err(|_| {
                OAuthError::Network("loopback listener stopped before a redirect arrived".to_string())
            }),
            _ = deadline => Err(OAuthError::Timeout(timeout.unwrap_or_default())),
        }
    }
}

impl Drop for LoopbackListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Build the axum router serving the callback.
fn callback_router(state: Arc<CallbackState>) -> Router {
    Router::new().fallback(handle_callback).with_state(state)
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    if uri.path() != expected_path(&state.redirect_uri) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Some(sender) = state.sender.lock().take() else {
        return StatusCode::GONE.into_response();
    };

    let mut captured = state.redirect_uri.clone();
    captured.set_path(uri.path());
    captured.set_query(uri.query());

    let page = response_page(&captured);
    if sender.send(captured).is_err() {
        tracing::debug!("Redirect arrived after the waiter went away");
    }
    state.shutdown.cancel();

    page.into_response()
}

fn expected_path(redirect_uri: &Url) -> &str {
    match redirect_uri.path() {
        "" => "/",
        path => path,
    }
}

fn response_page(captured: &Url) -> Html<String> {
    let mut error = None;
    let mut description = None;
    let mut error_uri = None;
    for (key, value) in captured.query_pairs() {
        match key.as_ref() {
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            "error_uri" => error_uri = Some(value.into_owned()),
            _ => {}
        }
    }

    let Some(error) = error else {
        return Html(SUCCESS_HTML.to_string());
    };

    let or = |value: Option<String>, fallback: &str| {
        value
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authentication failed</title></head>
<body style="font-family: sans-serif;">
<h1>Authentication failed</h1>
<dl>
<dt>Error:</dt><dd>{}</dd>
<dt>Description:</dt><dd>{}</dd>
<dt>URL:</dt><dd>{}</dd>
</dl>
</body>
</html>"#,
        escape_html(&or(Some(error), "unknown")),
        escape_html(&or(description, "Unknown error.")),
        escape_html(&or(error_uri, "none")),
    ))
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
