//! Network probe used when no provider claims a request statically.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::Result;

/// Status and headers of the probe response.
#[derive(Debug, Clone, Default)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: HeaderMap,
}

impl ProbeResponse {
    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Issues the detection probe against a remote.
#[async_trait]
pub trait RemoteProber: Send + Sync {
    async fn probe(&self, remote: &Url, timeout: Duration) -> Result<ProbeResponse>;
}

/// Probes with an HTTP `HEAD` request.
#[derive(Debug, Clone, Default)]
pub struct HttpProber {
    http: reqwest::Client,
}

impl HttpProber {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RemoteProber for HttpProber {
    async fn probe(&self, remote: &Url, timeout: Duration) -> Result<ProbeResponse> {
        tracing::debug!(remote = %remote, timeout_ms = timeout.as_millis() as u64, "Probing remote");
        let response = self.http.head(remote.clone()).timeout(timeout).send().await?;
        Ok(ProbeResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_head_probe() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(401).insert_header("X-Forge", "example"))
            .expect(1)
            .mount(&server)
            .await;

        let remote = Url::parse(&format!("{}/org/repo.git", server.uri())).unwrap();
        let response = HttpProber::default()
            .probe(&remote, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(response.header("x-forge"), Some("example"));
    }

    #[tokio::test]
    async fn test_probe_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let remote = Url::parse(&server.uri()).unwrap();
        let err = HttpProber::default()
            .probe(&remote, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }
}
