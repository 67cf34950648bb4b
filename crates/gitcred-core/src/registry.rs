//! Host provider registry and resolution.

use std::sync::Arc;
use std::time::Duration;

use gitcred_config::settings::{AUTO_PROVIDER, DEFAULT_AUTODETECT_TIMEOUT};
use gitcred_config::Settings;

use crate::error::{Error, Result};
use crate::input::RequestInput;
use crate::probe::RemoteProber;
use crate::provider::HostProvider;

/// Ordered set of providers.
///
/// Resolution walks providers in registration order; the first match wins.
pub struct HostProviderRegistry {
    providers: Vec<Arc<dyn HostProvider>>,
    prober: Arc<dyn RemoteProber>,
    probe_timeout: Duration,
    provider_override: Option<String>,
}

impl HostProviderRegistry {
    pub fn new(prober: Arc<dyn RemoteProber>) -> Self {
        Self {
            providers: Vec::new(),
            prober,
            probe_timeout: DEFAULT_AUTODETECT_TIMEOUT,
            provider_override: None,
        }
    }

    /// Registry configured with the probe timeout and provider override from `settings`.
    pub fn from_settings(settings: &Settings, prober: Arc<dyn RemoteProber>) -> Result<Self> {
        let timeout = settings.autodetect_timeout()?;
        let provider_override = settings.provider_override();
        if let Some(id) = &provider_override {
            tracing::debug!(provider = %id.value, source = %id.source, "Provider override configured");
        }
        Ok(Self::new(prober)
            .with_probe_timeout(timeout.value)
            .with_provider_override(provider_override.map(|r| r.value)))
    }

    /// Zero disables the network probe.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_provider_override(mut self, id: Option<String>) -> Self {
        self.provider_override = id.filter(|id| !id.eq_ignore_ascii_case(AUTO_PROVIDER));
        self
    }

    /// Append a provider. Ids are unique (case-insensitive) and `auto` is reserved.
    pub fn register(&mut self, provider: Arc<dyn HostProvider>) -> Result<()> {
        let id = provider.id();
        if id.trim().is_empty() || id.eq_ignore_ascii_case(AUTO_PROVIDER) {
            return Err(Error::InvalidInput(format!(
                "provider id '{}' is reserved",
                id
            )));
        }
        if self.providers.iter().any(|p| p.id().eq_ignore_ascii_case(id)) {
            return Err(Error::InvalidInput(format!(
                "a provider with id '{}' is already registered",
                id
            )));
        }
        tracing::debug!(provider = id, "Registered host provider");
        self.providers.push(provider);
        Ok(())
    }

    pub fn providers(&self) -> &[Arc<dyn HostProvider>] {
        &self.providers
    }

    /// Pick the provider for a request.
    ///
    /// Order: configured override, static predicates, then one network probe
    /// shared by every provider with a probe predicate.
    pub async fn resolve(&self, input: &RequestInput) -> Result<Arc<dyn HostProvider>> {
        if !input.is_resolvable() {
            tracing::debug!("Request is missing its protocol or host");
            return Err(Error::Resolution(describe(input)));
        }

        if let Some(id) = &self.provider_override {
            if let Some(provider) = self.providers.iter().find(|p| p.id().eq_ignore_ascii_case(id)) {
                tracing::debug!(provider = provider.id(), "Using configured provider");
                return Ok(provider.clone());
            }
            tracing::warn!(provider = %id, "Configured provider not found; falling back to auto-detection");
        }

        if let Some(provider) = self.providers.iter().find(|p| p.matches(input)) {
            tracing::debug!(provider = provider.id(), remote = %describe(input), "Provider matched");
            return Ok(provider.clone());
        }

        if let Some(provider) = self.resolve_by_probe(input).await {
            return Ok(provider);
        }

        Err(Error::Resolution(describe(input)))
    }

    async fn resolve_by_probe(&self, input: &RequestInput) -> Option<Arc<dyn HostProvider>> {
        let candidates: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.has_probe_predicate())
            .collect();
        if candidates.is_empty() || !input.is_http() || self.probe_timeout.is_zero() {
            return None;
        }
        let remote = input.remote_url()?;

        match self.prober.probe(&remote, self.probe_timeout).await {
            Ok(response) => {
                let provider = candidates.into_iter().find(|p| p.matches_probe(&response))?;
                tracing::debug!(provider = provider.id(), status = response.status, "Provider matched by probe");
                Some(provider.clone())
            }
            Err(e) => {
                tracing::warn!(remote = %remote, error = %e, "Provider detection probe failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for HostProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostProviderRegistry")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.id()).collect::<Vec<_>>(),
            )
            .field("probe_timeout", &self.probe_timeout)
            .field("provider_override", &self.provider_override)
            .finish()
    }
}

fn describe(input: &RequestInput) -> String {
    format!(
        "{}://{}/{}",
        input.protocol().unwrap_or_default(),
        input.host().unwrap_or_default(),
        input.path().unwrap_or_default().trim_start_matches('/')
    )
}
