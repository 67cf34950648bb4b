//! Host provider capability and the context providers run in.

use std::sync::Arc;

use async_trait::async_trait;
use gitcred_config::Settings;
use gitcred_oauth::{SystemBrowser, WebBrowser};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::input::{Credential, RequestInput};
use crate::key::CredentialKey;
use crate::probe::ProbeResponse;
use crate::prompts::{NonInteractivePrompts, Prompts};
use crate::store::CredentialStore;

/// Collaborators handed to a provider for one request.
///
/// Built once per invocation; nothing here is shared between invocations.
#[derive(Clone)]
pub struct ProviderContext {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn CredentialStore>,
    pub prompts: Arc<dyn Prompts>,
    pub browser: Arc<dyn WebBrowser>,
    /// Cancels any wait on the user.
    pub cancel: CancellationToken,
}

impl ProviderContext {
    /// Context with no interaction and the system browser.
    pub fn new(settings: Arc<Settings>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            settings,
            store,
            prompts: Arc::new(NonInteractivePrompts),
            browser: Arc::new(SystemBrowser),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_prompts(mut self, prompts: Arc<dyn Prompts>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_browser(mut self, browser: Arc<dyn WebBrowser>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn namespace(&self) -> String {
        self.settings.namespace().value
    }
}

impl std::fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("settings", &self.settings)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HostProvider Trait
// ============================================================================

/// A remote-hosting service the helper can obtain credentials for.
///
/// Identity and predicates decide whether the provider handles a request;
/// the credential operations have store-backed defaults so an
/// implementation usually only supplies [`generate_credential`].
///
/// [`generate_credential`]: HostProvider::generate_credential
#[async_trait]
pub trait HostProvider: Send + Sync {
    /// Stable identifier, unique within a registry.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Static predicate over the request.
    fn matches(&self, input: &RequestInput) -> bool;

    /// Whether [`matches_probe`](Self::matches_probe) should be consulted.
    fn has_probe_predicate(&self) -> bool {
        false
    }

    /// Dynamic predicate over the detection probe response.
    fn matches_probe(&self, _probe: &ProbeResponse) -> bool {
        false
    }

    fn credential_key(&self, ctx: &ProviderContext, input: &RequestInput) -> CredentialKey {
        CredentialKey::for_input(&ctx.namespace(), input)
    }

    /// Mint a new credential (prompting, OAuth, ...).
    async fn generate_credential(
        &self,
        ctx: &ProviderContext,
        input: &RequestInput,
    ) -> Result<Credential>;

    /// Return a stored credential, or generate one on a miss.
    async fn get_credential(&self, ctx: &ProviderContext, input: &RequestInput) -> Result<Credential> {
        let key = self.credential_key(ctx, input);
        if let Some(stored) = ctx.store.get(&key.service(), key.account()).await? {
            tracing::debug!(key = %key, "Found stored credential");
            return Ok(Credential::new(stored.account, stored.secret));
        }

        tracing::debug!(key = %key, provider = self.id(), "No stored credential; generating");
        self.generate_credential(ctx, input).await
    }

    /// Persist the credential Git reports as working.
    async fn store_credential(&self, ctx: &ProviderContext, input: &RequestInput) -> Result<()> {
        let username = input.username().unwrap_or_default();
        let password = input.password().unwrap_or_default();
        if username.trim().is_empty() && password.trim().is_empty() {
            tracing::debug!("Not storing empty credential");
            return Ok(());
        }

        let key = self.credential_key(ctx, input);
        ctx.store
            .add_or_update(&key.service(), username, password)
            .await?;
        tracing::info!(key = %key, "Credential stored");
        Ok(())
    }

    /// Erase the stored credential, but only if it matches what Git sent.
    async fn erase_credential(&self, ctx: &ProviderContext, input: &RequestInput) -> Result<()> {
        let key = self.credential_key(ctx, input);
        let Some(stored) = ctx.store.get(&key.service(), key.account()).await? else {
            tracing::debug!(key = %key, "No stored credential to erase");
            return Ok(());
        };

        if let Some(username) = input.username()
            && !username.trim().is_empty()
            && username != stored.account
        {
            tracing::debug!("Stored username differs; not erasing");
            return Ok(());
        }
        if let Some(password) = input.password()
            && !password.trim().is_empty()
            && password != stored.secret
        {
            tracing::debug!("Stored password differs; not erasing");
            return Ok(());
        }

        if ctx.store.remove(&key.service(), Some(&stored.account)).await? {
            tracing::info!(key = %key, "Credential erased");
        }
        Ok(())
    }
}
