//! CLI command handlers.

pub mod erase;
pub mod get;
pub mod providers;
pub mod store;

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use gitcred_config::{Settings, StoreKind};
use gitcred_core::{
    CredentialStore, GenericHostProvider, HostProviderRegistry, HttpProber, NonInteractivePrompts,
    PlaintextCredentialStore, ProviderContext,
};
use tokio_util::sync::CancellationToken;

use crate::prompts::TerminalPrompts;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Arc<Settings>,
    /// Cancelled on Ctrl-C.
    pub cancel: CancellationToken,
}

impl Context {
    /// Providers in resolution order.
    pub fn registry(&self) -> Result<HostProviderRegistry> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gitcred/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let mut registry =
            HostProviderRegistry::from_settings(&self.settings, Arc::new(HttpProber::new(http)))?;
        registry.register(Arc::new(GenericHostProvider))?;
        Ok(registry)
    }

    /// Store, prompts and cancellation for a credential operation.
    pub fn provider_context(&self) -> Result<ProviderContext> {
        let mut ctx = ProviderContext::new(self.settings.clone(), self.open_store()?)
            .with_cancellation(self.cancel.clone());
        if self.settings.interactive()? {
            ctx = ctx.with_prompts(Arc::new(TerminalPrompts));
        } else {
            tracing::debug!("Interaction disabled");
            ctx = ctx.with_prompts(Arc::new(NonInteractivePrompts));
        }
        Ok(ctx)
    }

    fn open_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let kind = match self.settings.credential_store()? {
            Some(configured) => {
                tracing::debug!(store = ?configured.value, source = %configured.source, "Credential store selected");
                configured.value
            }
            None if cfg!(feature = "keyring") => StoreKind::Keyring,
            None => StoreKind::Plaintext,
        };

        match kind {
            StoreKind::Plaintext => {
                let Some(path) = self.settings.plaintext_store_path() else {
                    bail!("Could not determine the plaintext store location; set GITCRED_PLAINTEXT_STORE_PATH");
                };
                tracing::debug!(path = %path.value.display(), "Using plaintext credential store");
                Ok(Arc::new(PlaintextCredentialStore::new(path.value)))
            }
            StoreKind::Keyring => keyring_store(),
        }
    }
}

#[cfg(feature = "keyring")]
fn keyring_store() -> Result<Arc<dyn CredentialStore>> {
    Ok(Arc::new(gitcred_core::KeyringCredentialStore::new()))
}

#[cfg(not(feature = "keyring"))]
fn keyring_store() -> Result<Arc<dyn CredentialStore>> {
    bail!("The keyring credential store is not available in this build (enable the 'keyring' feature)")
}
