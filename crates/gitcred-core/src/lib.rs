//! Credential resolution for gitcred.
//!
//! A [`HostProviderRegistry`] picks the [`HostProvider`] responsible for a
//! Git request; the provider then reads, generates, stores or erases the
//! credential through a [`CredentialStore`] keyed by [`CredentialKey`].
//!
//! ```rust,ignore
//! let mut registry = HostProviderRegistry::from_settings(&settings, Arc::new(HttpProber::default()))?;
//! registry.register(Arc::new(GenericHostProvider))?;
//!
//! let provider = registry.resolve(&input).await?;
//! let credential = provider.get_credential(&ctx, &input).await?;
//! ```

pub mod error;
pub mod generic;
pub mod input;
pub mod key;
pub mod probe;
pub mod prompts;
pub mod provider;
pub mod registry;
pub mod store;

pub use error::{Error, ErrorKind, Result};
pub use generic::{GENERIC_PROVIDER_ID, GenericHostProvider, GenericOAuthConfig};
pub use input::{Credential, RequestInput};
pub use key::{CredentialKey, build_key};
pub use probe::{HttpProber, ProbeResponse, RemoteProber};
pub use prompts::{NonInteractivePrompts, OAuthMode, Prompts};
pub use provider::{HostProvider, ProviderContext};
pub use registry::HostProviderRegistry;
#[cfg(feature = "keyring")]
pub use store::KeyringCredentialStore;
pub use store::{CredentialStore, MemoryCredentialStore, PlaintextCredentialStore, StoredCredential};
