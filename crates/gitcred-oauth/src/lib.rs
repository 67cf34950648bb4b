//! OAuth 2.0 client for gitcred.
//!
//! Implements the three grants a host provider needs to mint credentials
//! against an authorization server.
//!
//! # Components
//!
//! - [`pkce`]: code verifiers, S256 challenges, and `state` nonces
//! - [`client`]: authorization code + PKCE, device code polling, refresh
//! - [`listener`]: single-shot loopback server capturing the browser redirect
//! - [`browser`]: collaborator that opens the authorization URL
//! - [`types`]: token, device code, and error envelopes

pub mod browser;
pub mod client;
pub mod error;
pub mod listener;
pub mod pkce;
pub mod types;

pub use browser::{SystemBrowser, WebBrowser};
pub use client::{AuthorizationState, OAuth2Client, OAuth2ClientConfig};
pub use error::{ErrorKind, OAuthError, Result};
pub use listener::LoopbackListener;
pub use pkce::PkceParameters;
pub use types::{
    AuthorizationCodeResult, DeviceCodeResult, OAuth2ErrorCode, OAuth2ErrorResponse,
    OAuth2ServerEndpoints, TokenResult,
};
