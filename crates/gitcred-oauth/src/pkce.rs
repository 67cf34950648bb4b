//! PKCE verifiers/challenges (RFC 7636) and `state` nonces.
//!
//! All randomness comes from the thread-local CSPRNG, which is seeded from
//! the operating system. If the OS source is unavailable the generator
//! panics; there is no weaker fallback.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// The only challenge method this client sends.
pub const CHALLENGE_METHOD_S256: &str = "S256";

// 96 bytes is divisible by 3, so it encodes to exactly 128 base64url
// characters without padding: the top of the 43..=128 range.
const VERIFIER_BYTES: usize = 96;

const NONCE_BYTES: usize = 32;

/// PKCE code verifier and challenge pair for one authorization attempt.
#[derive(Clone)]
pub struct PkceParameters {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceParameters {
    /// Generate a fresh verifier and its S256 challenge.
    pub fn generate() -> Self {
        let code_verifier = new_code_verifier();
        let code_challenge = challenge_for(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }

    pub fn challenge_method(&self) -> &'static str {
        CHALLENGE_METHOD_S256
    }
}

impl std::fmt::Debug for PkceParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceParameters")
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// Generate a random code verifier of 128 unreserved characters.
pub fn new_code_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute `BASE64URL(SHA256(verifier))` without padding.
pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate an unguessable `state` value (256 bits, base64url).
pub fn new_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
