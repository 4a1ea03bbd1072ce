//! PKCE (Proof Key for Code Exchange)
//!
//! RFC 7636 verifier/challenge pairs plus the random values used for the
//! `state` and `nonce` authorize parameters.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

const CODE_VERIFIER_LEN: usize = 64;

/// PKCE parameters for one authorization request
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceParams {
    /// Generate a fresh verifier and its S256 challenge
    pub fn generate() -> Self {
        Self::from_verifier(random_string(CODE_VERIFIER_LEN))
    }

    /// Derive the challenge for a known verifier: BASE64URL(SHA256(verifier))
    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = s256_challenge(&code_verifier);
        PkceParams {
            code_verifier,
            code_challenge,
        }
    }
}

fn s256_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Random alphanumeric string for state, nonce and verifier values
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
