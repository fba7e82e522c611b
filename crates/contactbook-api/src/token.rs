//! Opaque bearer secrets for sessions and password resets.
//!
//! Tokens are handed to the client once; the store only ever sees their
//! SHA-256 digest.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

/// 256 bits of entropy.
const TOKEN_BYTES: usize = 32;

/// URL-safe base64 (no padding) of fresh OS randomness.
pub fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Hex SHA-256 of the token, the form in which tokens are stored and looked up.
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
