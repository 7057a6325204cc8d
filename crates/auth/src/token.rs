//! Opaque bearer token issuance
//!
//! A token is 16 bytes from the operating system's entropy source, rendered
//! as unpadded base32 for transport. The persisted form is the SHA-256 digest
//! of that rendering, so a leaked database reveals no usable credentials.

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use marquee_core::{Result, TokenScope, Validator};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length in bytes of the transport form of a token.
pub const PLAINTEXT_LEN: usize = 26;

/// A freshly issued or persisted credential.
///
/// Only the plaintext and expiry serialize; everything else is server-side
/// bookkeeping.
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip_serializing)]
    pub hash: Vec<u8>,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub scope: TokenScope,
}

// The plaintext must not leak through debug output.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Mint a token for `user_id` that expires `ttl` from now.
///
/// Fails only when the entropy source does, which is not retryable.
pub fn issue(user_id: i64, ttl: Duration, scope: TokenScope) -> Result<Token> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(std::io::Error::from)?;

    let plaintext = BASE32_NOPAD.encode(&bytes);
    let hash = hash_plaintext(&plaintext);

    Ok(Token {
        plaintext,
        hash,
        user_id,
        expiry: Utc::now() + ttl,
        scope,
    })
}

/// The digest a plaintext is stored and looked up under.
#[must_use]
pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Cheap shape test applied before any storage lookup.
#[must_use]
pub fn plaintext_shape_ok(plaintext: &str) -> bool {
    plaintext.len() == PLAINTEXT_LEN
}

/// Validator checks for a client-supplied token plaintext.
pub fn validate_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}
