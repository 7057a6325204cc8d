//! Credential primitives for marquee
//!
//! This crate owns the two secrets the API ever touches: opaque bearer tokens
//! and account passwords. Token plaintexts leave the process exactly once, in
//! the response or mail that delivers them, and only their SHA-256 digests are
//! ever stored. Passwords are hashed with Argon2id and compared in constant
//! time by the verifier.

pub mod password;
pub mod token;

pub use token::{Token, PLAINTEXT_LEN};
