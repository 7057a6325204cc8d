//! Password hashing and verification
//!
//! Passwords are stored as Argon2id PHC strings with a per-password random
//! salt. Verification distinguishes a mismatch, which is an expected outcome,
//! from a stored hash that cannot be parsed, which means the database holds
//! something this code never wrote.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use marquee_core::{Error, Result, Validator};

/// Hash a plaintext password into a PHC string for storage.
pub fn hash(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hashed| hashed.to_string())
        .map_err(|err| Error::invariant(format!("password hashing failed: {err}")))
}

/// Compare a plaintext against a stored PHC string.
///
/// Returns `Ok(false)` on a mismatch. An unparseable stored hash is an
/// invariant violation, not a failed login.
pub fn verify(plaintext: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| Error::invariant(format!("stored password hash is malformed: {err}")))?;

    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(Error::invariant(format!(
            "password verification failed: {err}"
        ))),
    }
}

/// Validator checks for a client-supplied password plaintext.
pub fn validate_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= 8,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= 72,
        "password",
        "must not be more than 72 bytes long",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let stored = hash("pa55word1234").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify("pa55word1234", &stored).unwrap());
    }

    #[test]
    fn mismatch_is_ok_false_not_an_error() {
        let stored = hash("pa55word1234").unwrap();
        assert!(!verify("wrong-password", &stored).unwrap());
    }

    #[test]
    fn same_password_hashes_differently_each_time() {
        let first = hash("pa55word1234").unwrap();
        let second = hash("pa55word1234").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_stored_hash_is_an_invariant_violation() {
        let result = verify("pa55word1234", "not-a-phc-string");
        assert!(matches!(result, Err(Error::InvariantViolation { .. })));
    }

    #[test]
    fn plaintext_validation_enforces_length_bounds() {
        let mut v = Validator::new();
        validate_plaintext(&mut v, "short");
        assert_eq!(
            v.into_errors().get("password").map(String::as_str),
            Some("must be at least 8 bytes long")
        );

        let mut v = Validator::new();
        validate_plaintext(&mut v, &"x".repeat(73));
        assert_eq!(
            v.into_errors().get("password").map(String::as_str),
            Some("must not be more than 72 bytes long")
        );

        let mut v = Validator::new();
        validate_plaintext(&mut v, "long-enough-password");
        assert!(v.valid());
    }
}
