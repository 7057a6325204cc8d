//! Collecting input validation
//!
//! Handlers validate request bodies with a [`Validator`] that accumulates
//! every failed field instead of stopping at the first, so a single response
//! can report the full set of problems.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Pattern for syntactically plausible email addresses, taken from the
/// W3C HTML5 email input recommendation.
pub static EMAIL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern must compile")
});

/// Accumulates field-level validation failures keyed by field name.
#[derive(Debug, Default)]
pub struct Validator {
    errors: HashMap<String, String>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no check has failed so far.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record a failure for `field` unless one is already recorded. The first
    /// message for a field wins.
    pub fn add_error(&mut self, field: &str, message: &str) {
        if !self.errors.contains_key(field) {
            self.errors.insert(field.to_string(), message.to_string());
        }
    }

    /// Record a failure for `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    /// Consume the validator and return the collected failures.
    #[must_use]
    pub fn into_errors(self) -> HashMap<String, String> {
        self.errors
    }
}

/// Check that `email` is present and plausibly shaped.
pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(
        EMAIL_RX.is_match(email),
        "email",
        "must be a valid email address",
    );
}

/// True when every value in the slice appears exactly once.
#[must_use]
pub fn unique<T: PartialEq>(values: &[T]) -> bool {
    values
        .iter()
        .enumerate()
        .all(|(i, value)| !values[..i].contains(value))
}
