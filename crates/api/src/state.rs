//! Shared application state handed to handlers and guards.

use std::sync::Arc;

use marquee_limiter::RateLimiter;
use marquee_store::Stores;

use crate::mail::MailSender;

/// Everything a request might need, cloned cheaply per use.
#[derive(Clone)]
pub struct AppState {
    /// Environment name reported by the healthcheck.
    pub env: String,
    pub stores: Stores,
    pub limiter: Arc<RateLimiter>,
    pub mailer: MailSender,
}
