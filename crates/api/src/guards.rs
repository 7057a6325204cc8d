//! The request guard chain.
//!
//! Four stages wrap every handler, outermost first: panic containment,
//! per-client rate limiting, bearer-token resolution, and (on gated
//! routes) capability enforcement. Each stage either passes the request
//! along or short-circuits with a terminal [`ApiError`] response.
//!
//! Token resolution runs on every route and attaches a [`Principal`] to
//! the request extensions; the capability stages read it back, so they
//! must always sit inside the resolution stage.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use marquee_core::{constants, TokenScope, User};
use tracing::{debug, warn};

use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;

/// The identity a request acts as, resolved once per request.
#[derive(Clone, Debug)]
pub enum Principal {
    /// No Authorization header was presented.
    Anonymous,
    /// A live authentication token resolved to this user.
    User(User),
}

impl Principal {
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User(user) => Some(user),
        }
    }
}

/// Outermost stage: converts a panicking handler into a 500 response
/// instead of a dropped connection. The connection is marked close
/// because its state is no longer trustworthy for keep-alive reuse.
pub async fn recover_panic(req: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = format!("panic: {}", panic_message(&panic));
            let mut response = ApiError::Internal(detail).into_response();
            response
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
            response
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Second stage: one token-bucket admission per request, keyed on the
/// client IP.
pub async fn limit_clients(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if !state.limiter.admit(addr.ip()) {
        warn!(client = %addr.ip(), "rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }

    next.run(req).await
}

/// Third stage: resolves the Authorization header into a [`Principal`]
/// and stashes it in the request extensions. Runs on every route; a
/// missing header is a valid anonymous principal, not an error.
pub async fn resolve_principal(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut response = match authenticate(&state, req.headers()).await {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    };

    // Whatever the outcome, caches must key on the Authorization header.
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<Principal> {
    let Some(header_value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Principal::Anonymous);
    };

    let plaintext = header_value
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::InvalidAuthenticationToken)?;

    // Reject malformed plaintexts before touching the database.
    if !marquee_auth::token::plaintext_shape_ok(plaintext) {
        return Err(ApiError::InvalidAuthenticationToken);
    }

    match state
        .stores
        .users
        .get_for_token(TokenScope::Authentication, plaintext)
        .await
    {
        Ok(user) => Ok(Principal::User(user)),
        Err(err) if err.is_not_found() => {
            debug!("authentication token not recognized");
            Err(ApiError::InvalidAuthenticationToken)
        }
        Err(err) => Err(err.into()),
    }
}

/// Innermost stage: requires an activated principal holding the given
/// capability code. Activation is checked before permissions so the
/// caller learns which step to fix.
async fn require_capability(
    code: &'static str,
    state: AppState,
    mut req: Request,
    next: Next,
) -> Response {
    match check_capability(code, &state, &mut req).await {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

// Takes `&mut Request` (not `&Request`) so the future stays `Send`:
// axum's `Body` is `!Sync`, which makes `&Request` a `!Send` capture.
async fn check_capability(
    code: &'static str,
    state: &AppState,
    req: &mut Request,
) -> ApiResult<()> {
    let principal = req.extensions().get::<Principal>().ok_or_else(|| {
        ApiError::Internal("principal missing from request extensions".to_string())
    })?;

    let user = principal.user().ok_or(ApiError::AuthenticationRequired)?;
    if !user.activated {
        return Err(ApiError::ActivationRequired);
    }

    let capabilities = state.stores.permissions.get_all_for_user(user.id).await?;
    if !capabilities.includes(code) {
        debug!(user_id = user.id, capability = code, "permission denied");
        return Err(ApiError::PermissionRequired);
    }

    Ok(())
}

pub async fn require_movies_read(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    require_capability(constants::MOVIES_READ, state, req, next).await
}

pub async fn require_movies_write(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    require_capability(constants::MOVIES_WRITE, state, req, next).await
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample_user(activated: bool) -> User {
        User {
            id: 7,
            created_at: Utc::now(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            activated,
            version: 1,
        }
    }

    #[test]
    fn anonymous_principal_has_no_user() {
        let principal = Principal::Anonymous;

        assert!(principal.is_anonymous());
        assert!(principal.user().is_none());
    }

    #[test]
    fn user_principal_exposes_the_user() {
        let principal = Principal::User(sample_user(true));

        assert!(!principal.is_anonymous());
        assert_eq!(principal.user().unwrap().id, 7);
    }

    #[test]
    fn panic_payload_strings_are_extracted() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*boxed), "static message");

        let boxed: Box<dyn std::any::Any + Send> = Box::new("owned message".to_string());
        assert_eq!(panic_message(&*boxed), "owned message");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(&*boxed), "unknown panic payload");
    }
}
