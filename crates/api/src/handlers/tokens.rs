//! Token issuance endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use marquee_auth::password;
use marquee_core::{validate_email, TokenScope, Validator};
use serde::Deserialize;
use serde_json::json;

use crate::errors::{ApiError, ApiResult};
use crate::mail::MailJob;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Credentials {
    email: String,
    password: String,
}

/// POST /v1/tokens/authentication
///
/// Exchanges a password for a session token. Credential failures stay
/// generic so callers cannot probe which emails are registered.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(payload) = payload?;

    let mut v = Validator::new();
    validate_email(&mut v, &payload.email);
    password::validate_plaintext(&mut v, &payload.password);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let user = state
        .stores
        .users
        .get_by_credentials(&payload.email, &payload.password)
        .await?;

    let token = state
        .stores
        .tokens
        .create(
            user.id,
            TokenScope::Authentication.ttl(),
            TokenScope::Authentication,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ResendActivation {
    email: String,
}

/// POST /v1/tokens/activation
///
/// Issues a replacement activation token for a not-yet-activated
/// account and queues the mail carrying it.
pub async fn create_activation_token(
    State(state): State<AppState>,
    payload: Result<Json<ResendActivation>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(payload) = payload?;

    let mut v = Validator::new();
    validate_email(&mut v, &payload.email);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let user = match state.stores.users.get_by_email(&payload.email).await {
        Ok(user) => user,
        Err(err) if err.is_not_found() => {
            v.add_error("email", "no matching email address found");
            return Err(ApiError::Validation(v.into_errors()));
        }
        Err(err) => return Err(err.into()),
    };

    if user.activated {
        v.add_error("email", "user already activated");
        return Err(ApiError::Validation(v.into_errors()));
    }

    let token = state
        .stores
        .tokens
        .create(user.id, TokenScope::Activation.ttl(), TokenScope::Activation)
        .await?;

    state.mailer.deliver(MailJob::activation(&user, &token));

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "an email will be sent to you containing activation instructions"
        })),
    )
        .into_response())
}
