//! User registration and account activation.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use marquee_auth::{password, token};
use marquee_core::{constants, validate_user, TokenScope, User, Validator};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::{ApiError, ApiResult};
use crate::mail::MailJob;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RegisterUser {
    name: String,
    email: String,
    password: String,
}

/// POST /v1/users
///
/// Registers a user, grants the read capability, and queues a welcome
/// mail carrying the activation token. Replies 202 because activation
/// is still outstanding.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUser>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(payload) = payload?;

    let mut user = User {
        id: 0,
        created_at: Utc::now(),
        name: payload.name,
        email: payload.email,
        password_hash: String::new(),
        activated: false,
        version: 0,
    };

    let mut v = Validator::new();
    validate_user(&mut v, &user);
    password::validate_plaintext(&mut v, &payload.password);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    user.password_hash = password::hash(&payload.password)?;

    state.stores.users.insert(&mut user).await?;
    state
        .stores
        .permissions
        .grant(user.id, &[constants::MOVIES_READ])
        .await?;

    let activation = state
        .stores
        .tokens
        .create(user.id, TokenScope::Activation.ttl(), TokenScope::Activation)
        .await?;

    state.mailer.deliver(MailJob::welcome(&user, &activation));
    info!(user_id = user.id, "user registered");

    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ActivateUser {
    token: String,
}

/// PUT /v1/users/activated
///
/// Flips the account to activated via the versioned update, then
/// revokes every outstanding activation token.
pub async fn activate(
    State(state): State<AppState>,
    payload: Result<Json<ActivateUser>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(payload) = payload?;

    let mut v = Validator::new();
    token::validate_plaintext(&mut v, &payload.token);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let mut user = match state
        .stores
        .users
        .get_for_token(TokenScope::Activation, &payload.token)
        .await
    {
        Ok(user) => user,
        Err(err) if err.is_not_found() => {
            v.add_error("token", "invalid or expired activation token");
            return Err(ApiError::Validation(v.into_errors()));
        }
        Err(err) => return Err(err.into()),
    };

    user.activated = true;
    state.stores.users.update(&mut user).await?;
    state
        .stores
        .tokens
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await?;
    info!(user_id = user.id, "user activated");

    Ok(Json(json!({ "user": user })))
}
