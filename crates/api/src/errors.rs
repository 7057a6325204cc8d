//! Terminal request errors and their JSON responses.
//!
//! Every refusal the service can issue is a variant here. Handlers and
//! guards return `ApiError` and the `IntoResponse` impl renders the
//! `{"error": ...}` envelope, so status codes and client-facing
//! messages live in exactly one place.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A terminal response owed to the client.
///
/// The `#[error]` strings are the exact message bodies sent to clients,
/// except for `Validation` (which sends its field map) and `Internal`
/// (whose detail is logged, never sent).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    ActivationRequired,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    PermissionRequired,

    #[error("the requested resource cannot be found")]
    NotFound,

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("one or more fields failed validation")]
    Validation(HashMap<String, String>),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("the server encountered a problem and couldn't process your request")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status this error responds with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidAuthenticationToken
            | Self::InvalidCredentials
            | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::ActivationRequired | Self::PermissionRequired => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!(error = %detail, "request failed with an internal error");
        }

        let status = self.status();
        let message = match &self {
            Self::Validation(errors) => json!(errors),
            other => json!(other.to_string()),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if matches!(self, Self::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<marquee_core::Error> for ApiError {
    fn from(err: marquee_core::Error) -> Self {
        match err {
            marquee_core::Error::NotFound { .. } => Self::NotFound,
            marquee_core::Error::EditConflict { .. } => Self::EditConflict,
            marquee_core::Error::DuplicateEmail => {
                let mut errors = HashMap::new();
                errors.insert(
                    "email".to_string(),
                    "a user with this email address already exists".to_string(),
                );
                Self::Validation(errors)
            }
            marquee_core::Error::InvalidCredentials => Self::InvalidCredentials,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

// Unparseable path parameters read as a missing resource, so a request
// for /v1/movies/abc gets the same 404 as /v1/movies/999999.
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound
    }
}

/// Fallback handler for paths no route matches.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
