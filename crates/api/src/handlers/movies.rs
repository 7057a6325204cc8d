//! CRUD and listing over the movie catalog.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use marquee_core::{validate_filters, validate_movie, Filters, Movie, Runtime, Validator};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;

/// Sort keys the list endpoint accepts; a leading `-` flips direction.
const SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

/// Missing fields fall back to zero values so that validation can
/// report every absent field at once instead of failing on the first
/// decode error.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CreateMovie {
    title: String,
    year: i32,
    runtime: Runtime,
    genres: Vec<String>,
}

/// POST /v1/movies
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateMovie>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(payload) = payload?;

    let mut movie = Movie {
        id: 0,
        created_at: Utc::now(),
        title: payload.title,
        year: payload.year,
        runtime: payload.runtime,
        genres: payload.genres,
        version: 0,
    };

    let mut v = Validator::new();
    validate_movie(&mut v, &movie);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    state.stores.movies.insert(&mut movie).await?;

    let location = format!("/v1/movies/{}", movie.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(json!({ "movie": movie })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    title: Option<String>,
    genres: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
    sort: Option<String>,
}

/// GET /v1/movies
pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params?;

    let title = params.title.unwrap_or_default();
    let genres: Vec<String> = params
        .genres
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter(|genre| !genre.is_empty())
        .map(str::to_string)
        .collect();

    let filters = Filters {
        page: params.page.unwrap_or(1),
        page_size: params.page_size.unwrap_or(20),
        sort: params.sort.unwrap_or_else(|| "id".to_string()),
        sort_safelist: SORT_SAFELIST,
    };

    let mut v = Validator::new();
    validate_filters(&mut v, &filters);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let (movies, metadata) = state
        .stores
        .movies
        .get_all(&title, &genres, &filters)
        .await?;

    Ok(Json(json!({ "movies": movies, "metadata": metadata })))
}

/// GET /v1/movies/:id
pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;

    let movie = state.stores.movies.get(id).await?;

    Ok(Json(json!({ "movie": movie })))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMovie {
    title: Option<String>,
    year: Option<i32>,
    runtime: Option<Runtime>,
    genres: Option<Vec<String>>,
}

/// PATCH /v1/movies/:id
///
/// Applies only the supplied fields, then runs the full validation set
/// against the merged record before the versioned update.
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateMovie>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let Json(payload) = payload?;

    let mut movie = state.stores.movies.get(id).await?;

    if let Some(title) = payload.title {
        movie.title = title;
    }
    if let Some(year) = payload.year {
        movie.year = year;
    }
    if let Some(runtime) = payload.runtime {
        movie.runtime = runtime;
    }
    if let Some(genres) = payload.genres {
        movie.genres = genres;
    }

    let mut v = Validator::new();
    validate_movie(&mut v, &movie);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    state.stores.movies.update(&mut movie).await?;

    Ok(Json(json!({ "movie": movie })))
}

/// DELETE /v1/movies/:id
pub async fn delete(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;

    state.stores.movies.delete(id).await?;

    Ok(Json(json!({ "message": "movie successfully deleted" })))
}
