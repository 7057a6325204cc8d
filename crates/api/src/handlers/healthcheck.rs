use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /v1/healthcheck
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.env,
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
}
