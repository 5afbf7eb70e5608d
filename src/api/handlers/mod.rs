//! HTTP request handlers, grouped by resource.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::{AppState, errors::Result};

pub mod agencies;
pub mod auth;
pub mod lessons;
pub mod payments;
pub mod tutors;

/// Liveness and database connectivity probe.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    summary = "Health check",
    responses((status = 200, description = "Service is healthy"))
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| crate::errors::Error::Database(e.into()))?;
    Ok(Json(json!({"status": "ok"})))
}
