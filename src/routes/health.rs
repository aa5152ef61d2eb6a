//! Service health, including per-backend reachability

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::StorageKind;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(health_check))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BackendHealth {
    pub backend: StorageKind,
    pub healthy: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` when every configured backend is reachable, else `degraded`.
    pub status: String,
    pub backends: Vec<BackendHealth>,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health with per-backend reachability", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let backends: Vec<BackendHealth> = state
        .uploader
        .backend_health()
        .await
        .into_iter()
        .map(|(backend, healthy)| BackendHealth { backend, healthy })
        .collect();

    let status = if backends.iter().all(|b| b.healthy) {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        backends,
    })
}
