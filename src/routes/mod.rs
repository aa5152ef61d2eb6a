//! Thin HTTP surface consumed by the (out-of-scope) UI layer

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::AppState;

pub mod health;
pub mod photos;

#[derive(OpenApi)]
#[openapi(
    paths(
        photos::upload_photos,
        photos::list_photos,
        photos::get_photo,
        photos::delete_photo,
        photos::photo_stats,
        health::health_check,
    ),
    components(schemas(
        crate::models::StoredPhotoRecord,
        crate::models::StorageStats,
        crate::models::PhotoCategory,
        crate::storage::StorageKind,
        photos::UploadBatchResponse,
        photos::UploadResultResponse,
        health::HealthResponse,
        health::BackendHealth,
    )),
    tags(
        (name = "photos", description = "Photo upload, listing and deletion"),
        (name = "health", description = "Service and backend health")
    )
)]
pub struct ApiDoc;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api/photos", photos::router())
        .nest("/api/health", health::router())
        .route("/api/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
