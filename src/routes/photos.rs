//! Photo pipeline routes: batch upload, listing, fetch, delete, stats

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::models::{PhotoCategory, PhotoFilter, StorageStats, StoredPhotoRecord, UploadItem};
use crate::services::uploader::{BatchProgressFn, UploadOutcome};
use crate::storage::StorageKind;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(upload_photos).get(list_photos))
        .route("/stats", get(photo_stats))
        // Wildcard because object store ids are slash-separated keys
        .route("/{*id}", get(get_photo).delete(delete_photo))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResultResponse {
    pub filename: String,
    /// `stored`, `rejected` or `failed`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<StoredPhotoRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the photo landed on a non-primary backend.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadBatchResponse {
    pub results: Vec<UploadResultResponse>,
}

#[derive(Debug, Deserialize)]
pub struct BackendQuery {
    pub backend: StorageKind,
}

#[utoipa::path(
    post,
    path = "/api/photos",
    tag = "photos",
    request_body(content_type = "multipart/form-data", description = "Fields: category, chair_id, job_id, repeated `file` parts"),
    responses(
        (status = 200, description = "Per-file upload results", body = UploadBatchResponse),
        (status = 400, description = "Batch rejected or malformed request"),
    )
)]
pub async fn upload_photos(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadBatchResponse>, (StatusCode, Json<Value>)> {
    let mut category = PhotoCategory::General;
    let mut chair_id: Option<String> = None;
    let mut job_id: Option<String> = None;
    let mut files: Vec<(String, String, Bytes)> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("malformed multipart body: {}", e) })),
        )
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("category") => {
                let value = field.text().await.unwrap_or_default();
                category = value.parse().map_err(|e| {
                    (StatusCode::BAD_REQUEST, Json(json!({ "error": e })))
                })?;
            }
            Some("chair_id") => {
                chair_id = Some(field.text().await.unwrap_or_default()).filter(|s| !s.is_empty());
            }
            Some("job_id") => {
                job_id = Some(field.text().await.unwrap_or_default()).filter(|s| !s.is_empty());
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload.jpg")
                    .to_string();
                let content_type = field
                    .content_type()
                    .map(|ct| ct.to_string())
                    .or_else(|| {
                        mime_guess::from_path(&filename)
                            .first_raw()
                            .map(|m| m.to_string())
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": format!("failed to read {}: {}", filename, e) })),
                    )
                })?;
                files.push((filename, content_type, data));
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "no files provided" })),
        ));
    }

    let items: Vec<UploadItem> = files
        .into_iter()
        .map(|(filename, content_type, data)| UploadItem {
            data,
            content_type,
            filename,
            category,
            chair_id: chair_id.clone(),
            job_id: job_id.clone(),
        })
        .collect();

    // The UI's in-memory photo set is out of scope server-side, so the
    // batch ceiling is checked against the merged stored count.
    let existing_count = state.uploader.get_stats().await.total_images as usize;

    let progress: BatchProgressFn = Arc::new(|index, pct| {
        debug!("upload progress: file {} at {:.0}%", index, pct);
    });

    let results = state
        .uploader
        .upload_batch(items, existing_count, Some(progress))
        .await
        .map_err(|e| {
            warn!("batch rejected: {}", e);
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
        })?;

    let results = results
        .into_iter()
        .map(|result| match result.outcome {
            UploadOutcome::Stored(record) => UploadResultResponse {
                filename: result.filename,
                status: "stored".to_string(),
                degraded: record.is_degraded(),
                photo: Some(record),
                error: None,
            },
            UploadOutcome::Rejected(e) => UploadResultResponse {
                filename: result.filename,
                status: "rejected".to_string(),
                photo: None,
                error: Some(e.to_string()),
                degraded: false,
            },
            UploadOutcome::Failed { message } => UploadResultResponse {
                filename: result.filename,
                status: "failed".to_string(),
                photo: None,
                error: Some(message),
                degraded: false,
            },
        })
        .collect();

    Ok(Json(UploadBatchResponse { results }))
}

#[utoipa::path(
    get,
    path = "/api/photos",
    tag = "photos",
    params(PhotoFilter),
    responses(
        (status = 200, description = "Stored photos across all backends, newest first", body = Vec<StoredPhotoRecord>),
    )
)]
pub async fn list_photos(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PhotoFilter>,
) -> Result<Json<Vec<StoredPhotoRecord>>, StatusCode> {
    let filter = if filter.is_empty() { None } else { Some(filter) };
    match state.uploader.list_photos(filter.as_ref()).await {
        Ok(records) => Ok(Json(records)),
        Err(e) => {
            error!("failed to list photos: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/photos/{id}",
    tag = "photos",
    params(
        ("id" = String, Path, description = "Photo identifier"),
        ("backend" = String, Query, description = "Backend tag the record carries"),
    ),
    responses(
        (status = 200, description = "The stored photo", body = StoredPhotoRecord),
        (status = 404, description = "No photo stored under this id"),
    )
)]
pub async fn get_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<BackendQuery>,
) -> Result<Json<StoredPhotoRecord>, StatusCode> {
    match state.uploader.fetch_photo(query.backend, &id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("failed to fetch photo {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/photos/{id}",
    tag = "photos",
    params(
        ("id" = String, Path, description = "Photo identifier"),
        ("backend" = String, Query, description = "Backend tag the record carries"),
    ),
    responses(
        (status = 200, description = "Deletion result; `deleted` is false when the photo was already gone"),
    )
)]
pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<BackendQuery>,
) -> Result<Json<Value>, StatusCode> {
    match state.uploader.delete_by_id(query.backend, &id).await {
        Ok(deleted) => {
            info!("delete {} via {}: deleted={}", id, query.backend, deleted);
            Ok(Json(json!({ "deleted": deleted })))
        }
        Err(e) => {
            error!("failed to delete photo {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/photos/stats",
    tag = "photos",
    responses(
        (status = 200, description = "Aggregate counts and sizes by category", body = StorageStats),
    )
)]
pub async fn photo_stats(State(state): State<Arc<AppState>>) -> Json<StorageStats> {
    Json(state.uploader.get_stats().await)
}
