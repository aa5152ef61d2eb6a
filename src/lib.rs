//! chairsnap: photo storage pipeline for the chair service workflow
//!
//! Uploads are attempted against an ordered chain of storage backends —
//! S3-compatible object store, inline base64 documents in Postgres, then a
//! remote JSON bucket — with per-file progress and automatic fallback.

use std::sync::Arc;

pub mod codec;
pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;
pub mod test_helpers;

use config::Config;
use services::PhotoUploader;

/// Shared application state handed to every route handler.
pub struct AppState {
    pub config: Config,
    pub uploader: Arc<PhotoUploader>,
}
