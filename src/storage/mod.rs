//! Storage backend abstraction for the photo pipeline
//!
//! One trait, three interchangeable implementations: the primary object
//! store, the inline document store and the remote JSON bucket. The upload
//! orchestrator only ever sees an ordered list of `Arc<dyn StorageBackend>`
//! and falls through it on failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{StorageError, ValidationError};
use crate::models::{PhotoFilter, StorageStats, StoredPhotoRecord, UploadItem};

pub mod factory;
pub mod inline_doc;
#[cfg(feature = "s3")]
pub mod object_store;
pub mod remote_bucket;

/// Original-size ceiling for the two inline-encoding backends. Keeps the
/// encoded rows/baskets inside the backing services' document size limits.
pub const FALLBACK_SIZE_LIMIT: u64 = 5 * 1024 * 1024;

/// Extensions the inline-encoding backends accept.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Identifies which adapter persisted a photo. Carried on every
/// `StoredPhotoRecord` because the backends have different lifecycle and
/// retrieval semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    ObjectStore,
    InlineDocument,
    RemoteBucket,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::ObjectStore => "object_store",
            StorageKind::InlineDocument => "inline_document",
            StorageKind::RemoteBucket => "remote_bucket",
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file progress sink, invoked with a percentage in `[0, 100]`.
/// Backends without a true transfer signal report staged checkpoints.
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// A callback that discards progress, for callers that don't track it.
pub fn noop_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Capability set shared by all three storage adapters.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend tag stamped onto every record this adapter produces.
    fn kind(&self) -> StorageKind;

    /// Original-size ceiling this backend enforces. `None` means the limit
    /// is defined by the backing service and not checked client-side.
    fn max_upload_size(&self) -> Option<u64> {
        None
    }

    /// Persist one photo and return its record. Failures are classified by
    /// `StorageError`: validation and codec errors are non-retryable,
    /// backend errors trigger fallback in the orchestrator.
    async fn upload(
        &self,
        item: &UploadItem,
        progress: ProgressCallback,
    ) -> Result<StoredPhotoRecord, StorageError>;

    async fn fetch_by_id(&self, id: &str) -> Result<Option<StoredPhotoRecord>, StorageError>;

    /// Remove a photo. Returns `false` when nothing was stored under `id`;
    /// deleting an already-deleted photo is not an error.
    async fn delete_by_id(&self, id: &str) -> Result<bool, StorageError>;

    async fn list_all(
        &self,
        filter: Option<&PhotoFilter>,
    ) -> Result<Vec<StoredPhotoRecord>, StorageError>;

    async fn stats(&self) -> Result<StorageStats, StorageError>;

    /// One-time setup: ensure schema, validate bucket access, etc.
    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Cheap reachability probe for the health endpoint.
    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Size/extension gate shared by the inline-encoding backends. Runs before
/// any compression work so oversized files are rejected cheaply.
pub(crate) fn validate_for_inline_storage(
    item: &UploadItem,
    limit: u64,
) -> Result<(), ValidationError> {
    if !item.is_image() {
        return Err(ValidationError::NotAnImage {
            filename: item.filename.clone(),
        });
    }
    if item.size() > limit {
        return Err(ValidationError::FileTooLarge {
            filename: item.filename.clone(),
            size: item.size(),
            limit,
        });
    }
    match item.extension() {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ValidationError::UnsupportedExtension {
            filename: item.filename.clone(),
        }),
    }
}
