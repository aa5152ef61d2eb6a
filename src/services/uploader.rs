//! Upload orchestrator
//!
//! Owns the fallback policy: per-file validation, whole-batch admission,
//! the ordered walk over the configured storage backends, progress
//! aggregation and the per-item concurrency rules. Adapter failures are
//! logged and swallowed behind a successful fallback; only chain
//! exhaustion surfaces to the caller.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::errors::{StorageError, ValidationError};
use crate::models::{PhotoFilter, StorageStats, StoredPhotoRecord, UploadItem};
use crate::storage::{noop_progress, ProgressCallback, StorageBackend, StorageKind};

/// Terminal state of one file in a batch. Every file ends in exactly one of
/// these; no failure in one file affects its siblings.
#[derive(Debug)]
pub enum UploadOutcome {
    Stored(StoredPhotoRecord),
    Rejected(ValidationError),
    Failed { message: String },
}

#[derive(Debug)]
pub struct FileUploadResult {
    pub filename: String,
    pub outcome: UploadOutcome,
}

/// Batch-level progress sink: file index within the batch plus a
/// percentage in `[0, 100]` for that file.
pub type BatchProgressFn = Arc<dyn Fn(usize, f32) + Send + Sync>;

pub struct PhotoUploader {
    backends: Vec<Arc<dyn StorageBackend>>,
    max_photos: usize,
}

impl PhotoUploader {
    pub fn new(backends: Vec<Arc<dyn StorageBackend>>, max_photos: usize) -> Self {
        PhotoUploader {
            backends,
            max_photos,
        }
    }

    pub fn max_photos(&self) -> usize {
        self.max_photos
    }

    pub fn backends(&self) -> &[Arc<dyn StorageBackend>] {
        &self.backends
    }

    /// Largest original size any configured backend accepts. The object
    /// store has no client-side cap, so its presence lifts the ceiling.
    fn max_accepted_size(&self) -> u64 {
        self.backends
            .iter()
            .map(|b| b.max_upload_size().unwrap_or(u64::MAX))
            .max()
            .unwrap_or(u64::MAX)
    }

    /// The remote bucket's whole-basket read-modify-write loses updates
    /// under concurrent writers, and fallback routing is dynamic, so any
    /// chain containing it forces sequential batch processing.
    fn requires_serial_processing(&self) -> bool {
        self.backends
            .iter()
            .any(|b| b.kind() == StorageKind::RemoteBucket)
    }

    fn backend_for(&self, kind: StorageKind) -> Option<&Arc<dyn StorageBackend>> {
        self.backends.iter().find(|b| b.kind() == kind)
    }

    /// Pre-admission gate: media type must be an image class, and the file
    /// must fit at least one configured backend. Files failing here are
    /// reported individually and contact no backend.
    fn validate_item(&self, item: &UploadItem) -> Result<(), ValidationError> {
        if !item.is_image() {
            return Err(ValidationError::NotAnImage {
                filename: item.filename.clone(),
            });
        }
        let limit = self.max_accepted_size();
        if item.size() > limit {
            return Err(ValidationError::FileTooLarge {
                filename: item.filename.clone(),
                size: item.size(),
                limit,
            });
        }
        Ok(())
    }

    /// Process a batch of files sharing one set of metadata. Invalid files
    /// are rejected individually; the whole batch is refused up front when
    /// it would push the photo set past `max_photos`. Returns one result
    /// per input file, in input order.
    pub async fn upload_batch(
        &self,
        items: Vec<UploadItem>,
        existing_count: usize,
        progress: Option<BatchProgressFn>,
    ) -> Result<Vec<FileUploadResult>, ValidationError> {
        let mut results: Vec<Option<FileUploadResult>> = Vec::new();
        let mut pending: Vec<(usize, UploadItem)> = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            match self.validate_item(&item) {
                Ok(()) => {
                    results.push(None);
                    pending.push((index, item));
                }
                Err(e) => {
                    warn!("rejecting {}: {}", item.filename, e);
                    results.push(Some(FileUploadResult {
                        filename: item.filename,
                        outcome: UploadOutcome::Rejected(e),
                    }));
                }
            }
        }

        // All-or-nothing admission: no partial batches
        if existing_count + pending.len() > self.max_photos {
            return Err(ValidationError::TooManyPhotos {
                max_photos: self.max_photos,
                existing: existing_count,
                incoming: pending.len(),
            });
        }

        let file_progress = |index: usize| -> ProgressCallback {
            match &progress {
                Some(batch) => {
                    let batch = batch.clone();
                    Arc::new(move |pct| batch(index, pct))
                }
                None => noop_progress(),
            }
        };

        if self.requires_serial_processing() {
            for (index, item) in pending {
                let outcome = self.upload_single(&item, file_progress(index)).await;
                results[index] = Some(FileUploadResult {
                    filename: item.filename,
                    outcome,
                });
            }
        } else {
            let uploads = pending.into_iter().map(|(index, item)| {
                let callback = file_progress(index);
                async move {
                    let outcome = self.upload_single(&item, callback).await;
                    (index, item.filename, outcome)
                }
            });
            for (index, filename, outcome) in join_all(uploads).await {
                results[index] = Some(FileUploadResult { filename, outcome });
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Walk the configured chain in priority order and stop at the first
    /// success. A surviving validation error (backend cap, codec reject)
    /// wins over a transient message in the terminal report.
    async fn upload_single(&self, item: &UploadItem, progress: ProgressCallback) -> UploadOutcome {
        let mut validation_failure: Option<ValidationError> = None;
        let mut last_failure: Option<String> = None;

        for backend in &self.backends {
            let kind = backend.kind();

            if let Some(limit) = backend.max_upload_size() {
                if item.size() > limit {
                    warn!(
                        "{} exceeds the {} byte limit of the {} backend",
                        item.filename, limit, kind
                    );
                    validation_failure = Some(ValidationError::FileTooLarge {
                        filename: item.filename.clone(),
                        size: item.size(),
                        limit,
                    });
                    continue;
                }
            }

            match backend.upload(item, progress.clone()).await {
                Ok(record) => {
                    if record.is_degraded() {
                        warn!(
                            "{} stored via fallback backend {}",
                            item.filename, record.backend
                        );
                    } else {
                        info!("{} stored via {}", item.filename, record.backend);
                    }
                    return UploadOutcome::Stored(record);
                }
                Err(StorageError::Validation(e)) => {
                    warn!("{} rejected by {}: {}", item.filename, kind, e);
                    validation_failure = Some(e);
                }
                Err(e) => {
                    warn!(
                        "{} backend failed for {}, trying next: {}",
                        kind, item.filename, e
                    );
                    last_failure = Some(e.to_string());
                }
            }
        }

        if let Some(e) = validation_failure {
            return UploadOutcome::Rejected(e);
        }

        let message = last_failure.unwrap_or_else(|| "no storage backends configured".to_string());
        error!("all storage backends failed for {}: {}", item.filename, message);
        UploadOutcome::Failed { message }
    }

    /// Deletion dispatches on the record's backend tag.
    pub async fn delete_photo(&self, record: &StoredPhotoRecord) -> Result<bool, StorageError> {
        self.delete_by_id(record.backend, &record.id).await
    }

    pub async fn delete_by_id(&self, kind: StorageKind, id: &str) -> Result<bool, StorageError> {
        let backend = self.backend_for(kind).ok_or_else(|| {
            StorageError::backend(kind, "backend is not configured".to_string())
        })?;
        backend.delete_by_id(id).await
    }

    pub async fn fetch_photo(
        &self,
        kind: StorageKind,
        id: &str,
    ) -> Result<Option<StoredPhotoRecord>, StorageError> {
        let backend = self.backend_for(kind).ok_or_else(|| {
            StorageError::backend(kind, "backend is not configured".to_string())
        })?;
        backend.fetch_by_id(id).await
    }

    /// Merged listing across every configured backend, newest first. A
    /// backend that fails to list is logged and skipped so one outage does
    /// not blank the caller's working set.
    pub async fn list_photos(
        &self,
        filter: Option<&PhotoFilter>,
    ) -> Result<Vec<StoredPhotoRecord>, StorageError> {
        let mut records = Vec::new();
        for backend in &self.backends {
            match backend.list_all(filter).await {
                Ok(mut batch) => records.append(&mut batch),
                Err(e) => warn!("listing {} backend failed, skipping: {}", backend.kind(), e),
            }
        }
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(records)
    }

    /// Merged aggregate counts across every configured backend.
    pub async fn get_stats(&self) -> StorageStats {
        let mut stats = StorageStats::default();
        for backend in &self.backends {
            match backend.stats().await {
                Ok(backend_stats) => stats.merge(backend_stats),
                Err(e) => warn!("stats from {} backend failed, skipping: {}", backend.kind(), e),
            }
        }
        stats
    }

    /// Per-backend reachability, for the health endpoint.
    pub async fn backend_health(&self) -> Vec<(StorageKind, bool)> {
        let mut health = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            let healthy = backend.health_check().await.is_ok();
            health.push((backend.kind(), healthy));
        }
        health
    }
}
