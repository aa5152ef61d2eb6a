/*!
 * Test helpers: in-memory storage backends with call counters and failure
 * injection, plus image fixture builders. Tests configure the returned
 * objects as needed.
 */

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use image::{ImageBuffer, Rgb};

use crate::errors::StorageError;
use crate::models::{
    PhotoCategory, PhotoFilter, StorageStats, StoredPhotoRecord, UploadItem,
};
use crate::storage::{ProgressCallback, StorageBackend, StorageKind};

/// In-memory `StorageBackend` double. Counts calls so tests can assert
/// which backends were (not) contacted.
pub struct MockBackend {
    kind: StorageKind,
    size_limit: Option<u64>,
    fail_uploads: bool,
    checkpoints: Vec<f32>,
    pub upload_calls: AtomicUsize,
    stored: Mutex<Vec<StoredPhotoRecord>>,
    next_id: AtomicUsize,
}

impl MockBackend {
    pub fn new(kind: StorageKind) -> Self {
        MockBackend {
            kind,
            size_limit: match kind {
                StorageKind::ObjectStore => None,
                _ => Some(crate::storage::FALLBACK_SIZE_LIMIT),
            },
            fail_uploads: false,
            checkpoints: vec![10.0, 50.0, 100.0],
            upload_calls: AtomicUsize::new(0),
            stored: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Every upload attempt fails with a transient backend error.
    pub fn failing(kind: StorageKind) -> Self {
        let mut backend = Self::new(kind);
        backend.fail_uploads = true;
        backend
    }

    pub fn with_size_limit(mut self, limit: Option<u64>) -> Self {
        self.size_limit = limit;
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: Vec<f32>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    pub fn upload_call_count(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn stored_records(&self) -> Vec<StoredPhotoRecord> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    fn max_upload_size(&self) -> Option<u64> {
        self.size_limit
    }

    async fn upload(
        &self,
        item: &UploadItem,
        progress: ProgressCallback,
    ) -> Result<StoredPhotoRecord, StorageError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_uploads {
            return Err(StorageError::backend(self.kind, "simulated outage"));
        }

        for checkpoint in &self.checkpoints {
            progress(*checkpoint);
        }

        let id = format!(
            "{}_{}",
            self.kind.as_str(),
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        let record = StoredPhotoRecord {
            id,
            url: format!("mock://{}/{}", self.kind, item.filename),
            filename: item.filename.clone(),
            category: item.category,
            uploaded_at: Utc::now(),
            size: item.size(),
            backend: self.kind,
        };
        self.stored.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<StoredPhotoRecord>, StorageError> {
        Ok(self
            .stored
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StorageError> {
        let mut stored = self.stored.lock().unwrap();
        let before = stored.len();
        stored.retain(|r| r.id != id);
        Ok(stored.len() != before)
    }

    async fn list_all(
        &self,
        filter: Option<&PhotoFilter>,
    ) -> Result<Vec<StoredPhotoRecord>, StorageError> {
        Ok(self
            .stored
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches_record(r)))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = StorageStats::default();
        for record in self.stored.lock().unwrap().iter() {
            stats.record(record.category, record.size);
        }
        Ok(stats)
    }
}

/// Encode a solid-color PNG of the given dimensions in memory.
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(width, height, Rgb(rgb));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(buffer)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("png encoding of a solid color image cannot fail");
    bytes
}

pub fn upload_item(filename: &str, content_type: &str, data: Vec<u8>) -> UploadItem {
    UploadItem {
        data: Bytes::from(data),
        content_type: content_type.to_string(),
        filename: filename.to_string(),
        category: PhotoCategory::General,
        chair_id: None,
        job_id: None,
    }
}

/// A small valid PNG upload.
pub fn png_item(filename: &str) -> UploadItem {
    upload_item(filename, "image/png", png_bytes(10, 10, [255, 0, 0]))
}
