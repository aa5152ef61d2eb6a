//! Remote JSON bucket storage backend
//!
//! Last-resort adapter backed by a Pantry-style JSON storage service. The
//! whole photo collection lives in one named basket; every mutation is a
//! full read-modify-write of that document. There is no locking primitive
//! on the service side, so concurrent writers race last-write-wins on the
//! entire collection — callers must serialize uploads and deletes routed
//! through this backend.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    validate_for_inline_storage, ProgressCallback, StorageBackend, StorageKind,
    FALLBACK_SIZE_LIMIT,
};
use crate::codec::{self, EncodeOptions};
use crate::config::RemoteBucketConfig;
use crate::errors::StorageError;
use crate::models::{
    EncodedImage, PhotoCollection, PhotoFilter, StorageStats, StoredPhotoRecord, UploadItem,
};

pub struct RemoteBucketBackend {
    client: Client,
    config: RemoteBucketConfig,
    options: EncodeOptions,
}

impl RemoteBucketBackend {
    pub fn new(config: RemoteBucketConfig, options: EncodeOptions) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| StorageError::backend(StorageKind::RemoteBucket, e))?;

        Ok(RemoteBucketBackend {
            client,
            config,
            options,
        })
    }

    fn basket_url(&self, basket: &str) -> String {
        format!(
            "{}/{}/basket/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket_id,
            basket
        )
    }

    /// Fetch the current collection. A client-error response means the
    /// basket does not exist yet and reads as an empty collection, not a
    /// fault.
    pub async fn fetch_collection(&self) -> Result<PhotoCollection, StorageError> {
        let response = self
            .client
            .get(self.basket_url(&self.config.basket))
            .send()
            .await
            .map_err(|e| StorageError::backend(StorageKind::RemoteBucket, e))?;

        let status = response.status();
        if status.is_client_error() {
            debug!("basket {} not found (HTTP {}), treating as empty", self.config.basket, status);
            return Ok(PhotoCollection::empty());
        }
        if !status.is_success() {
            return Err(StorageError::backend(
                StorageKind::RemoteBucket,
                format!("basket fetch failed: HTTP {}", status),
            ));
        }

        response
            .json::<PhotoCollection>()
            .await
            .map_err(|e| StorageError::backend(StorageKind::RemoteBucket, e))
    }

    /// Overwrite the whole basket with `collection`. Not transactional.
    async fn save_collection(&self, collection: &PhotoCollection) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.basket_url(&self.config.basket))
            .json(collection)
            .send()
            .await
            .map_err(|e| StorageError::backend(StorageKind::RemoteBucket, e))?;

        if !response.status().is_success() {
            return Err(StorageError::backend(
                StorageKind::RemoteBucket,
                format!("basket save failed: HTTP {}", response.status()),
            ));
        }
        Ok(())
    }

    /// Write a small payload to the auxiliary test basket to confirm the
    /// service is reachable and the bucket id is valid.
    pub async fn test_connection(&self) -> bool {
        let payload = serde_json::json!({
            "test": true,
            "timestamp": Utc::now().to_rfc3339(),
            "message": "chairsnap connectivity test",
        });

        match self
            .client
            .post(self.basket_url(&self.config.test_basket))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("remote bucket connectivity test failed: {}", e);
                false
            }
        }
    }

    fn record_from_entry(entry: &EncodedImage) -> StoredPhotoRecord {
        StoredPhotoRecord {
            id: entry.id.clone(),
            url: entry.base64_data.clone(),
            filename: entry.filename.clone(),
            category: entry.category,
            uploaded_at: entry.uploaded_at,
            size: entry.size,
            backend: StorageKind::RemoteBucket,
        }
    }

    fn entry_matches(entry: &EncodedImage, filter: &PhotoFilter) -> bool {
        filter.category.map_or(true, |c| entry.category == c)
            && filter
                .chair_id
                .as_ref()
                .map_or(true, |id| entry.chair_id.as_deref() == Some(id.as_str()))
            && filter
                .job_id
                .as_ref()
                .map_or(true, |id| entry.job_id.as_deref() == Some(id.as_str()))
    }

    fn next_entry_id() -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("img_{}_{}", Utc::now().timestamp_millis(), &suffix[..10])
    }
}

#[async_trait]
impl StorageBackend for RemoteBucketBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::RemoteBucket
    }

    fn max_upload_size(&self) -> Option<u64> {
        Some(FALLBACK_SIZE_LIMIT)
    }

    async fn upload(
        &self,
        item: &UploadItem,
        progress: ProgressCallback,
    ) -> Result<StoredPhotoRecord, StorageError> {
        progress(10.0);
        validate_for_inline_storage(item, FALLBACK_SIZE_LIMIT)?;
        progress(25.0);

        let data = item.data.clone();
        let options = self.options;
        let base64_data = tokio::task::spawn_blocking(move || {
            codec::encode_to_data_url(&data, &options)
        })
        .await
        .map_err(|e| StorageError::backend(StorageKind::RemoteBucket, e))??;
        progress(50.0);

        let mut collection = self.fetch_collection().await?;
        progress(75.0);

        let entry = EncodedImage {
            id: Self::next_entry_id(),
            filename: item.filename.clone(),
            base64_data,
            mime_type: item.content_type.clone(),
            size: item.size(),
            uploaded_at: Utc::now(),
            category: item.category,
            chair_id: item.chair_id.clone(),
            job_id: item.job_id.clone(),
        };
        let record = Self::record_from_entry(&entry);

        collection.images.push(entry);
        collection.touch();
        self.save_collection(&collection).await?;
        progress(100.0);

        info!("stored {} in remote bucket as {}", item.filename, record.id);
        Ok(record)
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<StoredPhotoRecord>, StorageError> {
        let collection = self.fetch_collection().await?;
        Ok(collection
            .images
            .iter()
            .find(|entry| entry.id == id)
            .map(Self::record_from_entry))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StorageError> {
        let mut collection = self.fetch_collection().await?;
        let before = collection.images.len();
        collection.images.retain(|entry| entry.id != id);

        if collection.images.len() == before {
            debug!("remote bucket entry {} already absent", id);
            return Ok(false);
        }

        collection.touch();
        self.save_collection(&collection).await?;
        info!("deleted {} from remote bucket", id);
        Ok(true)
    }

    async fn list_all(
        &self,
        filter: Option<&PhotoFilter>,
    ) -> Result<Vec<StoredPhotoRecord>, StorageError> {
        let collection = self.fetch_collection().await?;
        Ok(collection
            .images
            .iter()
            .filter(|entry| filter.map_or(true, |f| Self::entry_matches(entry, f)))
            .map(Self::record_from_entry)
            .collect())
    }

    async fn stats(&self) -> Result<StorageStats, StorageError> {
        let collection = self.fetch_collection().await?;
        let mut stats = StorageStats::default();
        for entry in &collection.images {
            stats.record(entry.category, entry.size);
        }
        Ok(stats)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        if self.test_connection().await {
            Ok(())
        } else {
            Err(StorageError::backend(
                StorageKind::RemoteBucket,
                "connectivity test failed",
            ))
        }
    }
}
