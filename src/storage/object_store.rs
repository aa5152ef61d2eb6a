//! Primary object storage backend
//!
//! Streams raw photo bytes to an S3-compatible service under a
//! deterministic key and returns a resolvable URL. This adapter never
//! touches the codec; originals are stored as uploaded. Any failure here is
//! a fallback trigger for the orchestrator, never fatal to the batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use aws_types::region::Region as AwsRegion;

use super::{ProgressCallback, StorageBackend, StorageKind};
use crate::config::ObjectStoreConfig;
use crate::errors::StorageError;
use crate::models::{PhotoCategory, PhotoFilter, StorageStats, StoredPhotoRecord, UploadItem};

/// Above this size uploads go through the multipart API so progress can be
/// reported per part.
const MULTIPART_THRESHOLD: usize = 8 * 1024 * 1024;

/// Part size for multipart uploads (AWS minimum is 5 MiB).
const MULTIPART_CHUNK_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug)]
pub struct ObjectStoreBackend {
    client: Client,
    config: ObjectStoreConfig,
}

impl ObjectStoreBackend {
    pub fn new(config: ObjectStoreConfig) -> Result<Self, StorageError> {
        if config.bucket_name.is_empty() {
            return Err(Self::backend_err("Bucket name is required"));
        }
        if config.access_key_id.is_empty() {
            return Err(Self::backend_err("Access key ID is required"));
        }
        if config.secret_access_key.is_empty() {
            return Err(Self::backend_err("Secret access key is required"));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "chairsnap-object-store",
        );

        let region = if config.region.is_empty() {
            "us-east-1".to_string()
        } else {
            config.region.clone()
        };

        let mut builder = aws_sdk_s3::config::Builder::new()
            .region(AwsRegion::new(region))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(endpoint_url) = &config.endpoint_url {
            if !endpoint_url.is_empty() {
                builder = builder.endpoint_url(endpoint_url).force_path_style(true);
                info!("using custom object store endpoint: {}", endpoint_url);
            }
        }

        let client = Client::from_conf(builder.build());
        Ok(ObjectStoreBackend { client, config })
    }

    fn backend_err(e: impl std::fmt::Display) -> StorageError {
        StorageError::backend(StorageKind::ObjectStore, e)
    }

    /// Deterministic object key: owner-scoped when both references are
    /// present, otherwise the shared photos prefix. The timestamp + random
    /// suffix avoids collisions between same-named uploads.
    pub fn photo_key(item: &UploadItem) -> String {
        let extension = item.extension().unwrap_or_else(|| "jpg".to_string());
        let suffix = Uuid::new_v4().simple().to_string();
        let filename = format!(
            "{}_{}.{}",
            Utc::now().timestamp_millis(),
            &suffix[..10],
            extension
        );

        match (&item.chair_id, &item.job_id) {
            (Some(chair_id), Some(job_id)) => format!(
                "chairs/{}/jobs/{}/{}/{}",
                chair_id, job_id, item.category, filename
            ),
            _ => format!("photos/{}/{}", item.category, filename),
        }
    }

    /// Externally resolvable URL for a stored object.
    pub fn public_url(&self, key: &str) -> String {
        match &self.config.endpoint_url {
            Some(endpoint) if !endpoint.is_empty() => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.config.bucket_name,
                key
            ),
            _ => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.config.bucket_name, self.config.region, key
            ),
        }
    }

    /// Parse the category segment back out of a photo key. Both key shapes
    /// put it immediately before the filename.
    pub fn category_from_key(key: &str) -> PhotoCategory {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() >= 2 {
            PhotoCategory::parse_lossy(segments[segments.len() - 2])
        } else {
            PhotoCategory::General
        }
    }

    fn key_matches(key: &str, filter: &PhotoFilter) -> bool {
        if let Some(category) = filter.category {
            if Self::category_from_key(key) != category {
                return false;
            }
        }
        if let Some(chair_id) = &filter.chair_id {
            if !key.starts_with(&format!("chairs/{}/", chair_id)) {
                return false;
            }
        }
        if let Some(job_id) = &filter.job_id {
            if !key.contains(&format!("/jobs/{}/", job_id)) {
                return false;
            }
        }
        true
    }

    async fn put_single(&self, key: &str, item: &UploadItem) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .content_type(&item.content_type)
            .body(ByteStream::from(item.data.to_vec()))
            .send()
            .await
            .map_err(|e| Self::backend_err(format!("put_object failed: {}", e)))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        item: &UploadItem,
        progress: &ProgressCallback,
    ) -> Result<(), StorageError> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.config.bucket_name)
            .key(key)
            .content_type(&item.content_type)
            .send()
            .await
            .map_err(|e| Self::backend_err(format!("create_multipart_upload failed: {}", e)))?;

        let upload_id = create
            .upload_id()
            .ok_or_else(|| Self::backend_err("multipart upload returned no upload id"))?
            .to_string();

        let chunks: Vec<&[u8]> = item.data.chunks(MULTIPART_CHUNK_SIZE).collect();
        let total_parts = chunks.len();
        let mut completed_parts = Vec::with_capacity(total_parts);

        for (index, chunk) in chunks.into_iter().enumerate() {
            let part_number = (index + 1) as i32;
            let part = self
                .client
                .upload_part()
                .bucket(&self.config.bucket_name)
                .key(key)
                .upload_id(&upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send()
                .await;

            let part = match part {
                Ok(part) => part,
                Err(e) => {
                    // Abandon the half-written upload so the bucket doesn't
                    // accumulate orphaned parts.
                    let _ = self
                        .client
                        .abort_multipart_upload()
                        .bucket(&self.config.bucket_name)
                        .key(key)
                        .upload_id(&upload_id)
                        .send()
                        .await;
                    return Err(Self::backend_err(format!(
                        "upload_part {} failed: {}",
                        part_number, e
                    )));
                }
            };

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(part.e_tag().map(|t| t.to_string()))
                    .build(),
            );
            progress((part_number as f32 / total_parts as f32) * 100.0);
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.config.bucket_name)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Self::backend_err(format!("complete_multipart_upload failed: {}", e)))?;

        Ok(())
    }

    async fn list_keys_under(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, u64, Option<DateTime<Utc>>)>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket_name)
                .prefix(prefix);
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Self::backend_err(format!("list_objects_v2 failed: {}", e)))?;

            if let Some(contents) = response.contents {
                for object in contents {
                    let Some(key) = object.key else { continue };
                    if key.ends_with('/') {
                        continue;
                    }
                    let size = object.size.unwrap_or(0).max(0) as u64;
                    let last_modified = object
                        .last_modified
                        .and_then(|dt| DateTime::from_timestamp(dt.secs(), 0));
                    objects.push((key, size, last_modified));
                }
            }

            if response.is_truncated == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }

    fn record_for_key(
        &self,
        key: &str,
        size: u64,
        last_modified: Option<DateTime<Utc>>,
    ) -> StoredPhotoRecord {
        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        StoredPhotoRecord {
            id: key.to_string(),
            url: self.public_url(key),
            filename,
            category: Self::category_from_key(key),
            uploaded_at: last_modified.unwrap_or_else(Utc::now),
            size,
            backend: StorageKind::ObjectStore,
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::ObjectStore
    }

    async fn upload(
        &self,
        item: &UploadItem,
        progress: ProgressCallback,
    ) -> Result<StoredPhotoRecord, StorageError> {
        let key = Self::photo_key(item);
        progress(0.0);

        if item.data.len() > MULTIPART_THRESHOLD {
            self.put_multipart(&key, item, &progress).await?;
        } else {
            self.put_single(&key, item).await?;
            progress(100.0);
        }

        info!(
            "stored {} in object store as {} ({} bytes)",
            item.filename,
            key,
            item.size()
        );
        Ok(StoredPhotoRecord {
            id: key.clone(),
            url: self.public_url(&key),
            filename: item.filename.clone(),
            category: item.category,
            uploaded_at: Utc::now(),
            size: item.size(),
            backend: StorageKind::ObjectStore,
        })
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<StoredPhotoRecord>, StorageError> {
        let head = self
            .client
            .head_object()
            .bucket(&self.config.bucket_name)
            .key(id)
            .send()
            .await;

        match head {
            Ok(head) => {
                let size = head.content_length().unwrap_or(0).max(0) as u64;
                let last_modified = head
                    .last_modified()
                    .and_then(|dt| DateTime::from_timestamp(dt.secs(), 0));
                Ok(Some(self.record_for_key(id, size, last_modified)))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(Self::backend_err(format!("head_object failed: {}", service_err)))
                }
            }
        }
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StorageError> {
        // S3 deletes are unconditional; probe first so callers can tell a
        // removal from a no-op.
        if self.fetch_by_id(id).await?.is_none() {
            debug!("object {} already absent", id);
            return Ok(false);
        }

        self.client
            .delete_object()
            .bucket(&self.config.bucket_name)
            .key(id)
            .send()
            .await
            .map_err(|e| Self::backend_err(format!("delete_object failed: {}", e)))?;

        info!("deleted object {}", id);
        Ok(true)
    }

    async fn list_all(
        &self,
        filter: Option<&PhotoFilter>,
    ) -> Result<Vec<StoredPhotoRecord>, StorageError> {
        let mut records = Vec::new();
        for prefix in ["chairs/", "photos/"] {
            for (key, size, last_modified) in self.list_keys_under(prefix).await? {
                if filter.map_or(true, |f| Self::key_matches(&key, f)) {
                    records.push(self.record_for_key(&key, size, last_modified));
                }
            }
        }
        Ok(records)
    }

    async fn stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = StorageStats::default();
        for record in self.list_all(None).await? {
            stats.record(record.category, record.size);
        }
        Ok(stats)
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket_name)
            .send()
            .await
            .map_err(|e| {
                Self::backend_err(format!(
                    "bucket {} is not accessible: {}",
                    self.config.bucket_name, e
                ))
            })?;
        debug!("object store bucket {} is reachable", self.config.bucket_name);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        self.initialize().await
    }
}
