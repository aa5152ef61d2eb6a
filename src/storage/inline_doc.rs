//! Inline document storage backend
//!
//! First-tier fallback: compresses the image and stores the encoded payload
//! as one row per photo in the `base64_images` table. No true transfer
//! signal exists, so progress is reported at fixed checkpoints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    validate_for_inline_storage, ProgressCallback, StorageBackend, StorageKind,
    FALLBACK_SIZE_LIMIT,
};
use crate::codec::{self, EncodeOptions};
use crate::errors::StorageError;
use crate::models::{PhotoCategory, PhotoFilter, StorageStats, StoredPhotoRecord, UploadItem};

pub struct InlineDocumentBackend {
    pool: PgPool,
    options: EncodeOptions,
}

impl InlineDocumentBackend {
    pub fn new(pool: PgPool, options: EncodeOptions) -> Self {
        InlineDocumentBackend { pool, options }
    }

    fn backend_err(e: impl std::fmt::Display) -> StorageError {
        StorageError::backend(StorageKind::InlineDocument, e)
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> StoredPhotoRecord {
        let id: Uuid = row.get("id");
        let category: String = row.get("category");
        let size: i64 = row.get("size");
        let uploaded_at: DateTime<Utc> = row.get("uploaded_at");

        StoredPhotoRecord {
            id: id.to_string(),
            url: row.get("base64_data"),
            filename: row.get("filename"),
            category: PhotoCategory::parse_lossy(&category),
            uploaded_at,
            size: size.max(0) as u64,
            backend: StorageKind::InlineDocument,
        }
    }
}

#[async_trait]
impl StorageBackend for InlineDocumentBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::InlineDocument
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
        .map_err(Self::backend_err)??;
        progress(75.0);

        let id = Uuid::new_v4();
        let uploaded_at = Utc::now();
        sqlx::query(
            r#"INSERT INTO base64_images
               (id, filename, base64_data, mime_type, size, uploaded_at, category, chair_id, job_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(id)
        .bind(&item.filename)
        .bind(&base64_data)
        .bind(&item.content_type)
        .bind(item.size() as i64)
        .bind(uploaded_at)
        .bind(item.category.as_str())
        .bind(&item.chair_id)
        .bind(&item.job_id)
        .execute(&self.pool)
        .await
        .map_err(Self::backend_err)?;
        progress(100.0);

        info!("stored {} inline as {}", item.filename, id);
        Ok(StoredPhotoRecord {
            id: id.to_string(),
            url: base64_data,
            filename: item.filename.clone(),
            category: item.category,
            uploaded_at,
            size: item.size(),
            backend: StorageKind::InlineDocument,
        })
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<StoredPhotoRecord>, StorageError> {
        let Ok(uuid) = Uuid::parse_str(id) else {
            return Ok(None);
        };

        let row = sqlx::query(
            r#"SELECT id, filename, base64_data, size, uploaded_at, category
               FROM base64_images WHERE id = $1"#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::backend_err)?;

        Ok(row.as_ref().map(Self::record_from_row))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StorageError> {
        let Ok(uuid) = Uuid::parse_str(id) else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM base64_images WHERE id = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map_err(Self::backend_err)?;

        if result.rows_affected() == 0 {
            debug!("inline document {} already absent", id);
            return Ok(false);
        }
        info!("deleted inline document {}", id);
        Ok(true)
    }

    async fn list_all(
        &self,
        filter: Option<&PhotoFilter>,
    ) -> Result<Vec<StoredPhotoRecord>, StorageError> {
        let mut sql = String::from(
            r#"SELECT id, filename, base64_data, size, uploaded_at, category
               FROM base64_images"#,
        );

        let mut conditions = Vec::new();
        let mut bind_index = 1;
        let filter = filter.cloned().unwrap_or_default();

        if filter.category.is_some() {
            conditions.push(format!("category = ${}", bind_index));
            bind_index += 1;
        }
        if filter.chair_id.is_some() {
            conditions.push(format!("chair_id = ${}", bind_index));
            bind_index += 1;
        }
        if filter.job_id.is_some() {
            conditions.push(format!("job_id = ${}", bind_index));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY uploaded_at DESC");

        let mut query = sqlx::query(&sql);
        if let Some(category) = filter.category {
            query = query.bind(category.as_str());
        }
        if let Some(chair_id) = &filter.chair_id {
            query = query.bind(chair_id.clone());
        }
        if let Some(job_id) = &filter.job_id {
            query = query.bind(job_id.clone());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(Self::backend_err)?;

        Ok(rows.iter().map(Self::record_from_row).collect())
    }

    async fn stats(&self) -> Result<StorageStats, StorageError> {
        let rows = sqlx::query(
            r#"SELECT category, COUNT(*) AS count, COALESCE(SUM(size), 0)::BIGINT AS bytes
               FROM base64_images GROUP BY category"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Self::backend_err)?;

        let mut stats = StorageStats::default();
        for row in &rows {
            let category: String = row.get("category");
            let count: i64 = row.get("count");
            let bytes: i64 = row.get("bytes");
            stats.total_images += count.max(0) as u64;
            stats.total_bytes += bytes.max(0) as u64;
            stats.categories.insert(category, count.max(0) as u64);
        }
        Ok(stats)
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS base64_images (
                id UUID PRIMARY KEY,
                filename TEXT NOT NULL,
                base64_data TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size BIGINT NOT NULL,
                uploaded_at TIMESTAMPTZ NOT NULL,
                category TEXT NOT NULL,
                chair_id TEXT,
                job_id TEXT
            )"#,
        )
        .execute(&self.pool)
        .await
        .map_err(Self::backend_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS base64_images_category_idx ON base64_images (category)",
        )
        .execute(&self.pool)
        .await
        .map_err(Self::backend_err)?;

        debug!("inline document schema ensured");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(Self::backend_err)?;
        Ok(())
    }
}
