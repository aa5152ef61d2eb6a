//! Inline document store lifecycle against a real Postgres instance.
//!
//! These tests need a database; they skip cleanly when neither
//! `TEST_DATABASE_URL` nor `DATABASE_URL` is set or reachable.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use chairsnap::codec::{decode_to_displayable, EncodeOptions};
use chairsnap::models::{PhotoCategory, PhotoFilter};
use chairsnap::storage::inline_doc::InlineDocumentBackend;
use chairsnap::storage::{noop_progress, StorageBackend, StorageKind};
use chairsnap::test_helpers::{png_bytes, upload_item};

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;

    match PgPoolOptions::new().max_connections(2).connect(&url).await {
        Ok(pool) => Some(pool),
        Err(e) => {
            eprintln!("skipping inline store tests, database unreachable: {}", e);
            None
        }
    }
}

async fn backend() -> Option<InlineDocumentBackend> {
    let pool = test_pool().await?;
    let backend = InlineDocumentBackend::new(pool, EncodeOptions::default());
    backend.initialize().await.expect("schema setup");
    Some(backend)
}

#[tokio::test]
async fn upload_fetch_decode_delete_lifecycle() {
    let Some(backend) = backend().await else { return };

    let chair_id = format!("chair-{}", Uuid::new_v4());
    let mut item = upload_item("red.png", "image/png", png_bytes(10, 10, [255, 0, 0]));
    item.category = PhotoCategory::Before;
    item.chair_id = Some(chair_id.clone());

    let record = backend.upload(&item, noop_progress()).await.unwrap();
    assert_eq!(record.backend, StorageKind::InlineDocument);
    assert_eq!(record.size, item.size());
    assert!(record.url.starts_with("data:image/jpeg;base64,"));

    // The stored payload decodes back to displayable image bytes
    let display = decode_to_displayable(&record.url).unwrap();
    assert_eq!(display.mime_type(), "image/jpeg");
    assert!(image::load_from_memory(display.as_bytes()).is_ok());

    let fetched = backend
        .fetch_by_id(&record.id)
        .await
        .unwrap()
        .expect("row was just inserted");
    assert_eq!(fetched.filename, "red.png");
    assert_eq!(fetched.category, PhotoCategory::Before);

    let filter = PhotoFilter {
        chair_id: Some(chair_id),
        ..Default::default()
    };
    let listed = backend.list_all(Some(&filter)).await.unwrap();
    assert_eq!(listed.len(), 1);

    assert!(backend.delete_by_id(&record.id).await.unwrap());
    // Idempotent: the second delete reports not-found without failing
    assert!(!backend.delete_by_id(&record.id).await.unwrap());
    assert!(backend.fetch_by_id(&record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_ids_read_as_absent() {
    let Some(backend) = backend().await else { return };

    assert!(backend.fetch_by_id("not-a-uuid").await.unwrap().is_none());
    assert!(!backend.delete_by_id("not-a-uuid").await.unwrap());
}

#[tokio::test]
async fn stats_count_rows_by_category() {
    let Some(backend) = backend().await else { return };

    let job_id = format!("job-{}", Uuid::new_v4());
    let mut item = upload_item("after.png", "image/png", png_bytes(8, 8, [0, 255, 0]));
    item.category = PhotoCategory::After;
    item.job_id = Some(job_id.clone());

    let record = backend.upload(&item, noop_progress()).await.unwrap();

    let stats = backend.stats().await.unwrap();
    assert!(stats.total_images >= 1);
    assert!(stats.categories.get("after").copied().unwrap_or(0) >= 1);

    backend.delete_by_id(&record.id).await.unwrap();
}
