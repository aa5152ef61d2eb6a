//! Upload orchestrator behavior: validation, batch admission, fallback
//! ordering, terminal reporting and deletion dispatch.

use std::sync::{Arc, Mutex};

use chairsnap::errors::{StorageError, ValidationError};
use chairsnap::services::uploader::{BatchProgressFn, UploadOutcome};
use chairsnap::services::PhotoUploader;
use chairsnap::storage::{StorageBackend, StorageKind, FALLBACK_SIZE_LIMIT};
use chairsnap::test_helpers::{png_item, upload_item, MockBackend};

fn uploader_with(
    backends: Vec<Arc<MockBackend>>,
    max_photos: usize,
) -> PhotoUploader {
    let chain = backends
        .into_iter()
        .map(|b| b as Arc<dyn StorageBackend>)
        .collect();
    PhotoUploader::new(chain, max_photos)
}

#[tokio::test]
async fn non_image_file_is_rejected_without_contacting_backends() {
    let primary = Arc::new(MockBackend::new(StorageKind::ObjectStore));
    let fallback = Arc::new(MockBackend::new(StorageKind::InlineDocument));
    let uploader = uploader_with(vec![primary.clone(), fallback.clone()], 10);

    let results = uploader
        .upload_batch(
            vec![upload_item("invoice.pdf", "application/pdf", vec![0u8; 64])],
            0,
            None,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0].outcome,
        UploadOutcome::Rejected(ValidationError::NotAnImage { .. })
    ));
    assert_eq!(primary.upload_call_count(), 0);
    assert_eq!(fallback.upload_call_count(), 0);
}

#[tokio::test]
async fn batch_over_photo_limit_is_rejected_entirely() {
    let backend = Arc::new(MockBackend::new(StorageKind::ObjectStore));
    let uploader = uploader_with(vec![backend.clone()], 10);

    let items = vec![png_item("a.png"), png_item("b.png"), png_item("c.png")];
    let err = uploader.upload_batch(items, 8, None).await.unwrap_err();

    assert!(matches!(
        err,
        ValidationError::TooManyPhotos {
            max_photos: 10,
            existing: 8,
            incoming: 3,
        }
    ));
    // All-or-nothing admission: nothing was uploaded
    assert_eq!(backend.upload_call_count(), 0);
}

#[tokio::test]
async fn invalid_entries_do_not_count_toward_batch_admission() {
    let backend = Arc::new(MockBackend::new(StorageKind::ObjectStore));
    let uploader = uploader_with(vec![backend.clone()], 10);

    let items = vec![
        upload_item("notes.txt", "text/plain", vec![1, 2, 3]),
        png_item("ok.png"),
    ];
    let results = uploader.upload_batch(items, 9, None).await.unwrap();

    assert!(matches!(results[0].outcome, UploadOutcome::Rejected(_)));
    assert!(matches!(results[1].outcome, UploadOutcome::Stored(_)));
    assert_eq!(backend.upload_call_count(), 1);
}

#[tokio::test]
async fn primary_failure_falls_back_and_tags_record() {
    let primary = Arc::new(MockBackend::failing(StorageKind::ObjectStore));
    let fallback = Arc::new(MockBackend::new(StorageKind::InlineDocument));
    let uploader = uploader_with(vec![primary.clone(), fallback.clone()], 10);

    let results = uploader
        .upload_batch(vec![png_item("chair.png")], 0, None)
        .await
        .unwrap();

    let UploadOutcome::Stored(record) = &results[0].outcome else {
        panic!("expected a stored record, got {:?}", results[0].outcome);
    };
    assert_eq!(record.backend, StorageKind::InlineDocument);
    assert!(record.is_degraded());
    assert_eq!(primary.upload_call_count(), 1);
    assert_eq!(fallback.upload_call_count(), 1);
}

#[tokio::test]
async fn exhausted_chain_reports_terminal_failure() {
    let primary = Arc::new(MockBackend::failing(StorageKind::ObjectStore));
    let fallback = Arc::new(MockBackend::failing(StorageKind::InlineDocument));
    let uploader = uploader_with(vec![primary, fallback], 10);

    let results = uploader
        .upload_batch(vec![png_item("chair.png")], 0, None)
        .await
        .unwrap();

    let UploadOutcome::Failed { message } = &results[0].outcome else {
        panic!("expected terminal failure, got {:?}", results[0].outcome);
    };
    assert!(message.contains("simulated outage"));
}

#[tokio::test]
async fn failure_in_one_file_does_not_affect_siblings() {
    let primary = Arc::new(MockBackend::new(StorageKind::ObjectStore));
    let uploader = uploader_with(vec![primary], 10);

    let items = vec![
        png_item("good.png"),
        upload_item("bad.exe", "application/octet-stream", vec![0u8; 16]),
        png_item("also_good.png"),
    ];
    let results = uploader.upload_batch(items, 0, None).await.unwrap();

    assert!(matches!(results[0].outcome, UploadOutcome::Stored(_)));
    assert!(matches!(results[1].outcome, UploadOutcome::Rejected(_)));
    assert!(matches!(results[2].outcome, UploadOutcome::Stored(_)));
}

#[tokio::test]
async fn oversized_file_is_rejected_when_only_capped_backends_are_configured() {
    let inline = Arc::new(MockBackend::new(StorageKind::InlineDocument));
    let bucket = Arc::new(MockBackend::new(StorageKind::RemoteBucket));
    let uploader = uploader_with(vec![inline.clone(), bucket.clone()], 10);

    let six_mib = vec![0u8; 6 * 1024 * 1024];
    let results = uploader
        .upload_batch(vec![upload_item("huge.jpg", "image/jpeg", six_mib)], 0, None)
        .await
        .unwrap();

    assert!(matches!(
        results[0].outcome,
        UploadOutcome::Rejected(ValidationError::FileTooLarge {
            limit: FALLBACK_SIZE_LIMIT,
            ..
        })
    ));
    // Rejected before any backend attempt, so no compression work happened
    assert_eq!(inline.upload_call_count(), 0);
    assert_eq!(bucket.upload_call_count(), 0);
}

#[tokio::test]
async fn oversized_file_still_reaches_uncapped_primary() {
    let primary = Arc::new(MockBackend::new(StorageKind::ObjectStore));
    let inline = Arc::new(MockBackend::new(StorageKind::InlineDocument));
    let uploader = uploader_with(vec![primary.clone(), inline.clone()], 10);

    let six_mib = vec![0u8; 6 * 1024 * 1024];
    let results = uploader
        .upload_batch(vec![upload_item("huge.jpg", "image/jpeg", six_mib)], 0, None)
        .await
        .unwrap();

    assert!(matches!(results[0].outcome, UploadOutcome::Stored(_)));
    assert_eq!(primary.upload_call_count(), 1);
    assert_eq!(inline.upload_call_count(), 0);
}

#[tokio::test]
async fn oversized_file_skips_capped_fallback_after_primary_failure() {
    let primary = Arc::new(MockBackend::failing(StorageKind::ObjectStore));
    let inline = Arc::new(MockBackend::new(StorageKind::InlineDocument));
    let uploader = uploader_with(vec![primary.clone(), inline.clone()], 10);

    let six_mib = vec![0u8; 6 * 1024 * 1024];
    let results = uploader
        .upload_batch(vec![upload_item("huge.jpg", "image/jpeg", six_mib)], 0, None)
        .await
        .unwrap();

    // The fallback's size cap survives as the terminal report
    assert!(matches!(
        results[0].outcome,
        UploadOutcome::Rejected(ValidationError::FileTooLarge { .. })
    ));
    assert_eq!(primary.upload_call_count(), 1);
    assert_eq!(inline.upload_call_count(), 0);
}

#[tokio::test]
async fn progress_is_monotonic_within_one_file() {
    let backend = Arc::new(
        MockBackend::new(StorageKind::InlineDocument)
            .with_checkpoints(vec![10.0, 25.0, 75.0, 100.0]),
    );
    let uploader = uploader_with(vec![backend], 10);

    let seen: Arc<Mutex<Vec<(usize, f32)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: BatchProgressFn = Arc::new(move |index, pct| {
        sink.lock().unwrap().push((index, pct));
    });

    uploader
        .upload_batch(vec![png_item("a.png"), png_item("b.png")], 0, Some(progress))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    for index in [0usize, 1] {
        let series: Vec<f32> = seen
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, pct)| *pct)
            .collect();
        assert_eq!(series, vec![10.0, 25.0, 75.0, 100.0]);
        assert!(series.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[tokio::test]
async fn delete_dispatches_on_backend_tag_and_is_idempotent() {
    let primary = Arc::new(MockBackend::new(StorageKind::ObjectStore));
    let inline = Arc::new(MockBackend::new(StorageKind::InlineDocument));
    let uploader = uploader_with(vec![primary.clone(), inline.clone()], 10);

    let results = uploader
        .upload_batch(vec![png_item("chair.png")], 0, None)
        .await
        .unwrap();
    let UploadOutcome::Stored(record) = &results[0].outcome else {
        panic!("expected stored record");
    };
    assert_eq!(record.backend, StorageKind::ObjectStore);

    assert!(uploader.delete_photo(record).await.unwrap());
    // Second delete of the same record reports not-found, never an error
    assert!(!uploader.delete_photo(record).await.unwrap());
    assert!(primary.stored_records().is_empty());
}

#[tokio::test]
async fn delete_against_unconfigured_backend_is_an_error() {
    let uploader = uploader_with(vec![Arc::new(MockBackend::new(StorageKind::ObjectStore))], 10);

    let err = uploader
        .delete_by_id(StorageKind::RemoteBucket, "img_123")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Backend {
            kind: StorageKind::RemoteBucket,
            ..
        }
    ));
}

#[tokio::test]
async fn list_and_stats_merge_across_backends() {
    let primary = Arc::new(MockBackend::new(StorageKind::ObjectStore));
    let bucket = Arc::new(MockBackend::new(StorageKind::RemoteBucket));
    let uploader = uploader_with(vec![primary.clone(), bucket.clone()], 10);

    uploader
        .upload_batch(vec![png_item("first.png")], 0, None)
        .await
        .unwrap();

    // Force the second photo onto the bucket by failing nothing: store
    // directly through the backend to simulate an earlier degraded upload.
    bucket
        .upload(&png_item("second.png"), chairsnap::storage::noop_progress())
        .await
        .unwrap();

    let records = uploader.list_photos(None).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records
        .windows(2)
        .all(|w| w[0].uploaded_at >= w[1].uploaded_at));

    let stats = uploader.get_stats().await;
    assert_eq!(stats.total_images, 2);
    assert_eq!(stats.categories.get("general"), Some(&2));
}

#[tokio::test]
async fn empty_chain_reports_failure_not_panic() {
    let uploader = PhotoUploader::new(Vec::new(), 10);
    let results = uploader
        .upload_batch(vec![png_item("a.png")], 0, None)
        .await
        .unwrap();
    let UploadOutcome::Failed { message } = &results[0].outcome else {
        panic!("expected failure");
    };
    assert!(message.contains("no storage backends"));
}
