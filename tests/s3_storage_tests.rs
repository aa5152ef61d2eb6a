//! Object store backend construction and key scheme tests (no network)

#![cfg(feature = "s3")]

use chairsnap::config::ObjectStoreConfig;
use chairsnap::models::PhotoCategory;
use chairsnap::storage::object_store::ObjectStoreBackend;
use chairsnap::test_helpers::png_item;

fn base_config() -> ObjectStoreConfig {
    ObjectStoreConfig {
        bucket_name: "chairsnap-photos".to_string(),
        region: "eu-west-1".to_string(),
        access_key_id: "test-key".to_string(),
        secret_access_key: "test-secret".to_string(),
        endpoint_url: None,
    }
}

#[tokio::test]
async fn construction_requires_bucket_and_credentials() {
    let mut config = base_config();
    config.bucket_name = String::new();
    let err = ObjectStoreBackend::new(config).unwrap_err();
    assert!(err.to_string().contains("Bucket name is required"));

    let mut config = base_config();
    config.access_key_id = String::new();
    let err = ObjectStoreBackend::new(config).unwrap_err();
    assert!(err.to_string().contains("Access key ID is required"));

    let mut config = base_config();
    config.secret_access_key = String::new();
    let err = ObjectStoreBackend::new(config).unwrap_err();
    assert!(err.to_string().contains("Secret access key is required"));
}

#[tokio::test]
async fn construction_succeeds_with_custom_endpoint() {
    let mut config = base_config();
    config.endpoint_url = Some("http://localhost:9000".to_string());
    // No connection is made at construction time
    assert!(ObjectStoreBackend::new(config).is_ok());
}

#[test]
fn photo_key_is_owner_scoped_when_references_are_present() {
    let mut item = png_item("sofa.png");
    item.category = PhotoCategory::Before;
    item.chair_id = Some("chair-42".to_string());
    item.job_id = Some("job-7".to_string());

    let key = ObjectStoreBackend::photo_key(&item);
    assert!(key.starts_with("chairs/chair-42/jobs/job-7/before/"));
    assert!(key.ends_with(".png"));

    // Same inputs still yield distinct keys thanks to the random suffix
    let other = ObjectStoreBackend::photo_key(&item);
    assert_ne!(key, other);
}

#[test]
fn photo_key_falls_back_to_shared_prefix_without_references() {
    let mut item = png_item("sofa.png");
    item.category = PhotoCategory::After;
    // Only one reference present still routes to the shared prefix
    item.chair_id = Some("chair-42".to_string());

    let key = ObjectStoreBackend::photo_key(&item);
    assert!(key.starts_with("photos/after/"));
}

#[test]
fn photo_key_defaults_extension_to_jpg() {
    let item = chairsnap::test_helpers::upload_item("no_extension", "image/jpeg", vec![0u8; 8]);
    let key = ObjectStoreBackend::photo_key(&item);
    assert!(key.ends_with(".jpg"));
}

#[test]
fn category_parses_back_out_of_both_key_shapes() {
    assert_eq!(
        ObjectStoreBackend::category_from_key("chairs/c1/jobs/j1/before/1_a.png"),
        PhotoCategory::Before
    );
    assert_eq!(
        ObjectStoreBackend::category_from_key("photos/after/1_a.png"),
        PhotoCategory::After
    );
    assert_eq!(
        ObjectStoreBackend::category_from_key("weird-key"),
        PhotoCategory::General
    );
}

#[test]
fn public_url_prefers_the_custom_endpoint() {
    let backend = ObjectStoreBackend::new(base_config()).unwrap();
    assert_eq!(
        backend.public_url("photos/general/1_a.jpg"),
        "https://chairsnap-photos.s3.eu-west-1.amazonaws.com/photos/general/1_a.jpg"
    );

    let mut config = base_config();
    config.endpoint_url = Some("http://localhost:9000/".to_string());
    let backend = ObjectStoreBackend::new(config).unwrap();
    assert_eq!(
        backend.public_url("photos/general/1_a.jpg"),
        "http://localhost:9000/chairsnap-photos/photos/general/1_a.jpg"
    );
}
