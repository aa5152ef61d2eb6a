//! Environment-driven configuration
//!
//! Every backend gets an explicit config struct injected at construction;
//! nothing reads the environment after startup.

use anyhow::{anyhow, Result};

use crate::codec::EncodeOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    /// Connection string for the inline document store. When absent the
    /// inline backend is left out of the fallback chain.
    pub database_url: Option<String>,
    /// Ceiling on photos per chair/job photo set.
    pub max_photos_per_set: usize,
    /// Compression bounds applied by the inline-encoding backends.
    pub image_max_width: u32,
    pub image_max_height: u32,
    pub image_quality: u8,
    pub s3_enabled: bool,
    pub s3_config: Option<ObjectStoreConfig>,
    pub remote_bucket: Option<RemoteBucketConfig>,
}

/// S3-compatible object storage settings for the primary backend.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// For S3-compatible services
    pub endpoint_url: Option<String>,
}

/// Remote JSON bucket settings for the last-resort backend.
#[derive(Debug, Clone)]
pub struct RemoteBucketConfig {
    pub base_url: String,
    /// Account-scoped bucket identifier in the basket URL.
    pub bucket_id: String,
    /// Basket holding the photo collection.
    pub basket: String,
    /// Auxiliary basket used only by the connectivity test.
    pub test_basket: String,
    pub timeout_seconds: u64,
}

impl RemoteBucketConfig {
    pub fn new(base_url: String, bucket_id: String) -> Self {
        RemoteBucketConfig {
            base_url,
            bucket_id,
            basket: "images".to_string(),
            test_basket: "testBasket".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server_address =
            std::env::var("SERVER_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let max_photos_per_set = parse_env("MAX_PHOTOS_PER_SET", 10usize)?;
        let image_max_width = parse_env("IMAGE_MAX_WIDTH", 800u32)?;
        let image_max_height = parse_env("IMAGE_MAX_HEIGHT", 600u32)?;
        let image_quality = parse_env("IMAGE_QUALITY", 70u8)?;

        let s3_enabled = std::env::var("S3_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);
        let s3_config = if s3_enabled {
            Some(ObjectStoreConfig {
                bucket_name: std::env::var("S3_BUCKET_NAME").unwrap_or_default(),
                region: std::env::var("S3_REGION").unwrap_or_default(),
                access_key_id: std::env::var("S3_ACCESS_KEY_ID").unwrap_or_default(),
                secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY").unwrap_or_default(),
                endpoint_url: std::env::var("S3_ENDPOINT_URL").ok().filter(|s| !s.is_empty()),
            })
        } else {
            None
        };

        let remote_bucket = std::env::var("PANTRY_ID").ok().filter(|s| !s.is_empty()).map(|id| {
            let base_url = std::env::var("PANTRY_BASE_URL")
                .unwrap_or_else(|_| "https://getpantry.cloud/apiv1/pantry".to_string());
            let mut config = RemoteBucketConfig::new(base_url, id);
            if let Ok(basket) = std::env::var("PANTRY_BASKET") {
                if !basket.is_empty() {
                    config.basket = basket;
                }
            }
            config
        });

        Ok(Config {
            server_address,
            database_url,
            max_photos_per_set,
            image_max_width,
            image_max_height,
            image_quality,
            s3_enabled,
            s3_config,
            remote_bucket,
        })
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            max_width: self.image_max_width,
            max_height: self.image_max_height,
            quality: self.image_quality,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| anyhow!("invalid value for {}: {}", name, value)),
        Err(_) => Ok(default),
    }
}
