//! Factory assembling the fallback chain from configuration

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use super::inline_doc::InlineDocumentBackend;
#[cfg(feature = "s3")]
use super::object_store::ObjectStoreBackend;
use super::remote_bucket::RemoteBucketBackend;
use super::StorageBackend;
use crate::codec::EncodeOptions;
use crate::config::{Config, RemoteBucketConfig};

/// Configuration for one backend in the chain.
pub enum BackendConfig {
    #[cfg(feature = "s3")]
    ObjectStore(crate::config::ObjectStoreConfig),
    InlineDocument { pool: PgPool, options: EncodeOptions },
    RemoteBucket { config: RemoteBucketConfig, options: EncodeOptions },
}

/// Create a single storage backend from its configuration. The backend's
/// `initialize` runs here so schema/bucket problems surface at startup.
pub async fn create_storage_backend(config: BackendConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config {
        #[cfg(feature = "s3")]
        BackendConfig::ObjectStore(config) => Arc::new(ObjectStoreBackend::new(config)?),
        BackendConfig::InlineDocument { pool, options } => {
            Arc::new(InlineDocumentBackend::new(pool, options))
        }
        BackendConfig::RemoteBucket { config, options } => {
            Arc::new(RemoteBucketBackend::new(config, options)?)
        }
    };

    backend.initialize().await?;
    Ok(backend)
}

/// Assemble the priority-ordered fallback chain the orchestrator iterates:
/// object store first, then the inline document store, then the remote
/// bucket. A backend whose configuration is absent is left out; a backend
/// that fails startup initialization is kept (its upload-time failures are
/// exactly what the fallback policy exists for) but logged.
pub async fn create_backend_chain(config: &Config) -> Result<Vec<Arc<dyn StorageBackend>>> {
    let mut chain: Vec<Arc<dyn StorageBackend>> = Vec::new();
    let options = config.encode_options();

    if config.s3_enabled {
        #[cfg(feature = "s3")]
        match &config.s3_config {
            Some(s3_config) => match ObjectStoreBackend::new(s3_config.clone()) {
                Ok(backend) => {
                    let backend = Arc::new(backend);
                    if let Err(e) = backend.initialize().await {
                        warn!("object store not reachable at startup: {}", e);
                    }
                    chain.push(backend);
                }
                Err(e) => warn!("object store misconfigured, skipping: {}", e),
            },
            None => warn!("S3_ENABLED is set but no object store configuration was provided"),
        }
        #[cfg(not(feature = "s3"))]
        warn!("object store requested but the s3 feature is not compiled in");
    }

    if let Some(database_url) = &config.database_url {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                let backend = Arc::new(InlineDocumentBackend::new(pool, options));
                if let Err(e) = backend.initialize().await {
                    warn!("inline document store schema setup failed: {}", e);
                }
                chain.push(backend);
            }
            Err(e) => warn!("inline document store unavailable, skipping: {}", e),
        }
    }

    if let Some(bucket_config) = &config.remote_bucket {
        let backend = create_storage_backend(BackendConfig::RemoteBucket {
            config: bucket_config.clone(),
            options,
        })
        .await?;
        chain.push(backend);
    }

    if chain.is_empty() {
        warn!("no storage backends configured; uploads will fail");
    } else {
        let kinds: Vec<&str> = chain.iter().map(|b| b.kind().as_str()).collect();
        info!("storage fallback chain: {}", kinds.join(" -> "));
    }

    Ok(chain)
}
