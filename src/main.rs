use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chairsnap::config::Config;
use chairsnap::routes::api_router;
use chairsnap::services::PhotoUploader;
use chairsnap::storage::factory::create_backend_chain;
use chairsnap::AppState;

/// Upper bound for a whole multipart batch body.
const MAX_UPLOAD_BODY_BYTES: usize = 64 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let backends = create_backend_chain(&config).await?;
    let uploader = Arc::new(PhotoUploader::new(backends, config.max_photos_per_set));

    let server_address = config.server_address.clone();
    let state = Arc::new(AppState { config, uploader });

    let app = api_router()
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    info!("chairsnap listening on {}", server_address);
    axum::serve(listener, app).await?;

    Ok(())
}
