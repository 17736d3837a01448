mod catalog;
mod config;
mod gemini;
mod models;
mod prompt;
mod routes;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::routes::AppState;
use crate::storage::S3ArtifactStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    match &config.gemini_api_key {
        Some(key) => tracing::info!("Using Gemini key: {}...", config::key_preview(key)),
        None => tracing::warn!(
            "No Gemini API key configured; lookbook generation will return a configuration error"
        ),
    }

    let gemini = config
        .gemini_api_key
        .clone()
        .map(|key| Arc::new(GeminiClient::new(key, config.gemini_api_base.clone())));
    let store = Arc::new(S3ArtifactStore::new(&config.storage).await);
    let catalog = Arc::new(CatalogClient::new(&config.catalog));

    let state = AppState {
        gemini,
        store,
        catalog,
        response_mode: config.response_mode,
        storage_prefix: config.storage.prefix.clone(),
    };

    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
