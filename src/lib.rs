pub mod api; // HTTP surface
pub mod catalog; // Catalog maintenance + material merge
pub mod config;
pub mod core_state;
pub mod costing; // Procedure utility
pub mod db;
pub mod models;
pub mod quote; // Lab exam quotes
pub mod report; // Aggregation + CSV
pub mod search; // Debounced latest-wins search

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Initialize logging, open the database and serve the API until Ctrl-C.
pub async fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = config::AppConfig::from_env();
    let core = core_state::CoreState::new(&app_config)
        .map_err(|e| format!("Failed to initialize state: {e}"))?;

    api::serve(Arc::new(core), app_config.bind, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
