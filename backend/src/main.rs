mod api;
mod config;
mod db;
mod errors;
mod ledger;
mod models;
mod prover;
mod state;
mod withdraw;

use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env().inspect_err(|e| tracing::error!(error = %e, "invalid configuration"))?;
    if config.api_key == config::DEV_API_KEY {
        tracing::warn!("API_KEY not set, using the development key");
    }

    // Local state lives under DATA_DIR (ignored by git).
    std::fs::create_dir_all(&config.data_dir).map_err(|e| {
        tracing::error!(dir = %config.data_dir.display(), error = %e, "cannot create data dir");
        ApiError::Internal
    })?;

    let db = db::connect(&config.db_url(), 5).await?;
    db::init_schema(&db).await?;

    let addr = config.addr.clone();
    tracing::info!(
        tree_depth = config.tree_depth,
        max_withdraw = config.max_withdraw,
        snarkjs = %config.prover.snarkjs_bin.display(),
        "configuration loaded"
    );

    let state = AppState::new(db, config);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|_| ApiError::Internal)?;

    tracing::info!(%addr, "backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|_| ApiError::Internal)?;

    tracing::info!("backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
