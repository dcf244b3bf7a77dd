pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::CoreState;

/// Start the service and serve until Ctrl-C.
pub async fn run() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env();

    // Provider clients are blocking; build them and migrate off the runtime.
    let startup = config.clone();
    let collaborators = tokio::task::spawn_blocking(move || {
        db::open_database(&startup.db_path).map_err(std::io::Error::other)?;
        startup
            .build_collaborators()
            .map_err(std::io::Error::other)
    })
    .await
    .map_err(std::io::Error::other)??;

    let core = Arc::new(CoreState::new(
        config.db_path.clone(),
        collaborators,
        config.pipeline_budget,
    ));

    let server = api::start_api_server(core, config.bind_addr, &config.cors_origin).await?;
    tracing::info!(addr = %server.addr, "Visit triage service listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    tracing::info!("Shutting down");
    server.shutdown().await;
    Ok(())
}
