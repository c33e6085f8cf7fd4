pub mod accounts;
pub mod alerts;
pub mod analytics;
pub mod api;
pub mod authorization;
pub mod config;
pub mod core_state;
pub mod db;
pub mod export;
pub mod models;
pub mod notification;
pub mod quiz;
pub mod recommendations;
pub mod reminders;
pub mod risk;
pub mod seed;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::CoreState;

/// Start the service and block until Ctrl-C.
pub async fn run() -> Result<(), String> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("NCD monitor starting v{}", config::APP_VERSION);

    let config = AppConfig::from_env().map_err(|e| e.to_string())?;
    tracing::info!(db = %config.db_path.display(), bind = %config.bind_addr, "Configuration loaded");
    let bind_addr = config.bind_addr;
    let seed = config.seed_demo;

    let core = Arc::new(CoreState::new(config).map_err(|e| format!("Startup failed: {e}"))?);

    if seed {
        let conn = core.open_db().map_err(|e| e.to_string())?;
        let summary = seed::seed_demo(&conn).map_err(|e| format!("Demo seed failed: {e}"))?;
        tracing::info!(
            patient = %summary.patient.id,
            provider = %summary.provider.id,
            worker = %summary.worker.id,
            "Demo data ready"
        );
    }

    let reminders = reminders::start_reminder_scheduler(Arc::clone(&core));
    let mut server = api::start_api_server(Arc::clone(&core), bind_addr).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }

    tracing::info!("Shutting down");
    server.shutdown();
    reminders.shutdown().await;
    Ok(())
}
