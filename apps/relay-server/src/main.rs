//! # Relay Server
//!
//! Serves the ERP buffer to the downstream consumer over HTTP.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Relay Server                                     │
//! │                                                                         │
//! │  Consumer ───► HTTP (8080) /sync ───► SyncService ───► SQLite buffer    │
//! │                                           │                             │
//! │                                           ▼                             │
//! │                                   ERP refresh source                    │
//! │                                   (script / command)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use relay_db::Database;
use relay_server::{router, AppState, RefreshSource, RelayConfig};
use relay_sync::{
    BufferRefresher, CommandRefresher, SqlScriptRefresher, SyncService, UnconfiguredRefresher,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting ERP buffer relay...");

    // Load configuration
    let config = RelayConfig::load().context("invalid configuration")?;
    info!(
        addr = %config.socket_addr(),
        database = %config.database_path,
        layout = %config.invoice_layout,
        "Configuration loaded"
    );

    // Open the buffer (runs migrations)
    let db = Database::new(config.db_config())
        .await
        .context("failed to open buffer database")?;
    info!("Buffer database ready");

    let refresher = build_refresher(&config, &db)?;
    info!(source = %refresher.describe(), "Refresh source configured");

    let service = SyncService::new(Arc::new(db.clone()), refresher)
        .with_refresh_timeout(config.refresh_timeout);
    let app = router(AppState::new(service, config.expose_error_details));

    let listener = TcpListener::bind(config.socket_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.socket_addr()))?;
    info!(addr = %config.socket_addr(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn build_refresher(config: &RelayConfig, db: &Database) -> anyhow::Result<Arc<dyn BufferRefresher>> {
    let refresher: Arc<dyn BufferRefresher> = match &config.refresh {
        RefreshSource::Script(path) => {
            let script = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read refresh script {}", path.display()))?;
            Arc::new(SqlScriptRefresher::new(db.clone(), script))
        }
        RefreshSource::Command { program, args } => {
            Arc::new(CommandRefresher::new(program.clone(), args.clone()))
        }
        RefreshSource::None => {
            warn!("No refresh source configured; POST /sync/refresh-from-sage will fail");
            Arc::new(UnconfiguredRefresher)
        }
    };
    Ok(refresher)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
