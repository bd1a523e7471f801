//! # Vigil Server
//!
//! Thin binary that serves the health, metrics and admin API of the
//! resilience core.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration (config/vigil.toml when present)
//! cargo run --bin vigil-server
//!
//! # Run with a specific environment and JSON logs
//! VIGIL_ENV=production VIGIL_LOG_FORMAT=json cargo run --bin vigil-server
//! ```

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use vigil_core::config::ConfigManager;
use vigil_core::logging;
use vigil_core::ResilienceCore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!("🚀 Starting Vigil Server...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config_manager = ConfigManager::load().context("Failed to load configuration")?;
    let bind_address = config_manager.config().web.bind_address.clone();
    info!("   Environment: {}", config_manager.environment());

    let core = ResilienceCore::bootstrap(config_manager);
    let app = vigil_core::web::create_app(core.app_state());

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!("   Listening on {}", bind_address);

    // The listener is bound before monitoring starts so the self-probe can connect
    core.start().await;
    info!("🎉 Vigil Server started successfully!");
    info!("   Press Ctrl+C to shutdown gracefully");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("🛑 Shutdown signal received, stopping monitoring...");
    core.stop().await;

    if let Err(e) = served {
        error!("Web server terminated with error: {}", e);
        return Err(e).context("Web server failed");
    }

    info!("👋 Vigil Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
