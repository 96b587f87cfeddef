//! # Admit Server
//!
//! Entry point: loads configuration, builds the cache and realtime router,
//! and serves HTTP and WebSocket traffic until a shutdown signal arrives.

use admit_config::{AppConfig, ConfigLoader};
use admit_core::telemetry::{init_logging, LogFormat};
use admit_core::{AdmitError, AdmitResult};
use admit_realtime::RoomRouter;
use admit_server::{create_router, metrics::init_metrics, startup::build_context};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ConfigLoader::from_default_location() {
        Ok(loader) => loader.into_config(),
        Err(e) => {
            let _ = init_logging("info", LogFormat::Pretty);
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let format = LogFormat::parse(&config.observability.log_format);
    if let Err(e) = init_logging(&config.observability.log_level, format) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting Admit server...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.environment);

    if let Err(e) = run(config).await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> AdmitResult<()> {
    if config.observability.metrics_enabled && !init_metrics() {
        warn!("Continuing without metrics");
    }

    let addr = config.server.addr();
    let ctx = build_context(config).await?;
    let router = ctx.router().clone();
    let app = create_router(ctx);

    info!("Starting HTTP server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AdmitError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(router))
        .await
        .map_err(|e| AdmitError::internal(format!("HTTP server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal(router: RoomRouter) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }

    router.shutdown();
}
