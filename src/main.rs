use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use db_mirror::api::{create_router, handlers::AppState};
use db_mirror::config::Config;
use db_mirror::models::MirrorRequest;
use db_mirror::services::remote::mask_credentials;
use db_mirror::services::MirrorService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    let descriptor = config
        .remote_descriptor()
        .context("Invalid remote connection settings")?;
    info!("Remote source: {}", mask_credentials(&descriptor));

    // Local store opens here; failure is fatal
    let mut service = MirrorService::new(descriptor).context("Failed to initialize local store")?;

    // The remote may come up later; POST /api/remote/connect retries
    match service.open_remote().await {
        Ok(()) => {
            if config.mirror.on_startup {
                let request = MirrorRequest::new(
                    config.mirror.default_row_limit,
                    config.mirror.tables.clone(),
                );
                match service.mirror(request).await {
                    Ok(report) => info!(
                        "Startup mirror finished: {} tables, {} rows",
                        report.mirrored_count(),
                        report.total_rows()
                    ),
                    Err(e) => error!("Startup mirror failed: {}", e),
                }
            }
        }
        Err(e) => warn!("Remote connection not available at startup: {}", e),
    }

    let state = AppState::new(service, config.clone());
    let service = state.service.clone();
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = config
        .server_address()
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server_address()))?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_connections(service).await;
    info!("Server stopped");
    Ok(())
}

async fn close_connections(service: Arc<Mutex<MirrorService>>) {
    service.lock().await.close().await;
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
