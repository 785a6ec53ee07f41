use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use channel_relay::config::Settings;
use channel_relay::server::{create_app, AppState};
use channel_relay::tasks::LivenessSweeper;
use channel_relay::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    init_tracing(&settings.logging);
    tracing::info!(
        sweep_interval_secs = settings.relay.sweep_interval_secs,
        buffer_idle_timeout_secs = settings.relay.buffer_idle_timeout_secs,
        max_buffer_size = settings.relay.max_buffer_size,
        "Configuration loaded"
    );

    // Create application state
    let state = AppState::new(settings.clone());
    tracing::info!("Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start liveness sweeper in background
    let sweeper_handle = LivenessSweeper::new(
        settings.relay.clone(),
        state.relay.registry().clone(),
        state.relay.buffers().clone(),
        shutdown_tx.subscribe(),
    )
    .spawn();

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx.clone()))
        .await?;

    // Stop the sweeper even if the server exited on its own
    let _ = shutdown_tx.send(());

    tracing::info!("Waiting for background tasks to finish...");
    if let Err(e) = sweeper_handle.await {
        tracing::error!(error = %e, "Liveness sweeper terminated abnormally");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    let _ = shutdown_tx.send(());
}
