use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tokio::net::TcpListener;
use tokio::signal;

use qahub::config::Settings;
use qahub::listeners::{spawn_listener, NotifierListener, RunsViewListener};
use qahub::postgres::{close_pool, create_pool};
use qahub::server::{create_app, AppState};
use qahub::tasks::RetentionTask;
use qahub::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (with optional OpenTelemetry export)
    let _telemetry_guard = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Connect to PostgreSQL
    let pool = create_pool(&settings.database).await?;

    // Create application state
    let state = AppState::new(settings.clone(), pool.clone());
    tracing::info!("Application state initialized");

    // Shutdown signal shared by listeners and background tasks
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Start domain event listeners
    let runs_view_handle = spawn_listener(
        &state.event_bus,
        Arc::new(RunsViewListener::new(state.runs_view.clone())),
        shutdown_tx.subscribe(),
    );
    let notifier_handle = spawn_listener(
        &state.event_bus,
        Arc::new(NotifierListener::new(
            state.notifications.clone(),
            state.comments.clone(),
        )),
        shutdown_tx.subscribe(),
    );

    // Start retention sweep in background
    let retention_task = RetentionTask::new(
        settings.retention.clone(),
        state.retention.clone(),
        state.notifications.clone(),
        shutdown_tx.subscribe(),
    );
    let retention_handle = tokio::spawn(async move {
        retention_task.run().await;
    });

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = join_all([runs_view_handle, notifier_handle, retention_handle]).await;

    close_pool(&pool).await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
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

    // Stop listeners and background tasks
    let _ = shutdown_tx.send(());
}
