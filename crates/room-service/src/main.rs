//! Watch Party room service
//!
//! Serves the HTTP API, the WebSocket endpoint and the static client from a
//! single listener (default: 0.0.0.0:3000).
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Spawn the registry actor and shared state
//! 4. Spawn the room sweeper
//! 5. Bind, mark ready, serve until SIGINT/SIGTERM
//!
//! # Shutdown
//!
//! Readiness drops first, then open sockets are closed, then the registry
//! cancels every room and waits for them to stop.

#![warn(clippy::pedantic)]

use room_service::config::Config;
use room_service::observability::init_metrics_recorder;
use room_service::routes::{self, AppState};
use room_service::tasks::{start_room_sweeper, RoomSweeperConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting room service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        static_dir = %config.static_dir,
        sweep_interval_seconds = config.sweep_interval_seconds,
        max_room_age_seconds = config.max_room_age_seconds,
        max_rooms = config.max_rooms,
        "Configuration loaded successfully"
    );

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState::new(config));

    let sweeper = tokio::spawn(start_room_sweeper(
        state.registry.clone(),
        RoomSweeperConfig::from_config(&state.config),
        state.registry.child_token(),
    ));

    let app = routes::build_routes(Arc::clone(&state), Some(prometheus_handle));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    state.health.set_ready();
    info!("Room service listening on {}", addr);

    let shutdown_state = Arc::clone(&state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        shutdown_state.health.set_not_ready();
        shutdown_state.shutdown.cancel();
    })
    .await?;

    info!("HTTP server stopped, draining rooms");

    if let Err(e) = state.registry.shutdown().await {
        warn!(error = %e, "Registry shutdown request failed");
    }

    match tokio::time::timeout(Duration::from_secs(5), sweeper).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Sweeper task failed"),
        Err(_) => warn!("Sweeper task did not stop in time"),
    }

    info!("Room service shutdown complete");

    Ok(())
}

/// Returns when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
