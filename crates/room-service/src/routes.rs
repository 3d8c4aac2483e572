//! HTTP routes and application state.

use crate::actors::{ActorMetrics, RegistryActorHandle, RegistrySettings};
use crate::config::Config;
use crate::handlers;
use crate::observability::{health_router, HealthState};
use crate::router::BroadcastRouter;
use crate::ws;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryActorHandle,
    pub router: Arc<BroadcastRouter>,
    pub metrics: Arc<ActorMetrics>,
    pub health: Arc<HealthState>,
    pub config: Config,
    /// Cancelled on shutdown; every socket holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Spawn the registry and wire up shared state. Not yet ready.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let router = Arc::new(BroadcastRouter::new());
        let metrics = ActorMetrics::new();
        let registry = RegistryActorHandle::new(
            RegistrySettings {
                max_rooms: config.max_rooms,
                room_limits: config.room_limits,
            },
            Arc::clone(&router),
            Arc::clone(&metrics),
        );

        Self {
            registry,
            router,
            metrics,
            health: Arc::new(HealthState::new()),
            config,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the application routes.
///
/// - `POST /api/create-room`, `GET /api/room/:room_id`, `GET /api/stats`
/// - `GET /ws` - WebSocket endpoint
/// - `/health`, `/ready` - health checks
/// - `/metrics` - Prometheus scrape, when a recorder is installed
/// - everything else falls through to the static client assets
pub fn build_routes(state: Arc<AppState>, prometheus: Option<PrometheusHandle>) -> Router {
    let static_assets = ServeDir::new(&state.config.static_dir);
    let health = health_router(Arc::clone(&state.health));

    let api_routes = Router::new()
        .route("/api/create-room", post(handlers::create_room))
        .route("/api/room/:room_id", get(handlers::get_room))
        .route("/api/stats", get(handlers::get_stats))
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    let mut app = api_routes
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .merge(health);

    if let Some(handle) = prometheus {
        app = app.merge(
            Router::new()
                .route("/metrics", get(handlers::metrics_handler))
                .with_state(handle),
        );
    }

    app.fallback_service(static_assets)
        .layer(TraceLayer::new_for_http())
}
