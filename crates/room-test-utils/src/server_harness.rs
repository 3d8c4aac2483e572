//! Test server harness for end-to-end tests.
//!
//! Provides `TestRoomServer` for spawning a real room service on a random
//! local port.

use room_service::config::Config;
use room_service::routes::{self, AppState};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A room service bound to `127.0.0.1:<random port>`.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_create_room() -> anyhow::Result<()> {
///     let server = TestRoomServer::spawn().await?;
///     let room_id = server.create_room().await?;
///     assert_eq!(room_id.len(), 8);
///     Ok(())
/// }
/// ```
pub struct TestRoomServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    http: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestRoomServer {
    /// Spawn with default configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(&[]).await
    }

    /// Spawn with extra `ROOM_*` variables layered over the defaults.
    pub async fn spawn_with_vars(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([(
            "ROOM_BIND_ADDRESS".to_string(),
            "127.0.0.1:0".to_string(),
        )]);
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::new(config));
        let app = routes::build_routes(Arc::clone(&state), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        state.health.set_ready();

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            http: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Base URL, e.g. `http://127.0.0.1:40123`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket endpoint URL.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state of the running service.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// `POST /api/create-room` and return the new room id.
    pub async fn create_room(&self) -> Result<String, anyhow::Error> {
        let body: Value = self
            .http
            .post(format!("{}/api/create-room", self.url()))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        body.get("roomId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("create-room response missing roomId: {body}"))
    }

    /// `GET` a JSON endpoint, returning status and body.
    pub async fn get_json(&self, path: &str) -> Result<(u16, Value), anyhow::Error> {
        let response = self.http.get(format!("{}{}", self.url(), path)).send().await?;
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        Ok((status, body))
    }
}

impl Drop for TestRoomServer {
    fn drop(&mut self) {
        self.state.shutdown.cancel();
        self.state.registry.cancel();
        self._handle.abort();
    }
}
