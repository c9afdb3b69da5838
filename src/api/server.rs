//! HTTP server for status and assistant events

use axum::{
    routing::{get, post},
    Router,
};
use crossbeam_channel::Sender;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::api::handlers;
use crate::assistant::AssistantEvent;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::status::StatusBoard;

/// Shared handler state
pub struct AppState {
    pub status: StatusBoard,
    /// Present only when the assistant integration is enabled
    pub assistant_tx: Option<Sender<AssistantEvent>>,
}

/// Local API server
pub struct ApiServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(
        config: ApiConfig,
        status: StatusBoard,
        assistant_tx: Option<Sender<AssistantEvent>>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(AppState {
                status,
                assistant_tx,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/status", get(handlers::get_status))
            .route("/api/stations", get(handlers::get_stations))
            .route("/api/assistant/events", post(handlers::post_assistant_event))
            .with_state(self.state.clone())
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.http_port)
    }

    /// Serve until `shutdown` resolves
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = self.address();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("cannot bind API on {}: {}", addr, e)))?;

        tracing::info!("API listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
