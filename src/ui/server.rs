//! HTTP server wiring

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::{NetworkError, Result};
use crate::relay::Hub;
use crate::ui::handlers;

/// State shared by all handlers
pub struct AppState {
    pub hub: Arc<Hub>,
    pub config: AppConfig,
    /// Parent token for every producer session
    pub shutdown: CancellationToken,
}

/// Relay HTTP server
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: AppConfig, hub: Arc<Hub>, shutdown: CancellationToken) -> Self {
        Self {
            state: Arc::new(AppState {
                hub,
                config,
                shutdown,
            }),
        }
    }

    /// Routes:
    /// - `GET /`           player page
    /// - `GET /stats`      hub statistics as JSON
    /// - `GET /listen.mp3` live audio stream
    /// - `GET /uplink`     producer WebSocket
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handlers::index))
            .route("/stats", get(handlers::get_stats))
            .route("/listen.mp3", get(handlers::listen))
            .route("/uplink", get(handlers::uplink))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let server = &self.state.config.server;
        let addr = format!("{}:{}", server.bind_address, server.http_port);
        TcpListener::bind(&addr)
            .await
            .map_err(|e| NetworkError::BindFailed(format!("{}: {}", addr, e)).into())
    }

    /// Serve on `listener` until the shutdown token fires.
    ///
    /// On shutdown every listener queue is closed so open audio responses
    /// complete and the server can drain.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        if let Some(addr) = local {
            tracing::info!("Relay listening on http://{}", addr);
        }

        let router = self.router();
        let hub = Arc::clone(&self.state.hub);
        let shutdown = self.state.shutdown.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                hub.close_all();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Bind and serve
    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }
}
