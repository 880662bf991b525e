//! HTTP and WebSocket handlers

use axum::{
    extract::{State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::HubError;
use crate::network::delivery::NO_CACHE;
use crate::network::{DeliverySession, IngestSession};
use crate::ui::server::AppState;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Built-in player page
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Current hub statistics
pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ([(header::CACHE_CONTROL, NO_CACHE)], Json(state.hub.snapshot()))
}

/// Live audio stream for one listener
pub async fn listen(State(state): State<Arc<AppState>>) -> Response {
    DeliverySession::open(Arc::clone(&state.hub)).into_response(&state.config.stream)
}

/// Producer uplink.
///
/// Admission is decided before the upgrade: a second producer gets
/// `423 Locked` and never reaches the WebSocket stage.
pub async fn uplink(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    match state.hub.try_begin_producer_session() {
        Ok(session) => {
            let heartbeat = state.config.relay.heartbeat();
            let cancel = state.shutdown.child_token();
            ws.on_failed_upgrade(|e| tracing::warn!("Producer upgrade failed: {}", e))
                .on_upgrade(move |socket| IngestSession::new(session, heartbeat, cancel).run(socket))
        }
        Err(HubError::AlreadyStreaming) => {
            (StatusCode::LOCKED, "Streamer already connected").into_response()
        }
    }
}
