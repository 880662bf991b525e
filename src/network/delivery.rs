//! Listener delivery over a long-lived HTTP response
//!
//! A `DeliverySession` registers a queue with the hub when it is opened
//! and deregisters it when dropped. The HTTP body owns the session, so a
//! listener that disconnects (or a server that stops polling the body)
//! releases its queue on every exit path.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::Stream;

use crate::config::StreamConfig;
use crate::relay::{FrameQueue, Hub};

/// Cache directives for live, non-seekable responses
pub const NO_CACHE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// One connected listener
pub struct DeliverySession {
    hub: Arc<Hub>,
    queue: Arc<FrameQueue>,
    frames: u64,
    bytes: u64,
}

impl DeliverySession {
    /// Register a new listener with the hub
    pub fn open(hub: Arc<Hub>) -> Self {
        let queue = hub.add_listener();
        Self {
            hub,
            queue,
            frames: 0,
            bytes: 0,
        }
    }

    /// Wait for the next frame; `None` once the queue has been closed
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        let frame = self.queue.pop().await?;
        self.frames += 1;
        self.bytes += frame.len() as u64;
        Some(frame)
    }

    /// Frames in delivery order, ending when the queue closes
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures_util::stream::unfold(self, |mut session| async move {
            let frame = session.next_frame().await?;
            Some((Ok::<_, Infallible>(frame), session))
        })
    }

    /// Build the unbounded `200 OK` audio response for this listener
    pub fn into_response(self, config: &StreamConfig) -> Response {
        let content_type = HeaderValue::from_str(&config.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("audio/mpeg"));

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, NO_CACHE)
            .header(header::PRAGMA, "no-cache")
            .header(header::ACCEPT_RANGES, "none")
            .header(header::CONNECTION, "keep-alive");

        for (name, value) in [
            ("icy-name", &config.station_name),
            ("icy-genre", &config.station_genre),
        ] {
            match HeaderValue::from_str(value) {
                Ok(value) => builder = builder.header(name, value),
                Err(_) => tracing::debug!(header = name, "Skipping header with invalid value"),
            }
        }

        let body = Body::from_stream(self.into_stream());
        builder
            .body(body)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

impl Drop for DeliverySession {
    fn drop(&mut self) {
        self.hub.remove_listener(&self.queue);
        tracing::debug!(
            listener = %self.queue.id(),
            frames = self.frames,
            bytes = self.bytes,
            "Delivery session closed"
        );
    }
}
