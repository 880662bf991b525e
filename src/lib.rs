//! # Audio Relay
//!
//! Relays one live audio bitstream from a single producer to any number of
//! listeners, favouring freshness over completeness when a listener falls
//! behind.
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌──────────────┐  WS /uplink (binary frames, "ping")
//!  │   Producer   │ ─────────────────────────────────┐
//!  └──────▲───────┘                                  │
//!         │ ack / stats (JSON)                       ▼
//!         │                          ┌───────────────────────────────┐
//!         │                          │ IngestSession (network::ingest)│
//!         │                          └───────────────┬───────────────┘
//!         │                                          │ on_frame_received
//!  ┌──────┴────────────────┐                         ▼
//!  │ StatusReporter        │  push_stats  ┌────────────────────────────┐
//!  │ (network::reporter)   │ ───────────▶ │        Hub (relay::hub)    │
//!  └───────────────────────┘              │  producer slot, counters,  │
//!                                         │  listener registry         │
//!                                         └──┬──────────┬──────────┬───┘
//!                                            │ push     │ push     │ push
//!                                            ▼          ▼          ▼
//!                                       ┌─────────┐┌─────────┐┌─────────┐
//!                                       │FrameQ 0 ││FrameQ 1 ││FrameQ N │  drop-oldest
//!                                       └────┬────┘└────┬────┘└────┬────┘
//!                                            ▼          ▼          ▼
//!                                       DeliverySession (network::delivery)
//!                                            │          │          │
//!                                            ▼          ▼          ▼
//!                                        GET /listen.mp3 (audio/mpeg)
//! ```

pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod relay;
pub mod ui;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default number of frames buffered per listener
    pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8000;

    /// Default interval between stats pushes to the producer
    pub const DEFAULT_STATS_INTERVAL_MS: u64 = 1500;

    /// Default WebSocket ping interval towards the producer
    pub const DEFAULT_HEARTBEAT_SECS: u64 = 10;
}
