//! Wire messages exchanged with the producer and the status endpoint
//!
//! Inbound from the producer:
//!   binary message   → one opaque audio frame
//!   text `"ping"`    → answered with text `"pong"`
//!
//! Outbound to the producer (JSON text messages):
//!   `{"type":"ack","status":"streaming_started","listeners":N,"message":"..."}`
//!   `{"type":"stats","listeners":N,"bytes_total":N,"active":B,"uptime_sec":F}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application-level liveness probe sent by the producer
pub const PING: &str = "ping";

/// Reply to [`PING`]
pub const PONG: &str = "pong";

/// Status carried by the one-time acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    StreamingStarted,
}

/// Control message pushed to the producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProducerMessage {
    /// Sent once per session, right after the first frame is recorded
    Ack {
        status: AckStatus,
        listeners: usize,
        message: String,
    },
    /// Periodic telemetry
    Stats {
        listeners: usize,
        bytes_total: u64,
        active: bool,
        uptime_sec: f64,
    },
}

impl ProducerMessage {
    pub fn ack(listeners: usize, message: impl Into<String>) -> Self {
        Self::Ack {
            status: AckStatus::StreamingStarted,
            listeners,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Read-only projection of hub state, computed on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub active: bool,
    pub listeners: usize,
    pub bytes_total: u64,
    /// Wall-clock time of the first frame of the current session
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_sec: f64,
}

impl StatsSnapshot {
    /// Stats message for the producer
    pub fn to_message(&self) -> ProducerMessage {
        ProducerMessage::Stats {
            listeners: self.listeners,
            bytes_total: self.bytes_total,
            active: self.active,
            uptime_sec: self.uptime_sec,
        }
    }
}

/// Classification of an inbound text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommand {
    Ping,
    Unknown,
}

impl TextCommand {
    pub fn parse(text: &str) -> Self {
        if text == PING {
            TextCommand::Ping
        } else {
            TextCommand::Unknown
        }
    }
}
