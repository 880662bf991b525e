//! Relay hub
//!
//! The hub is the only shared mutable state in the relay: the registry of
//! listener queues, the single producer slot and the byte counter. All
//! mutations happen under one lock; fan-out copies the registry under the
//! lock and pushes after releasing it, so a slow queue never holds up
//! registration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::queue::{FrameQueue, ListenerId};
use crate::config::RelayConfig;
use crate::error::HubError;
use crate::protocol::{ProducerMessage, StatsSnapshot};

/// Identity of an admitted producer session
pub type SessionId = Uuid;

/// Outbound control messages for the producer, drained by its session
pub type ProducerOutbox = mpsc::UnboundedReceiver<ProducerMessage>;

struct ActiveProducer {
    id: SessionId,
    outbox: mpsc::UnboundedSender<ProducerMessage>,
}

/// Set on the first frame of a session; its presence is the `active` flag
struct StreamStart {
    instant: Instant,
    wall: DateTime<Utc>,
}

struct HubState {
    listeners: HashMap<ListenerId, Arc<FrameQueue>>,
    producer: Option<ActiveProducer>,
    started: Option<StreamStart>,
    /// Never reset, survives producer reconnects
    bytes_total: u64,
}

impl HubState {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            active: self.started.is_some(),
            listeners: self.listeners.len(),
            bytes_total: self.bytes_total,
            started_at: self.started.as_ref().map(|s| s.wall),
            uptime_sec: self
                .started
                .as_ref()
                .map(|s| s.instant.elapsed().as_secs_f64())
                .unwrap_or(0.0),
        }
    }
}

/// Outcome of handing a frame to the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameReceipt {
    /// First frame of the session; the acknowledgement has been queued
    First { listeners: usize },
    /// Subsequent frame, fanned out to `listeners` queues
    Relayed { listeners: usize },
    /// The caller is not the current producer; nothing was recorded
    NotCurrent,
}

/// Process-wide relay registry
pub struct Hub {
    state: RwLock<HubState>,
    queue_capacity: usize,
    ack_message: String,
}

impl Hub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(&RelayConfig::default())
    }

    pub fn with_config(config: &RelayConfig) -> Self {
        Self {
            state: RwLock::new(HubState {
                listeners: HashMap::new(),
                producer: None,
                started: None,
                bytes_total: 0,
            }),
            queue_capacity: config.queue_capacity.max(1),
            ack_message: config.ack_message.clone(),
        }
    }

    /// Admit a producer if no other producer session is open.
    ///
    /// The returned session ends itself when dropped, so a connection that
    /// fails between admission and streaming cannot leave the slot taken.
    pub fn try_begin_producer_session(self: &Arc<Self>) -> Result<ProducerSession, HubError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        {
            let mut state = self.state.write();
            if let Some(current) = &state.producer {
                tracing::warn!(current = %current.id, "Rejecting producer, one is already streaming");
                return Err(HubError::AlreadyStreaming);
            }
            state.producer = Some(ActiveProducer { id, outbox: tx });
            state.started = None;
        }

        tracing::info!(session = %id, "Producer session admitted");

        Ok(ProducerSession {
            id,
            hub: Arc::clone(self),
            outbox: rx,
        })
    }

    /// Release the producer slot if `id` still holds it.
    ///
    /// Returns true when this call ended the session. Listener
    /// registrations and the byte counter are left untouched.
    pub fn end_producer_session(&self, id: SessionId) -> bool {
        let mut state = self.state.write();
        if state.producer.as_ref().map(|current| current.id) != Some(id) {
            return false;
        }

        state.producer = None;
        state.started = None;
        tracing::info!(
            session = %id,
            listeners = state.listeners.len(),
            bytes_total = state.bytes_total,
            "Producer session ended"
        );
        true
    }

    /// Record a frame from producer `id` and fan it out to every listener.
    ///
    /// On the first frame of a session the stream becomes active and the
    /// acknowledgement is queued to the producer under the same lock, so
    /// no stats push can overtake it.
    pub fn on_frame_received(&self, id: SessionId, frame: Bytes) -> FrameReceipt {
        let (receipt, targets) = {
            let mut state = self.state.write();
            if state.producer.as_ref().map(|current| current.id) != Some(id) {
                return FrameReceipt::NotCurrent;
            }

            state.bytes_total += frame.len() as u64;
            let listeners = state.listeners.len();

            let receipt = if state.started.is_none() {
                state.started = Some(StreamStart {
                    instant: Instant::now(),
                    wall: Utc::now(),
                });
                if let Some(current) = &state.producer {
                    // A closed outbox means the session is tearing down.
                    let _ = current
                        .outbox
                        .send(ProducerMessage::ack(listeners, self.ack_message.as_str()));
                }
                FrameReceipt::First { listeners }
            } else {
                FrameReceipt::Relayed { listeners }
            };

            let targets: Vec<Arc<FrameQueue>> = state.listeners.values().cloned().collect();
            (receipt, targets)
        };

        for queue in &targets {
            queue.push(frame.clone());
        }

        receipt
    }

    /// Register a new listener queue
    pub fn add_listener(&self) -> Arc<FrameQueue> {
        let queue = Arc::new(FrameQueue::new(self.queue_capacity));
        let listeners = {
            let mut state = self.state.write();
            state.listeners.insert(queue.id(), Arc::clone(&queue));
            state.listeners.len()
        };

        tracing::info!(listener = %queue.id(), listeners, "Listener added");
        queue
    }

    /// Deregister and close a listener queue. Idempotent.
    pub fn remove_listener(&self, queue: &FrameQueue) -> bool {
        let (removed, listeners) = {
            let mut state = self.state.write();
            let removed = state.listeners.remove(&queue.id()).is_some();
            (removed, state.listeners.len())
        };
        queue.close();

        if removed {
            tracing::info!(
                listener = %queue.id(),
                listeners,
                dropped = queue.dropped(),
                "Listener removed"
            );
        }
        removed
    }

    /// Close every registered queue, ending all delivery streams
    pub fn close_all(&self) {
        let queues: Vec<Arc<FrameQueue>> = self.state.read().listeners.values().cloned().collect();
        for queue in &queues {
            queue.close();
        }
        tracing::debug!(count = queues.len(), "Closed all listener queues");
    }

    /// Queue a stats message to the current producer, if any.
    ///
    /// Returns false when no producer is connected or its session is
    /// already gone.
    pub fn push_stats(&self) -> bool {
        let state = self.state.read();
        match &state.producer {
            Some(current) => current.outbox.send(state.snapshot().to_message()).is_ok(),
            None => false,
        }
    }

    /// Compute current statistics without mutating state
    pub fn snapshot(&self) -> StatsSnapshot {
        self.state.read().snapshot()
    }

    pub fn listener_count(&self) -> usize {
        self.state.read().listeners.len()
    }

    pub fn has_producer(&self) -> bool {
        self.state.read().producer.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.state.read().started.is_some()
    }

    pub fn bytes_total(&self) -> u64 {
        self.state.read().bytes_total
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// Admission token for the single producer
///
/// Holds the producer slot until `end` is called or the token is dropped.
pub struct ProducerSession {
    id: SessionId,
    hub: Arc<Hub>,
    outbox: ProducerOutbox,
}

impl ProducerSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Ack and stats messages queued by the hub for this producer
    pub fn outbox(&mut self) -> &mut ProducerOutbox {
        &mut self.outbox
    }

    /// Forward a frame to the hub on behalf of this session
    pub fn relay(&self, frame: Bytes) -> FrameReceipt {
        self.hub.on_frame_received(self.id, frame)
    }

    pub fn end(&self) -> bool {
        self.hub.end_producer_session(self.id)
    }
}

impl Drop for ProducerSession {
    fn drop(&mut self) {
        self.hub.end_producer_session(self.id);
    }
}

impl std::fmt::Debug for ProducerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerSession").field("id", &self.id).finish()
    }
}
