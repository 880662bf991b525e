//! Producer ingestion over WebSocket
//!
//! One `IngestSession` owns the producer connection once the hub has
//! admitted it. Binary messages are frames; the text message `"ping"` is
//! answered with `"pong"`; ack and stats messages queued by the hub are
//! written back as JSON text.

use std::borrow::Cow;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message};
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::NetworkError;
use crate::protocol::{ProducerMessage, TextCommand, PONG};
use crate::relay::{FrameReceipt, ProducerSession};

/// Lifecycle of an admitted producer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// Admitted, no frame yet
    Accepted,
    /// At least one frame relayed
    Streaming,
    Ended,
}

/// Protocol handler for the single producer
pub struct IngestSession {
    session: ProducerSession,
    heartbeat: Duration,
    cancel: CancellationToken,
    state: IngestState,
    frames: u64,
    bytes: u64,
}

impl IngestSession {
    pub fn new(session: ProducerSession, heartbeat: Duration, cancel: CancellationToken) -> Self {
        Self {
            session,
            heartbeat,
            cancel,
            state: IngestState::Accepted,
            frames: 0,
            bytes: 0,
        }
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Drive the connection until the producer leaves, the transport
    /// fails, or shutdown is requested. Always releases the producer slot.
    pub async fn run<S>(mut self, socket: S)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Sink<Message, Error = axum::Error> + Unpin,
    {
        let id = self.session.id();
        let (mut tx, mut rx) = socket.split();

        let result = self.pump(&mut tx, &mut rx).await;

        self.state = IngestState::Ended;
        self.session.end();

        match result {
            Ok(()) => tracing::info!(
                session = %id,
                frames = self.frames,
                bytes = self.bytes,
                "Producer disconnected"
            ),
            Err(e) => tracing::warn!(
                session = %id,
                frames = self.frames,
                bytes = self.bytes,
                "Producer connection failed: {}",
                e
            ),
        }

        let bye = Message::Close(Some(CloseFrame {
            code: close_code::AWAY,
            reason: Cow::Borrowed("bye"),
        }));
        if let Err(e) = self.send(&mut tx, bye).await {
            tracing::debug!(session = %id, "Close handshake failed: {}", e);
        }
    }

    async fn pump<Tx, Rx>(&mut self, tx: &mut Tx, rx: &mut Rx) -> Result<(), NetworkError>
    where
        Tx: Sink<Message, Error = axum::Error> + Unpin,
        Rx: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let mut heartbeat = tokio::time::interval_at(Instant::now() + self.heartbeat, self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(session = %self.session.id(), "Ingest cancelled by shutdown");
                    return Ok(());
                }

                inbound = rx.next() => {
                    let msg = match inbound {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => return Err(NetworkError::ReceiveFailed(e.to_string())),
                        None => return self.flush_outbox(tx).await,
                    };
                    last_seen = Instant::now();

                    match msg {
                        Message::Binary(data) => self.handle_frame(data),
                        Message::Text(text) => match TextCommand::parse(&text) {
                            TextCommand::Ping => self.send(tx, Message::Text(PONG.to_string())).await?,
                            TextCommand::Unknown => {
                                tracing::debug!(session = %self.session.id(), len = text.len(), "Ignoring text message");
                            }
                        },
                        Message::Close(_) => return self.flush_outbox(tx).await,
                        Message::Ping(_) | Message::Pong(_) => {}
                    }
                }

                Some(outbound) = self.session.outbox().recv() => {
                    self.write_message(tx, outbound).await?;
                }

                _ = heartbeat.tick() => {
                    let silent = last_seen.elapsed();
                    if silent > self.heartbeat * 2 {
                        return Err(NetworkError::HeartbeatTimeout(silent));
                    }
                    self.send(tx, Message::Ping(Vec::new())).await?;
                }
            }
        }
    }

    /// Write out ack and stats messages the hub has already queued.
    ///
    /// Runs when the producer leaves so an ack for its last frames is not
    /// lost behind the close.
    async fn flush_outbox<Tx>(&mut self, tx: &mut Tx) -> Result<(), NetworkError>
    where
        Tx: Sink<Message, Error = axum::Error> + Unpin,
    {
        while let Ok(outbound) = self.session.outbox().try_recv() {
            self.write_message(tx, outbound).await?;
        }
        Ok(())
    }

    async fn write_message<Tx>(&self, tx: &mut Tx, outbound: ProducerMessage) -> Result<(), NetworkError>
    where
        Tx: Sink<Message, Error = axum::Error> + Unpin,
    {
        let text = outbound
            .to_json()
            .map_err(|e| NetworkError::InvalidMessage(e.to_string()))?;
        self.send(tx, Message::Text(text)).await
    }

    /// A producer that stops reading must not pin the loop in `send`.
    async fn send<Tx>(&self, tx: &mut Tx, msg: Message) -> Result<(), NetworkError>
    where
        Tx: Sink<Message, Error = axum::Error> + Unpin,
    {
        match tokio::time::timeout(self.heartbeat, tx.send(msg)).await {
            Ok(result) => result.map_err(|e| NetworkError::SendFailed(e.to_string())),
            Err(_) => Err(NetworkError::SendTimeout(self.heartbeat)),
        }
    }

    fn handle_frame(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        let len = data.len() as u64;

        match self.session.relay(Bytes::from(data)) {
            FrameReceipt::First { listeners } => {
                self.state = IngestState::Streaming;
                tracing::info!(session = %self.session.id(), listeners, "Streaming started");
            }
            FrameReceipt::Relayed { .. } => {}
            FrameReceipt::NotCurrent => {
                tracing::warn!(session = %self.session.id(), "Frame from a session that no longer owns the hub");
                return;
            }
        }

        self.frames += 1;
        self.bytes += len;
    }
}
