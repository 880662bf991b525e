//! Relay core: listener queues and the hub that fans frames out to them

pub mod hub;
pub mod queue;

pub use hub::{FrameReceipt, Hub, ProducerOutbox, ProducerSession, SessionId};
pub use queue::{FrameQueue, ListenerId};
