//! Transport-facing protocol handlers

pub mod delivery;
pub mod ingest;
pub mod reporter;

pub use delivery::DeliverySession;
pub use ingest::{IngestSession, IngestState};
pub use reporter::StatusReporter;
