//! Error types for the audio relay

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Relay hub errors
///
/// Admission is the only hub operation that can be refused; everything
/// else on the hub is total.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("A producer is already streaming")]
    AlreadyStreaming,
}

/// Transport errors, always contained within the session that hit them
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Send stalled for {0:?}")]
    SendTimeout(std::time::Duration),

    #[error("Heartbeat timed out after {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
