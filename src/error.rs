//! Error types for the Rocket Race client.

use thiserror::Error;

/// Everything that can go wrong while driving a race session.
///
/// Protocol-level oddities — a roster broadcast missing the local player, a
/// cancelled power-up drop, a re-delivered broadcast — are deliberately *not*
/// errors; they are handled by branching on state inside the session store.
#[derive(Debug, Error)]
pub enum RaceClientError {
    /// A message could not be written to the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// The transport failed while reading a message.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection closed underneath an operation.
    #[error("transport connection closed")]
    TransportClosed,

    /// A protocol message failed to serialize or deserialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation needs an active connection and there is none.
    #[error("not connected to server")]
    NotConnected,

    /// A deadline elapsed, e.g. during connection setup.
    #[error("operation timed out")]
    Timeout,

    /// An underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-local [`Result`] defaulting the error to [`RaceClientError`].
pub type Result<T> = std::result::Result<T, RaceClientError>;
