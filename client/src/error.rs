//! # Error Types
//!
//! One error enum per layer:
//! - [`TransportError`]: failures of the physical WebSocket connection
//! - [`StreamError`]: failures surfaced by the [`LogStreamClient`] API
//! - [`FrameError`]: inbound frames that could not be decoded
//! - [`CredentialError`]: token storage I/O failures
//!
//! [`LogStreamClient`]: crate::client::LogStreamClient

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors reported by a transport connection.
///
/// These are handed by reference to error observers, so every failure of a
/// physical connection (establishment or mid-stream) is one of these.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The handshake did not finish within the configured connect timeout.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The WebSocket layer reported a protocol or I/O failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The outbound half was already closed.
    #[error("connection closed")]
    Closed,
}

/// Errors returned from the log stream client API.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("resource id must not be empty")]
    InvalidResourceId,

    #[error("invalid stream endpoint: {0}")]
    InvalidEndpoint(String),

    /// The first connection attempt failed before the stream opened.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `connect()` was called while the connection loop is already running.
    #[error("log stream is already started")]
    AlreadyStarted,

    /// `connect()` was called after `disconnect()`.
    #[error("log stream has been disconnected")]
    Disposed,

    /// The connection loop stopped before the first attempt finished,
    /// which only happens when the client is disconnected mid-handshake.
    #[error("log stream closed before it opened")]
    Closed,
}

impl From<url::ParseError> for StreamError {
    fn from(err: url::ParseError) -> Self {
        StreamError::InvalidEndpoint(err.to_string())
    }
}

/// Reasons an inbound text frame is dropped.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("invalid log payload: {0}")]
    LogPayload(#[source] serde_json::Error),
}

/// Token storage failures.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no configuration directory available for the token store")]
    NoConfigDir,

    #[error("token store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
