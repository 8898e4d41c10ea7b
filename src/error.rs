/// file: src/error.rs
/// description: Error types for setup failures and for stream notifications delivered to observers
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TickStreamError {
    #[error("WebSocket connection error: {0}")]
    WebSocketError(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Connection timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Metrics server error: {0}")]
    MetricsError(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TickStreamError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocketError(Box::new(value))
    }
}

/// Failure reported to observers.
///
/// These never escape the coordinator's public operations; they arrive through
/// `TickObserver::on_error` and are retained as the session's last error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    #[error("no message received within {0:?}")]
    HeartbeatTimeout(Duration),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("maximum reconnection attempts ({attempts}) exceeded")]
    RetriesExhausted { attempts: u32 },

    #[error("no async runtime available: {0}")]
    Runtime(String),
}

impl StreamError {
    /// True when automatic recovery has given up and only an explicit
    /// `connect()` will bring the stream back.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. } | Self::Runtime(_))
    }

    /// True for a single undecodable message that left the connection up.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::InvalidMessage(_))
    }
}

impl From<TickStreamError> for StreamError {
    fn from(value: TickStreamError) -> Self {
        match value {
            TickStreamError::ConnectionClosed => Self::ConnectionClosed,
            TickStreamError::SerdeError(e) => Self::InvalidMessage(e.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}
