//! Error types for bakken-sync

use thiserror::Error;

/// Result type alias using bakken-sync's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bakken-sync operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote backend rejected a request
    #[error("Backend error: {0}")]
    Backend(String),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Realtime websocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Malformed remote or local payload
    #[error("Malformed data: {0}")]
    Data(String),
}
