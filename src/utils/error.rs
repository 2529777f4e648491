//! Error types shared by the relay, the transport and the configuration loader.

use thiserror::Error;

use crate::transport::mqtt::CodecError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mqtt codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// CONNACK carried a non-zero return code.
    #[error("broker refused connection (return code {0})")]
    Refused(u8),

    #[error("invalid broker url: {0}")]
    InvalidUrl(String),

    #[error("connection closed before the broker answered")]
    ClosedDuringHandshake,
}

pub type Result<T> = std::result::Result<T, RelayError>;
