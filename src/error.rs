use std::net::SocketAddr;
use thiserror::Error;

/// Errors surfaced by the relay library
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("WebRTC error: {0}")]
    Rtc(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Relay has shut down")]
    RelayStopped,
}

pub type Result<T> = std::result::Result<T, RelayError>;
