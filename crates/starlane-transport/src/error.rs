//! Error types for the transport layer.

#[cfg(feature = "websocket")]
use tokio_tungstenite::tungstenite;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed by the peer or the network.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a frame failed.
    #[cfg(feature = "websocket")]
    #[error("send failed: {0}")]
    SendFailed(#[source] tungstenite::Error),

    /// Receiving a frame failed.
    #[cfg(feature = "websocket")]
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] tungstenite::Error),

    /// The WebSocket upgrade handshake on an accepted TCP stream failed.
    #[cfg(feature = "websocket")]
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] tungstenite::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// An outbound frame was not valid for this transport's framing
    /// (e.g. non-UTF-8 bytes for a text-frame protocol).
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
