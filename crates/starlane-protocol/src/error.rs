//! Error types for the protocol layer.
//!
//! Each crate in Starlane defines its own error enum; a `ProtocolError`
//! always means the problem is in serialization or frame shape, not in
//! networking or hub state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound message failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// An inbound frame could not be parsed: malformed JSON, missing
    /// fields, or an event name outside the protocol's closed set.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but violates protocol rules — e.g. a connection
    /// whose first message is not `auth`.
    #[error("invalid intent: {0}")]
    InvalidIntent(String),
}
