//! Codec trait and implementations for turning messages into frames.
//!
//! The realtime layer never serializes directly — it goes through a
//! [`Codec`] so the wire encoding stays an implementation choice. The
//! default is [`JsonCodec`]: the browser client speaks JSON over text
//! frames, and JSON frames are inspectable in DevTools while debugging
//! movement sync. A binary codec can be swapped in behind the same trait
//! without touching the session or hub layers.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts protocol values to and from wire frames.
///
/// Bounds: `Send + Sync + 'static` because one codec instance is shared
/// by every connection handler task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one outbound frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes one inbound frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] for malformed, truncated, or
    /// unknown-event frames.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] producing the JSON frames described in the protocol tables
/// (`{"event": "...", "data": {...}}`).
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use starlane_protocol::{ClientIntent, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ClientIntent::HubLeave).unwrap();
/// let decoded: ClientIntent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ClientIntent::HubLeave);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
