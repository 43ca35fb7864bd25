//! Unified error type for the Starlane server.

use starlane_hub::HubError;
use starlane_protocol::ProtocolError;
use starlane_session::SessionError;
use starlane_transport::TransportError;

/// Top-level error that wraps the layer-specific errors.
///
/// Users of the `starlane` meta crate deal with this single type; the
/// `#[from]` attributes let `?` lift sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum StarlaneError {
    /// A transport-level error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid intent).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, lifecycle).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A hub-level error (capacity, realm unavailable).
    #[error(transparent)]
    Hub(#[from] HubError),
}
