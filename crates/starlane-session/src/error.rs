//! Error types for the session layer.

/// Errors that can occur during the connection-session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The identity provider rejected the token (invalid, expired, or
    /// unknown). The transport is refused and no state is created.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// An intent arrived before the `auth` handshake completed.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A second `auth` intent on an already-authenticated session.
    #[error("session is already authenticated")]
    AlreadyAuthenticated,

    /// The session has reached its terminal phase.
    #[error("session is closed")]
    Closed,
}
