//! Authentication hook for validating player identity.
//!
//! Starlane does not implement authentication itself — credentials are
//! issued and validated by an external identity provider (JWT service,
//! OAuth backend, whatever the deployment uses). The realtime layer only
//! defines the [`Authenticator`] seam: one async method that takes the
//! token from the client's `auth` intent and resolves it to an
//! [`Identity`], or refuses the connection.
//!
//! Swapping implementations is how deployments differ: a JWT validator
//! in production, a permissive dev authenticator locally, a scripted one
//! in tests — with no framework changes.

use starlane_protocol::PlayerId;

use crate::SessionError;

/// The authenticated identity behind a connection.
///
/// `username` is the display name shown to other players; it rides along
/// in every kinematic state and chat message the server emits for this
/// player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub player_id: PlayerId,
    pub username: String,
}

/// Validates a client's auth token and returns their identity.
///
/// Bounds: `Send + Sync + 'static` — one authenticator instance is shared
/// by every connection handler task; the returned future must be `Send`
/// so handlers can be spawned.
///
/// # Example
///
/// ```rust
/// use starlane_session::{Authenticator, Identity, SessionError};
/// use starlane_protocol::PlayerId;
///
/// /// Accepts tokens of the form "<id>:<username>". Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
///         let (id, name) = token
///             .split_once(':')
///             .ok_or_else(|| SessionError::AuthFailed("malformed token".into()))?;
///         let player_id = id
///             .parse()
///             .map_err(|_| SessionError::AuthFailed("bad player id".into()))?;
///         Ok(Identity {
///             player_id: PlayerId(player_id),
///             username: name.to_string(),
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns who the caller is.
    ///
    /// Called once per connection, before any state is created. An
    /// `Err` refuses the transport with an `error` event.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}
