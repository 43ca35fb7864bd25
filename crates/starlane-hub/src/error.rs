//! Error types for the hub layer.

use starlane_protocol::{HubId, MissionId, PlayerId};

/// Errors that can occur during hub and mission operations.
///
/// Stale references (updating or leaving a hub the player is not in)
/// are deliberately *not* errors — those paths are silent no-ops, since
/// they occur naturally when intents race a disconnect.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub is at capacity. The join is rejected and the caller's
    /// session keeps its prior state.
    #[error("hub {0} is full")]
    HubFull(HubId),

    /// The player has no live connection registered with the realm.
    #[error("player {0} is not connected")]
    NotConnected(PlayerId),

    /// The mission lobby is not open in this realm (unknown, or already
    /// past forming).
    #[error("mission {0} is not active")]
    MissionNotActive(MissionId),

    /// The mission lobby is at capacity.
    #[error("mission {0} is full")]
    MissionFull(MissionId),

    /// The realm actor is gone (process shutting down).
    #[error("realm is unavailable")]
    RealmClosed,
}
