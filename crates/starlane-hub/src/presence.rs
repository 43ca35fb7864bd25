//! The presence registry: the single source of truth for "where is
//! player X right now".

use std::collections::HashMap;

use starlane_protocol::{HubId, PlayerId, ShipId};

/// A player's current location.
///
/// One variant today; mission instances would become a sibling variant
/// if missions ever grow their own spatial presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Present in a hub, flying the given ship.
    Hub { hub_id: HubId, ship_id: ShipId },
}

impl Location {
    /// The hub this location points at, if any.
    pub fn hub_id(&self) -> Option<HubId> {
        match self {
            Location::Hub { hub_id, .. } => Some(*hub_id),
        }
    }

    /// The active ship at this location, if any.
    pub fn ship_id(&self) -> Option<ShipId> {
        match self {
            Location::Hub { ship_id, .. } => Some(*ship_id),
        }
    }
}

/// Maps each connected player to at most one [`Location`].
///
/// An absent entry means "nowhere" — authenticated but not in any hub.
/// The registry itself doesn't touch hub occupant maps; the realm actor
/// orchestrates vacating the prior hub before recording a new location,
/// so no occupant map ever disagrees with the registry.
///
/// Nothing here is persisted. On restart the registry starts empty and
/// clients re-establish their presence by re-joining.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: HashMap<PlayerId, Location>,
}

impl PresenceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `player`'s location, replacing any prior one.
    /// Returns the replaced location.
    pub fn set_location(&mut self, player: PlayerId, location: Location) -> Option<Location> {
        self.entries.insert(player, location)
    }

    /// The player's current location, or `None` if never set or cleared.
    pub fn location(&self, player: PlayerId) -> Option<Location> {
        self.entries.get(&player).copied()
    }

    /// Removes the player's entry entirely (leave/disconnect).
    /// Returns what was cleared; `None` makes this a safe no-op.
    pub fn clear(&mut self, player: PlayerId) -> Option<Location> {
        self.entries.remove(&player)
    }

    /// Number of players with a recorded location.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no player has a recorded location.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
