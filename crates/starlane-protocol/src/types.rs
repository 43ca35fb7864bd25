//! Identity and kinematic types shared across the wire protocol.
//!
//! Everything in this module travels on the wire in JSON with camelCase
//! keys, matching what the browser client reads and writes. Identifiers
//! are newtype wrappers over `u64` — the ids themselves are issued by the
//! external store (player accounts, ship rows, star-system hub records);
//! the realtime core never mints them.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's stable, externally issued identifier.
///
/// `#[serde(transparent)]` makes `PlayerId(42)` serialize as plain `42`,
/// which is what the client expects in every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A shared spatial hub instance. Matches a persistent star-system hub
/// record owned by the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HubId(pub u64);

impl fmt::Display for HubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H-{}", self.0)
    }
}

/// A ship design instance owned by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipId(pub u64);

impl fmt::Display for ShipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A mission instance (forming lobby).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissionId(pub u64);

impl fmt::Display for MissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Kinematic state
// ---------------------------------------------------------------------------

/// The full transient state of one player's ship inside a hub.
///
/// Position is unbounded map-space; rotation is radians (the domain wraps,
/// but values are stored last-writer-wins without normalization). This is
/// ephemeral state — only a final position snapshot survives a leave or
/// disconnect, via the persistence gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinematicState {
    pub player_id: PlayerId,
    pub username: String,
    pub ship_id: ShipId,
    pub ship_name: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
}

impl KinematicState {
    /// Merges a partial update into this state, field by field.
    /// Absent fields are left untouched (last-writer-wins per field).
    pub fn apply(&mut self, delta: &KinematicDelta) {
        if let Some(x) = delta.x {
            self.x = x;
        }
        if let Some(y) = delta.y {
            self.y = y;
        }
        if let Some(rotation) = delta.rotation {
            self.rotation = rotation;
        }
        if let Some(vx) = delta.velocity_x {
            self.velocity_x = vx;
        }
        if let Some(vy) = delta.velocity_y {
            self.velocity_y = vy;
        }
    }
}

/// A partial kinematic update. Every field is optional; fields that are
/// `None` are omitted from the wire entirely, so a delta of `{x: 10}`
/// serializes as exactly `{"x":10.0}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinematicDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_y: Option<f64>,
}

impl KinematicDelta {
    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.rotation.is_none()
            && self.velocity_x.is_none()
            && self.velocity_y.is_none()
    }
}

// =========================================================================
// Tests
// =========================================================================
