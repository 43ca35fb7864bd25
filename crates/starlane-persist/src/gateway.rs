//! The persistence gateway — the seam between the realtime core and the
//! durable store.
//!
//! The core never owns the schema; it calls these methods and moves on.
//! Apart from the reads that gate an admission (ship ownership, mission
//! lookup), every call is issued fire-and-forget: the in-memory mutation
//! has already completed and is visible before the flush is spawned, and
//! a failed flush is logged, never rolled back. That is a deliberate
//! at-most-once durability choice — live sessions treat in-memory state
//! as the operative truth.

use starlane_protocol::{ChatMessage, HubId, MissionId, MissionInfo, PlayerId, ShipId};

use crate::PersistError;

/// A ship row as the durable store describes it: name for display, plus
/// the last flushed position, if any ever was.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipRecord {
    pub id: ShipId,
    pub name: String,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub rotation: Option<f64>,
}

/// Durable-store operations the realtime core consumes.
///
/// Every method is async and individually failable. Bounds mirror the
/// other seams: one gateway instance shared across all handler tasks and
/// the realm, with `Send` futures so calls can be spawned.
pub trait PersistenceGateway: Send + Sync + 'static {
    /// Fetches a ship only if `owner` actually owns it. `Ok(None)` is the
    /// authorization failure — the join is refused with an error event.
    ///
    /// This is the one call the join path awaits before admission.
    fn get_ship_if_owned(
        &self,
        ship: ShipId,
        owner: PlayerId,
    ) -> impl Future<Output = Result<Option<ShipRecord>, PersistError>> + Send;

    /// Records that a player's realtime session is up, keyed by the
    /// transport's connection handle.
    fn upsert_presence(
        &self,
        player: PlayerId,
        session_handle: String,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Records which hub and ship a player's presence row points at.
    fn update_presence_location(
        &self,
        player: PlayerId,
        hub: HubId,
        ship: ShipId,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Records which hub a ship is parked in.
    fn update_ship_location(
        &self,
        ship: ShipId,
        hub: HubId,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Writes a ship's final position on leave/disconnect. Best-effort;
    /// the occupant is already gone from the hub by the time this runs.
    fn flush_ship_position(
        &self,
        ship: ShipId,
        x: f64,
        y: f64,
        rotation: f64,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Deletes a player's presence row on disconnect.
    fn clear_presence(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Appends a chat message to durable history. Delivery to the live
    /// audience never waits for this.
    fn record_chat_message(
        &self,
        message: ChatMessage,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Flips a player's online flag.
    fn set_online(
        &self,
        player: PlayerId,
        online: bool,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Creates a durable mission record in the forming state and returns
    /// it. Awaited by the `mission.create` path before the lobby opens.
    fn create_mission(
        &self,
        leader: PlayerId,
        kind: &str,
        difficulty: u32,
    ) -> impl Future<Output = Result<MissionInfo, PersistError>> + Send;

    /// Reads a mission record only while it is still forming. `Ok(None)`
    /// means unknown or already started.
    fn get_forming_mission(
        &self,
        mission: MissionId,
    ) -> impl Future<Output = Result<Option<MissionInfo>, PersistError>> + Send;

    /// Records the current member list of a forming mission.
    fn update_mission_players(
        &self,
        mission: MissionId,
        players: Vec<PlayerId>,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;
}
