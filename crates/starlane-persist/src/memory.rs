//! In-memory [`PersistenceGateway`] used by tests and demos.
//!
//! Stores everything in maps behind one mutex and exposes inspection
//! helpers so tests can assert what the realtime core flushed. Not a
//! database — restart loses everything — but it honors the same contract
//! a real store would.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use starlane_protocol::{ChatMessage, HubId, MissionId, MissionInfo, PlayerId, ShipId};

use crate::{PersistError, PersistenceGateway, ShipRecord};

/// A presence row: connection handle plus current location, mirroring
/// what the durable store would keep per player.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceRow {
    pub session_handle: String,
    pub location: Option<(HubId, ShipId)>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Ship rows, with their owner.
    ships: HashMap<ShipId, (PlayerId, ShipRecord)>,
    /// Presence rows keyed by player.
    presence: HashMap<PlayerId, PresenceRow>,
    /// Last parked hub per ship.
    ship_locations: HashMap<ShipId, HubId>,
    /// Every position flush, in order.
    flushed: Vec<(ShipId, f64, f64, f64)>,
    /// Every chat message recorded, in order.
    chat: Vec<ChatMessage>,
    /// Online flags.
    online: HashMap<PlayerId, bool>,
    /// Mission records with their member lists; `true` = still forming.
    missions: HashMap<MissionId, (MissionInfo, Vec<PlayerId>, bool)>,
    next_mission_id: u64,
}

/// Shared, cloneable in-memory gateway.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- Seeding ----------------------------------------------------------

    /// Inserts a ship row owned by `owner`.
    pub fn add_ship(&self, owner: PlayerId, ship: ShipRecord) {
        self.lock().ships.insert(ship.id, (owner, ship));
    }

    // -- Inspection (for tests) -------------------------------------------

    /// All position flushes so far, in order.
    pub fn flushed_positions(&self) -> Vec<(ShipId, f64, f64, f64)> {
        self.lock().flushed.clone()
    }

    /// All chat messages recorded so far, in order.
    pub fn chat_log(&self) -> Vec<ChatMessage> {
        self.lock().chat.clone()
    }

    /// A player's online flag; `false` when never set.
    pub fn is_online(&self, player: PlayerId) -> bool {
        self.lock().online.get(&player).copied().unwrap_or(false)
    }

    /// A player's presence row, if one exists.
    pub fn presence_row(&self, player: PlayerId) -> Option<PresenceRow> {
        self.lock().presence.get(&player).cloned()
    }

    /// The hub a ship was last parked in.
    pub fn ship_location(&self, ship: ShipId) -> Option<HubId> {
        self.lock().ship_locations.get(&ship).copied()
    }

    /// The recorded member list of a mission.
    pub fn mission_players(&self, mission: MissionId) -> Option<Vec<PlayerId>> {
        self.lock().missions.get(&mission).map(|(_, p, _)| p.clone())
    }
}

impl PersistenceGateway for MemoryGateway {
    async fn get_ship_if_owned(
        &self,
        ship: ShipId,
        owner: PlayerId,
    ) -> Result<Option<ShipRecord>, PersistError> {
        Ok(self
            .lock()
            .ships
            .get(&ship)
            .filter(|(o, _)| *o == owner)
            .map(|(_, record)| record.clone()))
    }

    async fn upsert_presence(
        &self,
        player: PlayerId,
        session_handle: String,
    ) -> Result<(), PersistError> {
        let mut inner = self.lock();
        let row = inner.presence.entry(player).or_insert(PresenceRow {
            session_handle: String::new(),
            location: None,
        });
        row.session_handle = session_handle;
        Ok(())
    }

    async fn update_presence_location(
        &self,
        player: PlayerId,
        hub: HubId,
        ship: ShipId,
    ) -> Result<(), PersistError> {
        let mut inner = self.lock();
        if let Some(row) = inner.presence.get_mut(&player) {
            row.location = Some((hub, ship));
        }
        Ok(())
    }

    async fn update_ship_location(&self, ship: ShipId, hub: HubId) -> Result<(), PersistError> {
        self.lock().ship_locations.insert(ship, hub);
        Ok(())
    }

    async fn flush_ship_position(
        &self,
        ship: ShipId,
        x: f64,
        y: f64,
        rotation: f64,
    ) -> Result<(), PersistError> {
        let mut inner = self.lock();
        inner.flushed.push((ship, x, y, rotation));
        if let Some((_, record)) = inner.ships.get_mut(&ship) {
            record.position_x = Some(x);
            record.position_y = Some(y);
            record.rotation = Some(rotation);
        }
        Ok(())
    }

    async fn clear_presence(&self, player: PlayerId) -> Result<(), PersistError> {
        self.lock().presence.remove(&player);
        Ok(())
    }

    async fn record_chat_message(&self, message: ChatMessage) -> Result<(), PersistError> {
        self.lock().chat.push(message);
        Ok(())
    }

    async fn set_online(&self, player: PlayerId, online: bool) -> Result<(), PersistError> {
        self.lock().online.insert(player, online);
        Ok(())
    }

    async fn create_mission(
        &self,
        leader: PlayerId,
        kind: &str,
        difficulty: u32,
    ) -> Result<MissionInfo, PersistError> {
        let mut inner = self.lock();
        inner.next_mission_id += 1;
        let info = MissionInfo {
            id: MissionId(inner.next_mission_id),
            kind: kind.to_string(),
            difficulty,
            leader_id: leader,
            max_players: 4,
        };
        inner
            .missions
            .insert(info.id, (info.clone(), vec![leader], true));
        Ok(info)
    }

    async fn get_forming_mission(
        &self,
        mission: MissionId,
    ) -> Result<Option<MissionInfo>, PersistError> {
        Ok(self
            .lock()
            .missions
            .get(&mission)
            .filter(|(_, _, forming)| *forming)
            .map(|(info, _, _)| info.clone()))
    }

    async fn update_mission_players(
        &self,
        mission: MissionId,
        players: Vec<PlayerId>,
    ) -> Result<(), PersistError> {
        let mut inner = self.lock();
        if let Some((_, members, _)) = inner.missions.get_mut(&mission) {
            *members = players;
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
