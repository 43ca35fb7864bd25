//! A single hub instance: the in-memory occupant map for one shared
//! spatial hub.
//!
//! Hub instances are an ephemeral cache of who is present and where
//! their ship currently flies. The durable record of the hub itself
//! (its star system, its metadata) lives in the external store; nothing
//! in this module is ever persisted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use starlane_protocol::{KinematicDelta, KinematicState, PlayerId};

/// In-memory state of one hub: occupants and their kinematic state,
/// plus the last-mutation timestamp the idle reaper keys off.
#[derive(Debug)]
pub struct HubInstance {
    occupants: HashMap<PlayerId, KinematicState>,
    last_update: Instant,
}

impl HubInstance {
    /// A fresh, empty instance. `last_update` starts at now, so an
    /// instance that never admits anyone still ages toward eviction.
    pub fn new() -> Self {
        Self {
            occupants: HashMap::new(),
            last_update: Instant::now(),
        }
    }

    /// Inserts (or replaces) an occupant's state.
    pub fn insert(&mut self, state: KinematicState) {
        self.occupants.insert(state.player_id, state);
        self.last_update = Instant::now();
    }

    /// Merges a partial update into an occupant's state. Returns `false`
    /// without touching anything when the player is not an occupant.
    pub fn merge(&mut self, player: PlayerId, delta: &KinematicDelta) -> bool {
        match self.occupants.get_mut(&player) {
            Some(state) => {
                state.apply(delta);
                self.last_update = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Removes an occupant, returning their final state.
    pub fn remove(&mut self, player: PlayerId) -> Option<KinematicState> {
        let removed = self.occupants.remove(&player);
        if removed.is_some() {
            self.last_update = Instant::now();
        }
        removed
    }

    /// Whether the player is currently an occupant.
    pub fn contains(&self, player: PlayerId) -> bool {
        self.occupants.contains_key(&player)
    }

    /// Current occupant count.
    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// `true` when nobody is present.
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// The occupants' player ids.
    pub fn occupant_ids(&self) -> Vec<PlayerId> {
        self.occupants.keys().copied().collect()
    }

    /// A copied snapshot of every occupant's state. Callers get owned
    /// data — no reference into the live map ever escapes.
    pub fn snapshot(&self) -> Vec<KinematicState> {
        self.occupants.values().cloned().collect()
    }

    /// One occupant's state, copied.
    pub fn occupant(&self, player: PlayerId) -> Option<KinematicState> {
        self.occupants.get(&player).cloned()
    }

    /// Whether this instance is empty and has been untouched for at
    /// least `grace` as of `now`.
    pub fn is_idle_since(&self, now: Instant, grace: Duration) -> bool {
        self.is_empty() && now.duration_since(self.last_update) >= grace
    }
}

impl Default for HubInstance {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
