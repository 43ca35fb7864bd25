//! The hub instance store: every live hub instance, keyed by hub id.
//!
//! Instances are created lazily on first join and reclaimed by the idle
//! reaper. All occupant-map mutation goes through this API — no caller
//! ever holds a reference into an instance's map.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use starlane_protocol::{HubId, KinematicDelta, KinematicState, PlayerId};

use crate::{HubConfig, HubError, HubInstance};

/// How a successful join landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The player was inserted as a new occupant.
    New,
    /// The player was already an occupant; their state was replaced.
    /// No join broadcast goes out for this case.
    Rejoined,
}

/// Per-process collection of live hub instances.
#[derive(Debug)]
pub struct HubStore {
    hubs: HashMap<HubId, HubInstance>,
    config: HubConfig,
}

impl HubStore {
    /// Creates an empty store with the given limits.
    pub fn new(config: HubConfig) -> Self {
        Self {
            hubs: HashMap::new(),
            config,
        }
    }

    /// Returns the instance for `hub_id`, creating it empty if absent.
    pub fn ensure_hub(&mut self, hub_id: HubId) -> &mut HubInstance {
        self.hubs.entry(hub_id).or_insert_with(|| {
            tracing::debug!(%hub_id, "hub instance created");
            HubInstance::new()
        })
    }

    /// Whether a join by `player` would be admitted right now. Existing
    /// occupants are always admitted (idempotent re-join); otherwise the
    /// capacity bound applies. Checking before mutating lets the caller
    /// reject a join without having vacated the player's prior hub.
    pub fn can_admit(&self, hub_id: HubId, player: PlayerId) -> bool {
        match self.hubs.get(&hub_id) {
            Some(hub) => hub.contains(player) || hub.occupant_count() < self.config.max_occupants,
            None => self.config.max_occupants > 0,
        }
    }

    /// Admits `state.player_id` into `hub_id`.
    ///
    /// A join for a hub the player already occupies replaces their state
    /// (no duplicate entry, no capacity charge) and reports
    /// [`Admission::Rejoined`].
    ///
    /// # Errors
    /// [`HubError::HubFull`] when the hub is at capacity. Nothing is
    /// mutated on rejection — join is the only capacity gate, and there
    /// is no partial admission.
    pub fn join(&mut self, hub_id: HubId, state: KinematicState) -> Result<Admission, HubError> {
        let max = self.config.max_occupants;
        let player = state.player_id;
        let hub = self.ensure_hub(hub_id);

        let admission = if hub.contains(player) {
            Admission::Rejoined
        } else if hub.occupant_count() >= max {
            return Err(HubError::HubFull(hub_id));
        } else {
            Admission::New
        };

        hub.insert(state);
        Ok(admission)
    }

    /// Merges a partial update into an occupant's state. Returns `false`
    /// (a silent no-op) when the hub doesn't exist or the player isn't
    /// an occupant — the expected shape of an update racing a leave.
    pub fn update(&mut self, hub_id: HubId, player: PlayerId, delta: &KinematicDelta) -> bool {
        match self.hubs.get_mut(&hub_id) {
            Some(hub) => hub.merge(player, delta),
            None => false,
        }
    }

    /// Removes an occupant, returning their final state for the caller
    /// to flush. `None` (no-op) when absent.
    pub fn leave(&mut self, hub_id: HubId, player: PlayerId) -> Option<KinematicState> {
        self.hubs.get_mut(&hub_id)?.remove(player)
    }

    /// The occupant ids of a hub (broadcast fan-out). Empty for unknown
    /// hubs.
    pub fn occupant_ids(&self, hub_id: HubId) -> Vec<PlayerId> {
        self.hubs
            .get(&hub_id)
            .map(HubInstance::occupant_ids)
            .unwrap_or_default()
    }

    /// A copied snapshot of a hub's occupants. Empty for unknown hubs.
    pub fn snapshot(&self, hub_id: HubId) -> Vec<KinematicState> {
        self.hubs
            .get(&hub_id)
            .map(HubInstance::snapshot)
            .unwrap_or_default()
    }

    /// Whether the hub has no occupants. Unknown hubs count as empty.
    pub fn is_empty(&self, hub_id: HubId) -> bool {
        self.hubs.get(&hub_id).is_none_or(HubInstance::is_empty)
    }

    /// Whether the hub is empty and untouched for at least `grace`.
    pub fn is_idle_since(&self, hub_id: HubId, now: Instant, grace: Duration) -> bool {
        self.hubs
            .get(&hub_id)
            .is_some_and(|hub| hub.is_idle_since(now, grace))
    }

    /// Removes a hub instance outright. Only valid (and only effective)
    /// when the hub is empty; an occupied hub is left alone.
    pub fn evict(&mut self, hub_id: HubId) -> bool {
        match self.hubs.get(&hub_id) {
            Some(hub) if hub.is_empty() => {
                self.hubs.remove(&hub_id);
                true
            }
            _ => false,
        }
    }

    /// Sweeps every instance and evicts those idle past `grace`.
    /// Returns the evicted hub ids.
    pub fn reap(&mut self, now: Instant, grace: Duration) -> Vec<HubId> {
        let evicted: Vec<HubId> = self
            .hubs
            .iter()
            .filter(|(_, hub)| hub.is_idle_since(now, grace))
            .map(|(id, _)| *id)
            .collect();
        for hub_id in &evicted {
            self.hubs.remove(hub_id);
        }
        evicted
    }

    /// Iterates over live instances (the tick broadcaster's read path).
    pub fn iter(&self) -> impl Iterator<Item = (HubId, &HubInstance)> {
        self.hubs.iter().map(|(id, hub)| (*id, hub))
    }

    /// Number of live hub instances (occupied or not).
    pub fn hub_count(&self) -> usize {
        self.hubs.len()
    }

    /// Current occupant count for a hub. 0 for unknown hubs.
    pub fn occupant_count(&self, hub_id: HubId) -> usize {
        self.hubs
            .get(&hub_id)
            .map_or(0, HubInstance::occupant_count)
    }
}

// =========================================================================
// Tests
// =========================================================================
