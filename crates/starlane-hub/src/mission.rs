//! Forming mission lobbies.
//!
//! A mission lobby is the in-memory member list of a mission that hasn't
//! started yet. The durable record (type, difficulty, leader) is owned by
//! the external store and created *before* the lobby opens; the lobby
//! itself shares the ephemeral presence substrate with hubs and dies with
//! the process. Matchmaking and mission gameplay live elsewhere.

use std::collections::HashMap;

use starlane_protocol::{MissionId, MissionInfo, MissionMember, PlayerId};

use crate::HubError;

/// One forming lobby: the durable record plus the live member list.
/// Members keep insertion order (small lists, capped by `max_players`).
#[derive(Debug)]
pub struct MissionLobby {
    info: MissionInfo,
    members: Vec<MissionMember>,
}

impl MissionLobby {
    /// The durable mission record this lobby fronts.
    pub fn info(&self) -> &MissionInfo {
        &self.info
    }

    /// Copied member list, in join order.
    pub fn members(&self) -> Vec<MissionMember> {
        self.members.clone()
    }

    /// Member player ids, in join order.
    pub fn member_ids(&self) -> Vec<PlayerId> {
        self.members.iter().map(|m| m.player_id).collect()
    }

    fn contains(&self, player: PlayerId) -> bool {
        self.members.iter().any(|m| m.player_id == player)
    }
}

/// All forming lobbies in the realm, with a player → lobby index.
#[derive(Debug, Default)]
pub struct MissionLobbies {
    lobbies: HashMap<MissionId, MissionLobby>,
    by_player: HashMap<PlayerId, MissionId>,
}

impl MissionLobbies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a lobby for a freshly created mission record, seeding it
    /// with the leader.
    pub fn open(&mut self, info: MissionInfo, leader: MissionMember) {
        let mission_id = info.id;
        self.by_player.insert(leader.player_id, mission_id);
        self.lobbies.insert(
            mission_id,
            MissionLobby {
                info,
                members: vec![leader],
            },
        );
    }

    /// Adds a member to a forming lobby.
    ///
    /// Joining a lobby the player is already in replaces nothing and
    /// succeeds (idempotent, mirroring hub re-joins).
    ///
    /// # Errors
    /// - [`HubError::MissionNotActive`] — no such lobby in this realm
    /// - [`HubError::MissionFull`] — member list at `max_players`
    pub fn join(
        &mut self,
        mission_id: MissionId,
        member: MissionMember,
    ) -> Result<&MissionLobby, HubError> {
        let lobby = self
            .lobbies
            .get_mut(&mission_id)
            .ok_or(HubError::MissionNotActive(mission_id))?;

        if !lobby.contains(member.player_id) {
            if lobby.members.len() >= lobby.info.max_players {
                return Err(HubError::MissionFull(mission_id));
            }
            self.by_player.insert(member.player_id, mission_id);
            lobby.members.push(member);
        }
        Ok(lobby)
    }

    /// The lobby a player currently sits in, if any (chat scoping).
    pub fn lobby_of(&self, player: PlayerId) -> Option<MissionId> {
        self.by_player.get(&player).copied()
    }

    /// A lobby's members, or `None` for unknown lobbies.
    pub fn members(&self, mission_id: MissionId) -> Option<Vec<MissionMember>> {
        self.lobbies.get(&mission_id).map(MissionLobby::members)
    }

    /// Drops a player from whatever lobby they sit in. Returns the lobby
    /// id and the remaining member ids for the caller to notify; an
    /// emptied lobby is removed outright.
    pub fn remove_player(&mut self, player: PlayerId) -> Option<(MissionId, Vec<PlayerId>)> {
        let mission_id = self.by_player.remove(&player)?;
        let lobby = self.lobbies.get_mut(&mission_id)?;
        lobby.members.retain(|m| m.player_id != player);

        let remaining = lobby.member_ids();
        if remaining.is_empty() {
            self.lobbies.remove(&mission_id);
            tracing::debug!(%mission_id, "empty mission lobby dropped");
        }
        Some((mission_id, remaining))
    }

    /// Number of open lobbies.
    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    /// `true` when no lobby is open.
    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
