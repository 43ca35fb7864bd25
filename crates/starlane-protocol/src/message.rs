//! Client intents and server events — the closed set of messages that
//! travel over a realtime connection.
//!
//! Every frame is one adjacently tagged JSON object:
//!
//! ```text
//! { "event": "hub.join", "data": { "hubId": 1, "shipId": 10 } }
//! ```
//!
//! `#[serde(tag = "event", content = "data")]` produces that shape. Unit
//! variants (e.g. `hub.leave`) omit the `data` key entirely. The event
//! names are the protocol contract — the client dispatches on them — so
//! each variant pins its name with an explicit rename rather than relying
//! on a casing convention.

use serde::{Deserialize, Serialize};

use crate::{HubId, KinematicDelta, KinematicState, MissionId, PlayerId, ShipId};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Everything a client can ask of the server.
///
/// Intents from one connection are processed strictly in the order they
/// arrive; there is no other inbound surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientIntent {
    /// Must be the first message on a fresh connection. The token is
    /// validated against the external identity provider.
    #[serde(rename = "auth")]
    Authenticate { token: String },

    /// Enter a hub with one of the caller's ships. Ship ownership is
    /// checked against the persistent store before admission.
    #[serde(rename = "hub.join")]
    #[serde(rename_all = "camelCase")]
    HubJoin { hub_id: HubId, ship_id: ShipId },

    /// Partial kinematic update for the caller's ship. Silently ignored
    /// when the caller is not currently a hub occupant.
    #[serde(rename = "hub.update")]
    HubUpdate(KinematicDelta),

    /// Leave the current hub (if any).
    #[serde(rename = "hub.leave")]
    HubLeave,

    /// Send a chat message to the requested channel. The server resolves
    /// the actual audience from the caller's presence.
    #[serde(rename = "chat.send")]
    ChatSend { channel: ChatChannel, message: String },

    /// Open a new mission lobby led by the caller.
    #[serde(rename = "mission.create")]
    MissionCreate {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        difficulty: Option<u32>,
    },

    /// Join a forming mission lobby.
    #[serde(rename = "mission.join")]
    #[serde(rename_all = "camelCase")]
    MissionJoin { mission_id: MissionId },

    /// Clean close. The transport dropping has the same effect.
    #[serde(rename = "disconnect")]
    Disconnect,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Everything the server can push to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Sent once after a successful authentication handshake.
    #[serde(rename = "connected")]
    #[serde(rename_all = "camelCase")]
    Connected { user_id: PlayerId, username: String },

    /// Sent only to the joining session: the hub's current occupants
    /// (including the joiner) plus the joiner's own spawned state.
    #[serde(rename = "hub.joined")]
    #[serde(rename_all = "camelCase")]
    HubJoined {
        hub_id: HubId,
        players: Vec<KinematicState>,
        your_state: KinematicState,
    },

    /// Sent to the other occupants when a player enters their hub.
    #[serde(rename = "hub.playerJoined")]
    HubPlayerJoined(KinematicState),

    /// Eager relay of one player's partial update to the other occupants.
    /// The periodic `hub.tick` remains the reconciling source of truth.
    #[serde(rename = "hub.playerUpdate")]
    #[serde(rename_all = "camelCase")]
    HubPlayerUpdate {
        player_id: PlayerId,
        #[serde(flatten)]
        delta: KinematicDelta,
    },

    /// Periodic full snapshot of a hub, tagged with a server timestamp
    /// (unix milliseconds).
    #[serde(rename = "hub.tick")]
    HubTick {
        timestamp: u64,
        players: Vec<KinematicState>,
    },

    /// A player left the hub (explicitly or by disconnect).
    #[serde(rename = "hub.playerLeft")]
    #[serde(rename_all = "camelCase")]
    HubPlayerLeft { player_id: PlayerId },

    /// A chat message fanned out to its resolved audience.
    #[serde(rename = "chat.message")]
    ChatMessage(ChatMessage),

    /// Sent to the leader after their mission lobby opens.
    #[serde(rename = "mission.created")]
    MissionCreated { mission: MissionInfo },

    /// Sent to every lobby member when a player joins the lobby.
    #[serde(rename = "mission.playerJoined")]
    #[serde(rename_all = "camelCase")]
    MissionPlayerJoined {
        player_id: PlayerId,
        username: String,
        players: Vec<MissionMember>,
    },

    /// Sent to the remaining lobby members when a player drops out.
    #[serde(rename = "mission.playerLeft")]
    #[serde(rename_all = "camelCase")]
    MissionPlayerLeft { player_id: PlayerId },

    /// A rejected intent: short human-readable reason, no automatic retry.
    #[serde(rename = "error")]
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// The channel a chat message targets. The server resolves `Hub` and
/// `Mission` against the sender's presence and falls back to `Global`
/// when the sender has no matching presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatChannel {
    Global,
    Hub,
    Mission,
}

/// A delivered chat message. `channel_id` is the raw hub or mission id
/// for scoped channels, absent for global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub channel_type: ChatChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<u64>,
    pub sender_id: PlayerId,
    pub sender_name: String,
    pub content: String,
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Missions
// ---------------------------------------------------------------------------

/// The durable description of a mission instance, as returned by the
/// persistence gateway when the record is created or read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionInfo {
    pub id: MissionId,
    #[serde(rename = "type")]
    pub kind: String,
    pub difficulty: u32,
    pub leader_id: PlayerId,
    pub max_players: usize,
}

/// One member of a forming mission lobby.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionMember {
    pub player_id: PlayerId,
    pub username: String,
    pub ready: bool,
}

// =========================================================================
// Tests
// =========================================================================
