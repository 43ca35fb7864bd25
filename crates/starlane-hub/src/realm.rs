//! The realm actor: single owner of all live presence state.
//!
//! One realm task owns the presence registry, the hub store, the mission
//! lobbies, and the outbound channel of every connected player. It
//! consumes a single command queue, so every mutation runs to completion
//! on one cooperative context — no locks, no half-applied state visible
//! to anyone. Per-player intent order is preserved because each
//! connection handler feeds this queue sequentially.
//!
//! Persistence is fire-and-forget: the in-memory mutation is complete and
//! visible before a flush task is spawned, and a failed flush is logged,
//! never rolled back. The only gateway calls that are awaited happen in
//! the connection handler *before* a command is enqueued (ship ownership,
//! mission record reads), so the realm itself never suspends mid-mutation.
//!
//! The tick broadcaster and idle reaper are `select!` arms of the same
//! task; they terminate only with the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::sync::{mpsc, oneshot};

use starlane_persist::{PersistError, PersistenceGateway, ShipRecord};
use starlane_protocol::{
    ChatChannel, ChatMessage, HubId, KinematicDelta, KinematicState, MissionInfo, MissionMember,
    PlayerId, ServerEvent,
};
use starlane_session::Identity;
use starlane_tick::{TickConfig, TickScheduler};

use crate::store::Admission;
use crate::{HubError, HubStore, Location, MissionLobbies, PresenceRegistry, RealmConfig};

/// Chat messages longer than this are silently dropped.
const MAX_CHAT_LEN: usize = 500;

/// Channel sender delivering outbound events to one player's connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands sent to the realm actor through its queue.
///
/// Most are fire-and-forget — outcomes surface as [`ServerEvent`]s on the
/// players' channels. `HubJoin` carries a reply channel because the
/// connection handler's session state machine needs the admission result.
pub(crate) enum RealmCommand {
    /// Register a freshly authenticated connection.
    Connect {
        identity: Identity,
        session_handle: String,
        sender: EventSender,
    },

    /// Admit a player into a hub. Ship ownership was already verified.
    HubJoin {
        player: PlayerId,
        hub_id: HubId,
        ship: ShipRecord,
        reply: oneshot::Sender<Result<(), HubError>>,
    },

    /// Merge a partial kinematic update and eager-relay it.
    HubUpdate {
        player: PlayerId,
        delta: KinematicDelta,
    },

    /// Explicitly leave the current hub.
    HubLeave { player: PlayerId },

    /// Send a chat message; the realm resolves the audience.
    ChatSend {
        player: PlayerId,
        channel: ChatChannel,
        message: String,
    },

    /// Open a lobby for a freshly created mission record.
    MissionOpen {
        leader: PlayerId,
        mission: MissionInfo,
    },

    /// Join a forming mission lobby (record already read back).
    MissionJoin {
        player: PlayerId,
        mission: MissionInfo,
    },

    /// Tear down a connection. `session_handle` guards against a stale
    /// handler tearing down a newer session for the same player.
    Disconnect {
        player: PlayerId,
        session_handle: String,
    },

    /// Read a player's current location (used by intent gating and tests).
    PresenceOf {
        player: PlayerId,
        reply: oneshot::Sender<Option<Location>>,
    },

    /// Read a copied hub snapshot (tests).
    HubSnapshot {
        hub_id: HubId,
        reply: oneshot::Sender<Vec<KinematicState>>,
    },

    /// Count live hub instances (tests).
    HubCount { reply: oneshot::Sender<usize> },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to the running realm actor. Cheap to clone — one per
/// connection handler plus one kept by the server.
#[derive(Clone)]
pub struct RealmHandle {
    sender: mpsc::Sender<RealmCommand>,
}

impl RealmHandle {
    async fn send(&self, cmd: RealmCommand) -> Result<(), HubError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| HubError::RealmClosed)
    }

    /// Registers an authenticated connection with the realm.
    pub async fn connect(
        &self,
        identity: Identity,
        session_handle: String,
        sender: EventSender,
    ) -> Result<(), HubError> {
        self.send(RealmCommand::Connect {
            identity,
            session_handle,
            sender,
        })
        .await
    }

    /// Requests admission into a hub and waits for the verdict.
    pub async fn hub_join(
        &self,
        player: PlayerId,
        hub_id: HubId,
        ship: ShipRecord,
    ) -> Result<(), HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RealmCommand::HubJoin {
            player,
            hub_id,
            ship,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::RealmClosed)?
    }

    /// Forwards a partial kinematic update.
    pub async fn hub_update(
        &self,
        player: PlayerId,
        delta: KinematicDelta,
    ) -> Result<(), HubError> {
        self.send(RealmCommand::HubUpdate { player, delta }).await
    }

    /// Leaves the current hub, if any.
    pub async fn hub_leave(&self, player: PlayerId) -> Result<(), HubError> {
        self.send(RealmCommand::HubLeave { player }).await
    }

    /// Sends a chat message.
    pub async fn chat_send(
        &self,
        player: PlayerId,
        channel: ChatChannel,
        message: String,
    ) -> Result<(), HubError> {
        self.send(RealmCommand::ChatSend {
            player,
            channel,
            message,
        })
        .await
    }

    /// Opens a mission lobby for a created record.
    pub async fn mission_open(
        &self,
        leader: PlayerId,
        mission: MissionInfo,
    ) -> Result<(), HubError> {
        self.send(RealmCommand::MissionOpen { leader, mission }).await
    }

    /// Joins a forming mission lobby.
    pub async fn mission_join(
        &self,
        player: PlayerId,
        mission: MissionInfo,
    ) -> Result<(), HubError> {
        self.send(RealmCommand::MissionJoin { player, mission }).await
    }

    /// Tears down a connection's state. Idempotent; a stale handle for a
    /// superseded session is ignored.
    pub async fn disconnect(
        &self,
        player: PlayerId,
        session_handle: String,
    ) -> Result<(), HubError> {
        self.send(RealmCommand::Disconnect {
            player,
            session_handle,
        })
        .await
    }

    /// Reads a player's current location.
    pub async fn presence_of(&self, player: PlayerId) -> Result<Option<Location>, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RealmCommand::PresenceOf {
            player,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::RealmClosed)
    }

    /// Reads a copied snapshot of a hub's occupants.
    pub async fn hub_snapshot(&self, hub_id: HubId) -> Result<Vec<KinematicState>, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RealmCommand::HubSnapshot {
            hub_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::RealmClosed)
    }

    /// Counts live hub instances.
    pub async fn hub_count(&self) -> Result<usize, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RealmCommand::HubCount { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| HubError::RealmClosed)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// A connected player as the realm sees them.
struct PlayerEntry {
    identity: Identity,
    session_handle: String,
    sender: EventSender,
}

/// The realm actor state. Runs inside one Tokio task.
struct RealmActor<P: PersistenceGateway> {
    config: RealmConfig,
    presence: PresenceRegistry,
    store: HubStore,
    missions: MissionLobbies,
    players: HashMap<PlayerId, PlayerEntry>,
    gateway: Arc<P>,
    chat_seq: u64,
}

/// Spawns the realm actor and returns a handle to it.
pub fn spawn_realm<P: PersistenceGateway>(config: RealmConfig, gateway: Arc<P>) -> RealmHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer);

    let actor = RealmActor {
        store: HubStore::new(config.hub.clone()),
        presence: PresenceRegistry::new(),
        missions: MissionLobbies::new(),
        players: HashMap::new(),
        gateway,
        chat_seq: 0,
        config,
    };

    tokio::spawn(actor.run(rx));

    RealmHandle { sender: tx }
}

impl<P: PersistenceGateway> RealmActor<P> {
    async fn run(mut self, mut receiver: mpsc::Receiver<RealmCommand>) {
        tracing::info!(
            tick_rate_hz = self.config.tick_rate_hz,
            max_occupants = self.config.hub.max_occupants,
            "realm started"
        );

        let mut ticker = TickScheduler::new(TickConfig::with_rate(self.config.tick_rate_hz));
        let mut reaper = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.reap_interval,
            self.config.reap_interval,
        );
        reaper.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    // Every handle dropped — the server is gone.
                    None => break,
                },
                _ = ticker.wait_for_tick() => {
                    self.broadcast_tick();
                    ticker.record_tick_end();
                }
                _ = reaper.tick() => self.reap_idle(),
            }
        }

        tracing::info!("realm stopped");
    }

    fn handle_command(&mut self, cmd: RealmCommand) {
        match cmd {
            RealmCommand::Connect {
                identity,
                session_handle,
                sender,
            } => self.handle_connect(identity, session_handle, sender),
            RealmCommand::HubJoin {
                player,
                hub_id,
                ship,
                reply,
            } => {
                let result = self.handle_hub_join(player, hub_id, ship);
                let _ = reply.send(result);
            }
            RealmCommand::HubUpdate { player, delta } => self.handle_hub_update(player, delta),
            RealmCommand::HubLeave { player } => self.handle_hub_leave(player),
            RealmCommand::ChatSend {
                player,
                channel,
                message,
            } => self.handle_chat(player, channel, message),
            RealmCommand::MissionOpen { leader, mission } => {
                self.handle_mission_open(leader, mission);
            }
            RealmCommand::MissionJoin { player, mission } => {
                self.handle_mission_join(player, mission);
            }
            RealmCommand::Disconnect {
                player,
                session_handle,
            } => self.handle_disconnect(player, session_handle),
            RealmCommand::PresenceOf { player, reply } => {
                let _ = reply.send(self.presence.location(player));
            }
            RealmCommand::HubSnapshot { hub_id, reply } => {
                let _ = reply.send(self.store.snapshot(hub_id));
            }
            RealmCommand::HubCount { reply } => {
                let _ = reply.send(self.store.hub_count());
            }
        }
    }

    // -- Connection lifecycle ---------------------------------------------

    fn handle_connect(&mut self, identity: Identity, session_handle: String, sender: EventSender) {
        let player = identity.player_id;
        let username = identity.username.clone();

        let event = ServerEvent::Connected {
            user_id: player,
            username: username.clone(),
        };
        let replaced = self
            .players
            .insert(
                player,
                PlayerEntry {
                    identity,
                    session_handle: session_handle.clone(),
                    sender,
                },
            )
            .is_some();
        if replaced {
            tracing::warn!(%player, "new connection replaced an existing session");
        }

        self.spawn_flush("upsert_presence", {
            let gw = Arc::clone(&self.gateway);
            async move { gw.upsert_presence(player, session_handle).await }
        });
        self.spawn_flush("set_online", {
            let gw = Arc::clone(&self.gateway);
            async move { gw.set_online(player, true).await }
        });

        self.send_to(player, event);
        tracing::info!(%player, %username, "player connected");
    }

    fn handle_disconnect(&mut self, player: PlayerId, session_handle: String) {
        // A handler tearing down after its player already reconnected
        // must not touch the newer session's state.
        match self.players.get(&player) {
            Some(entry) if entry.session_handle == session_handle => {}
            _ => {
                tracing::debug!(%player, "stale or duplicate disconnect ignored");
                return;
            }
        }

        self.vacate_hub(player);
        self.drop_from_mission(player);
        self.players.remove(&player);

        self.spawn_flush("set_online", {
            let gw = Arc::clone(&self.gateway);
            async move { gw.set_online(player, false).await }
        });
        self.spawn_flush("clear_presence", {
            let gw = Arc::clone(&self.gateway);
            async move { gw.clear_presence(player).await }
        });

        tracing::info!(%player, "player disconnected");
    }

    // -- Hub intents -------------------------------------------------------

    fn handle_hub_join(
        &mut self,
        player: PlayerId,
        hub_id: HubId,
        ship: ShipRecord,
    ) -> Result<(), HubError> {
        let Some(entry) = self.players.get(&player) else {
            return Err(HubError::NotConnected(player));
        };
        let username = entry.identity.username.clone();

        // Capacity is checked before anything is mutated: a rejected join
        // leaves the player exactly where they were, prior hub included.
        if !self.store.can_admit(hub_id, player) {
            tracing::debug!(%player, %hub_id, "join rejected, hub full");
            return Err(HubError::HubFull(hub_id));
        }

        // Implicit leave of any prior hub. No position flush on this
        // path — the flush belongs to explicit leave and disconnect.
        if let Some(Location::Hub { hub_id: prior, .. }) = self.presence.location(player) {
            if prior != hub_id && self.store.leave(prior, player).is_some() {
                self.broadcast_to_hub(prior, &ServerEvent::HubPlayerLeft { player_id: player });
                tracing::debug!(%player, %prior, "implicitly left hub");
            }
        }

        let state = KinematicState {
            player_id: player,
            username,
            ship_id: ship.id,
            ship_name: ship.name,
            x: ship.position_x.unwrap_or_else(spawn_coord),
            y: ship.position_y.unwrap_or_else(spawn_coord),
            rotation: ship.rotation.unwrap_or(0.0),
            velocity_x: 0.0,
            velocity_y: 0.0,
        };
        let ship_id = state.ship_id;

        let admission = self.store.join(hub_id, state.clone())?;
        self.presence
            .set_location(player, Location::Hub { hub_id, ship_id });

        self.spawn_flush("update_presence_location", {
            let gw = Arc::clone(&self.gateway);
            async move { gw.update_presence_location(player, hub_id, ship_id).await }
        });
        self.spawn_flush("update_ship_location", {
            let gw = Arc::clone(&self.gateway);
            async move { gw.update_ship_location(ship_id, hub_id).await }
        });

        self.send_to(
            player,
            ServerEvent::HubJoined {
                hub_id,
                players: self.store.snapshot(hub_id),
                your_state: state.clone(),
            },
        );
        // Fresh occupants are announced; an idempotent re-join is not —
        // to everyone else, the player never left.
        if admission == Admission::New {
            self.broadcast_to_hub_except(hub_id, &ServerEvent::HubPlayerJoined(state), player);
        }

        tracing::info!(
            %player,
            %hub_id,
            occupants = self.store.occupant_count(hub_id),
            "player joined hub"
        );
        Ok(())
    }

    fn handle_hub_update(&mut self, player: PlayerId, delta: KinematicDelta) {
        let Some(hub_id) = self.presence.location(player).and_then(|l| l.hub_id()) else {
            // Late update racing a leave or disconnect: drop silently.
            return;
        };
        if !self.store.update(hub_id, player, &delta) {
            return;
        }

        // Eager relay to the other occupants; the periodic tick remains
        // the reconciling snapshot.
        self.broadcast_to_hub_except(
            hub_id,
            &ServerEvent::HubPlayerUpdate {
                player_id: player,
                delta,
            },
            player,
        );
    }

    fn handle_hub_leave(&mut self, player: PlayerId) {
        self.vacate_hub(player);
    }

    /// Shared teardown for explicit leave, disconnect, and nothing else:
    /// removes occupancy, flushes the final position, tells the hub.
    fn vacate_hub(&mut self, player: PlayerId) {
        let Some(Location::Hub { hub_id, ship_id }) = self.presence.clear(player) else {
            return;
        };

        if let Some(last) = self.store.leave(hub_id, player) {
            self.spawn_flush("flush_ship_position", {
                let gw = Arc::clone(&self.gateway);
                async move {
                    gw.flush_ship_position(ship_id, last.x, last.y, last.rotation)
                        .await
                }
            });
            self.broadcast_to_hub(hub_id, &ServerEvent::HubPlayerLeft { player_id: player });
            tracing::info!(
                %player,
                %hub_id,
                occupants = self.store.occupant_count(hub_id),
                "player left hub"
            );
        }
    }

    // -- Chat --------------------------------------------------------------

    fn handle_chat(&mut self, player: PlayerId, channel: ChatChannel, message: String) {
        if message.is_empty() || message.chars().count() > MAX_CHAT_LEN {
            tracing::debug!(%player, len = message.chars().count(), "chat message dropped");
            return;
        }
        let Some(entry) = self.players.get(&player) else {
            return;
        };
        let sender_name = entry.identity.username.clone();

        // Resolve the audience from presence; requests for a scope the
        // player isn't in fall back to global.
        let (channel_type, channel_id, audience) = match channel {
            ChatChannel::Hub => match self.presence.location(player).and_then(|l| l.hub_id()) {
                Some(hub_id) => (
                    ChatChannel::Hub,
                    Some(hub_id.0),
                    self.store.occupant_ids(hub_id),
                ),
                None => self.global_audience(),
            },
            ChatChannel::Mission => match self.missions.lobby_of(player) {
                Some(mission_id) => (
                    ChatChannel::Mission,
                    Some(mission_id.0),
                    self.missions
                        .members(mission_id)
                        .map(|members| members.iter().map(|m| m.player_id).collect())
                        .unwrap_or_default(),
                ),
                None => self.global_audience(),
            },
            ChatChannel::Global => self.global_audience(),
        };

        self.chat_seq += 1;
        let timestamp = now_millis();
        let chat = ChatMessage {
            id: format!("{timestamp:x}-{:x}", self.chat_seq),
            channel_type,
            channel_id,
            sender_id: player,
            sender_name,
            content: message,
            timestamp,
        };

        self.spawn_flush("record_chat_message", {
            let gw = Arc::clone(&self.gateway);
            let chat = chat.clone();
            async move { gw.record_chat_message(chat).await }
        });

        // The sender is part of the audience on every channel.
        let event = ServerEvent::ChatMessage(chat);
        for recipient in audience {
            self.send_to(recipient, event.clone());
        }
    }

    fn global_audience(&self) -> (ChatChannel, Option<u64>, Vec<PlayerId>) {
        (
            ChatChannel::Global,
            None,
            self.players.keys().copied().collect(),
        )
    }

    // -- Missions ----------------------------------------------------------

    fn handle_mission_open(&mut self, leader: PlayerId, mission: MissionInfo) {
        let Some(entry) = self.players.get(&leader) else {
            return;
        };
        let member = MissionMember {
            player_id: leader,
            username: entry.identity.username.clone(),
            ready: false,
        };

        let mission_id = mission.id;
        self.missions.open(mission.clone(), member);
        self.send_to(leader, ServerEvent::MissionCreated { mission });
        tracing::info!(%leader, %mission_id, "mission lobby opened");
    }

    fn handle_mission_join(&mut self, player: PlayerId, mission: MissionInfo) {
        let Some(entry) = self.players.get(&player) else {
            return;
        };
        let username = entry.identity.username.clone();
        let member = MissionMember {
            player_id: player,
            username: username.clone(),
            ready: false,
        };

        let mission_id = mission.id;
        match self.missions.join(mission_id, member) {
            Ok(lobby) => {
                let members = lobby.members();
                let member_ids = lobby.member_ids();

                self.spawn_flush("update_mission_players", {
                    let gw = Arc::clone(&self.gateway);
                    let ids = member_ids.clone();
                    async move { gw.update_mission_players(mission_id, ids).await }
                });

                let event = ServerEvent::MissionPlayerJoined {
                    player_id: player,
                    username,
                    players: members,
                };
                for recipient in member_ids {
                    self.send_to(recipient, event.clone());
                }
                tracing::info!(%player, %mission_id, "player joined mission lobby");
            }
            Err(e) => {
                self.send_to(
                    player,
                    ServerEvent::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    fn drop_from_mission(&mut self, player: PlayerId) {
        let Some((mission_id, remaining)) = self.missions.remove_player(player) else {
            return;
        };

        self.spawn_flush("update_mission_players", {
            let gw = Arc::clone(&self.gateway);
            let ids = remaining.clone();
            async move { gw.update_mission_players(mission_id, ids).await }
        });

        let event = ServerEvent::MissionPlayerLeft { player_id: player };
        for recipient in remaining {
            self.send_to(recipient, event.clone());
        }
    }

    // -- Periodic tasks ----------------------------------------------------

    /// One broadcast tick: push a copied snapshot of every occupied hub
    /// to each of its occupants. Empty hubs are skipped. A dead channel
    /// on one session never affects the rest of the tick.
    fn broadcast_tick(&self) {
        let timestamp = now_millis();
        for (_, hub) in self.store.iter() {
            if hub.is_empty() {
                continue;
            }
            let event = ServerEvent::HubTick {
                timestamp,
                players: hub.snapshot(),
            };
            for player in hub.occupant_ids() {
                self.send_to(player, event.clone());
            }
        }
    }

    /// One reaper sweep: evict hubs that have sat empty past the grace
    /// window. Pure memory reclamation — hub instances are never durable.
    ///
    /// Reads the clock through tokio so the sweep follows a mocked clock
    /// under `start_paused` tests.
    fn reap_idle(&mut self) {
        let now = tokio::time::Instant::now().into_std();
        let evicted = self.store.reap(now, self.config.hub.idle_grace);
        for hub_id in evicted {
            tracing::info!(%hub_id, "reaped idle hub");
        }
    }

    // -- Delivery helpers --------------------------------------------------

    /// Sends an event to one player. Silently drops if their channel is
    /// gone (connection already tearing down).
    fn send_to(&self, player: PlayerId, event: ServerEvent) {
        if let Some(entry) = self.players.get(&player) {
            let _ = entry.sender.send(event);
        }
    }

    fn broadcast_to_hub(&self, hub_id: HubId, event: &ServerEvent) {
        for player in self.store.occupant_ids(hub_id) {
            self.send_to(player, event.clone());
        }
    }

    fn broadcast_to_hub_except(&self, hub_id: HubId, event: &ServerEvent, except: PlayerId) {
        for player in self.store.occupant_ids(hub_id) {
            if player != except {
                self.send_to(player, event.clone());
            }
        }
    }

    /// Spawns a fire-and-forget persistence call. In-memory state is
    /// already updated by the time this runs; failures are logged and
    /// never rolled back (at-most-once durability).
    fn spawn_flush<F>(&self, op: &'static str, fut: F)
    where
        F: Future<Output = Result<(), PersistError>> + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                tracing::warn!(error = %e, op, "persistence flush failed");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn coordinate for a ship with no stored position.
fn spawn_coord() -> f64 {
    rand::rng().random_range(0.0..1000.0)
}

/// Unix milliseconds for wire timestamps.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
