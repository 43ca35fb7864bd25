//! Per-connection handler: the `auth` handshake, intent routing, and
//! teardown.
//!
//! Each accepted connection runs this handler in its own task:
//!
//!   1. First frame must be the `auth` intent → validate the token
//!   2. Register with the realm → `connected` event
//!   3. Loop: decode intents, route them to the realm in arrival order
//!   4. On close/timeout/error: tear down exactly once (drop guard)
//!
//! The handler owns the session state machine and the player's outbound
//! pump. Intents are forwarded sequentially, which is what preserves the
//! per-player ordering guarantee end to end.

use std::sync::Arc;

use starlane_hub::{EventSender, HubError, RealmHandle};
use starlane_persist::PersistenceGateway;
use starlane_protocol::{ClientIntent, Codec, JsonCodec, PlayerId, ProtocolError, ServerEvent};
use starlane_session::{Authenticator, ConnectionSession, Identity};
use starlane_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::StarlaneError;
use crate::server::ServerState;

/// Drop guard that tears the player's realm state down when the handler
/// exits — the only teardown site, and it fires even on panic. The
/// session handle lets the realm ignore the teardown if this player has
/// already been superseded by a newer connection.
struct DisconnectGuard {
    player: PlayerId,
    session_handle: String,
    realm: RealmHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let realm = self.realm.clone();
        let player = self.player;
        let session_handle = std::mem::take(&mut self.session_handle);
        tokio::spawn(async move {
            let _ = realm.disconnect(player, session_handle).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, P>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, P>>,
) -> Result<(), StarlaneError>
where
    A: Authenticator,
    P: PersistenceGateway,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let mut session = ConnectionSession::new();

    // --- Step 1: auth handshake ---
    let identity = match authenticate(&conn, &state).await {
        Ok(identity) => identity,
        Err(e) => {
            // Refused: no state was created, nothing to tear down.
            let _ = conn.close().await;
            return Err(e);
        }
    };
    session.authenticate()?;

    let player = identity.player_id;
    tracing::info!(%conn_id, %player, username = %identity.username, "player authenticated");

    // --- Step 2: register with the realm ---
    let (tx, rx) = mpsc::unbounded_channel();
    let session_handle = conn_id.to_string();
    state
        .realm
        .connect(identity, session_handle.clone(), tx.clone())
        .await?;
    let _guard = DisconnectGuard {
        player,
        session_handle,
        realm: state.realm.clone(),
    };

    // --- Step 3: outbound pump (events + server pings) ---
    tokio::spawn(outbound_pump(
        conn.clone(),
        rx,
        state.codec,
        state.config.ping_interval,
    ));

    // --- Step 4: inbound loop with liveness checks ---
    let mut liveness = tokio::time::interval(state.config.liveness_timeout / 2);
    liveness.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            frame = conn.recv() => match frame {
                Ok(Some(data)) => {
                    let intent: ClientIntent = match state.codec.decode(&data) {
                        Ok(intent) => intent,
                        Err(e) => {
                            // Malformed frames are skipped, not fatal.
                            tracing::debug!(%player, error = %e, "undecodable frame skipped");
                            continue;
                        }
                    };
                    match dispatch_intent(&mut session, intent, player, &state, &tx).await {
                        Ok(true) => break Ok(()),
                        Ok(false) => {}
                        Err(e) => break Err(e),
                    }
                }
                Ok(None) => {
                    tracing::info!(%player, "connection closed");
                    break Ok(());
                }
                Err(e) => {
                    tracing::debug!(%player, error = %e, "recv error");
                    break Ok(());
                }
            },
            _ = liveness.tick() => {
                if conn.last_activity().elapsed() > state.config.liveness_timeout {
                    tracing::info!(%player, "connection timed out (no activity)");
                    break Ok(());
                }
            }
        }
    };

    // Teardown: the session machine closes, our sender drops, and the
    // guard fires the realm disconnect. Once the realm releases its
    // sender too, the pump drains out and closes the socket.
    session.close();
    drop(tx);
    result
}

/// Performs the auth handshake: first frame must be `auth` within the
/// handshake timeout, and the token must validate.
async fn authenticate<A, P>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, P>>,
) -> Result<Identity, StarlaneError>
where
    A: Authenticator,
    P: PersistenceGateway,
{
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidIntent("connection closed before auth".into()).into());
        }
        Ok(Err(e)) => return Err(StarlaneError::Transport(e)),
        Err(_) => {
            send_direct(conn, &state.codec, "Authentication required").await;
            return Err(ProtocolError::InvalidIntent("auth handshake timed out".into()).into());
        }
    };

    let intent: ClientIntent = state.codec.decode(&data)?;
    let token = match intent {
        ClientIntent::Authenticate { token } => token,
        _ => {
            send_direct(conn, &state.codec, "Authentication required").await;
            return Err(ProtocolError::InvalidIntent("first intent must be auth".into()).into());
        }
    };

    match state.auth.authenticate(&token).await {
        Ok(identity) => Ok(identity),
        Err(e) => {
            send_direct(conn, &state.codec, "Invalid token").await;
            Err(StarlaneError::Session(e))
        }
    }
}

/// Routes one decoded intent. Returns `Ok(true)` when the connection
/// should close.
async fn dispatch_intent<A, P>(
    session: &mut ConnectionSession,
    intent: ClientIntent,
    player: PlayerId,
    state: &Arc<ServerState<A, P>>,
    tx: &EventSender,
) -> Result<bool, StarlaneError>
where
    A: Authenticator,
    P: PersistenceGateway,
{
    match intent {
        ClientIntent::Authenticate { .. } => {
            tracing::debug!(%player, "duplicate auth intent ignored");
        }

        ClientIntent::HubJoin { hub_id, ship_id } => {
            // Ownership check is the one persistence read the join path
            // waits for. Its failure reaches the caller only.
            match state.gateway.get_ship_if_owned(ship_id, player).await {
                Ok(Some(ship)) => match state.realm.hub_join(player, hub_id, ship).await {
                    Ok(()) => {
                        let _ = session.enter_hub(hub_id);
                    }
                    Err(HubError::HubFull(_)) => push_error(tx, "Hub is full"),
                    Err(e) => {
                        tracing::debug!(%player, %hub_id, error = %e, "hub join failed");
                        push_error(tx, "Failed to join hub");
                    }
                },
                Ok(None) => push_error(tx, "Ship not found"),
                Err(e) => {
                    tracing::warn!(%player, error = %e, "ship ownership check failed");
                    push_error(tx, "Failed to join hub");
                }
            }
        }

        ClientIntent::HubUpdate(delta) => {
            // Valid only while in a hub; out-of-hub updates are dropped
            // here, and the realm drops stale ones the same way.
            if session.hub().is_some() {
                state.realm.hub_update(player, delta).await?;
            }
        }

        ClientIntent::HubLeave => {
            state.realm.hub_leave(player).await?;
            session.leave_hub();
        }

        ClientIntent::ChatSend { channel, message } => {
            state.realm.chat_send(player, channel, message).await?;
        }

        ClientIntent::MissionCreate { kind, difficulty } => {
            let location = state.realm.presence_of(player).await?;
            if location.and_then(|l| l.ship_id()).is_none() {
                push_error(tx, "No active ship");
                return Ok(false);
            }
            match state
                .gateway
                .create_mission(player, &kind, difficulty.unwrap_or(1))
                .await
            {
                Ok(mission) => state.realm.mission_open(player, mission).await?,
                Err(e) => {
                    tracing::warn!(%player, error = %e, "mission create failed");
                    push_error(tx, "Failed to create mission");
                }
            }
        }

        ClientIntent::MissionJoin { mission_id } => {
            match state.gateway.get_forming_mission(mission_id).await {
                Ok(Some(mission)) => state.realm.mission_join(player, mission).await?,
                Ok(None) => push_error(tx, "Mission not found or already started"),
                Err(e) => {
                    tracing::warn!(%player, %mission_id, error = %e, "mission lookup failed");
                    push_error(tx, "Failed to join mission");
                }
            }
        }

        ClientIntent::Disconnect => {
            tracing::info!(%player, "client requested disconnect");
            return Ok(true);
        }
    }

    Ok(false)
}

/// Drains the player's event channel onto the socket and keeps the peer
/// alive with periodic pings. Ends when every sender is gone (handler
/// and realm both released theirs) or the socket dies.
async fn outbound_pump(
    conn: WebSocketConnection,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    codec: JsonCodec,
    ping_interval: std::time::Duration,
) {
    let mut pings = tokio::time::interval_at(
        tokio::time::Instant::now() + ping_interval,
        ping_interval,
    );
    pings.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => match codec.encode(&event) {
                    Ok(bytes) => {
                        if conn.send(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to encode outbound event"),
                },
                None => break,
            },
            _ = pings.tick() => {
                if conn.ping().await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = conn.close().await;
}

/// Queues an `error` event onto the player's outbound channel.
fn push_error(tx: &EventSender, message: &str) {
    let _ = tx.send(ServerEvent::Error {
        message: message.to_string(),
    });
}

/// Sends an `error` event straight down the socket — used before the
/// outbound pump exists (handshake failures).
async fn send_direct(conn: &WebSocketConnection, codec: &JsonCodec, message: &str) {
    if let Ok(bytes) = codec.encode(&ServerEvent::Error {
        message: message.to_string(),
    }) {
        let _ = conn.send(&bytes).await;
    }
}
