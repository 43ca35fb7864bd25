//! Integration tests for the realm actor, driven through `RealmHandle`
//! with an in-memory gateway on the other side.
//!
//! All tests run with `start_paused = true`: the mocked clock advances
//! only when every task is idle, so "expect no event" assertions resolve
//! instantly and tick/reaper timing is deterministic. Broadcast ticking
//! is disabled (`tick_rate_hz: 0`) except in the tests that assert on it,
//! so event streams stay free of tick noise.

use std::sync::Arc;
use std::time::Duration;

use starlane_hub::{HubConfig, Location, RealmConfig, RealmHandle, spawn_realm};
use starlane_persist::{MemoryGateway, PersistenceGateway, ShipRecord};
use starlane_protocol::{
    ChatChannel, HubId, KinematicDelta, KinematicState, MissionId, MissionInfo, PlayerId,
    ServerEvent, ShipId,
};
use starlane_session::Identity;
use tokio::sync::mpsc::UnboundedReceiver;

// =========================================================================
// Helpers
// =========================================================================

fn quiet_config(max_occupants: usize) -> RealmConfig {
    RealmConfig {
        hub: HubConfig {
            max_occupants,
            idle_grace: Duration::from_secs(60),
        },
        tick_rate_hz: 0,
        reap_interval: Duration::from_secs(3600),
        command_buffer: 64,
    }
}

fn setup(config: RealmConfig) -> (RealmHandle, MemoryGateway) {
    let gateway = MemoryGateway::new();
    let realm = spawn_realm(config, Arc::new(gateway.clone()));
    (realm, gateway)
}

fn ship(id: u64, name: &str) -> ShipRecord {
    ShipRecord {
        id: ShipId(id),
        name: name.into(),
        position_x: Some(100.0),
        position_y: Some(200.0),
        rotation: Some(0.0),
    }
}

/// Registers a player with the realm and consumes their `connected` event.
async fn connect(realm: &RealmHandle, id: u64, name: &str) -> UnboundedReceiver<ServerEvent> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    realm
        .connect(
            Identity {
                player_id: PlayerId(id),
                username: name.into(),
            },
            format!("conn-{id}"),
            tx,
        )
        .await
        .expect("connect should succeed");

    let event = recv(&mut rx).await;
    assert!(
        matches!(event, ServerEvent::Connected { user_id, .. } if user_id == PlayerId(id)),
        "expected connected event, got {event:?}"
    );
    rx
}

/// Receives the next event or panics. The generous timeout only fires
/// when no event will ever come (instantly, under the paused clock).
async fn recv(rx: &mut UnboundedReceiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Asserts that no event arrives.
async fn expect_silence(rx: &mut UnboundedReceiver<ServerEvent>) {
    let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    if let Ok(event) = result {
        panic!("expected no event, got {event:?}");
    }
}

/// Drains events until a tick arrives.
async fn recv_until_tick(rx: &mut UnboundedReceiver<ServerEvent>) -> (u64, Vec<KinematicState>) {
    for _ in 0..32 {
        if let ServerEvent::HubTick { timestamp, players } = recv(rx).await {
            return (timestamp, players);
        }
    }
    panic!("no hub.tick among the first 32 events");
}

/// Polls until a fire-and-forget flush lands in the gateway.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..256 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

fn hub(id: u64) -> HubId {
    HubId(id)
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_marks_player_online_and_present() {
    let (realm, gateway) = setup(quiet_config(100));

    let _rx = connect(&realm, 1, "ada").await;

    wait_until(|| gateway.is_online(pid(1))).await;
    wait_until(|| gateway.presence_row(pid(1)).is_some()).await;
    assert_eq!(
        gateway.presence_row(pid(1)).unwrap().session_handle,
        "conn-1"
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_clears_presence_and_online_flag() {
    let (realm, gateway) = setup(quiet_config(100));
    let _rx = connect(&realm, 1, "ada").await;
    wait_until(|| gateway.is_online(pid(1))).await;

    realm.disconnect(pid(1), "conn-1".into()).await.unwrap();

    wait_until(|| !gateway.is_online(pid(1))).await;
    wait_until(|| gateway.presence_row(pid(1)).is_none()).await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_disconnect_does_not_touch_newer_session() {
    let (realm, gateway) = setup(quiet_config(100));
    let _old = connect(&realm, 1, "ada").await;

    // Same player reconnects before the old handler tears down.
    let (tx, _new_rx) = tokio::sync::mpsc::unbounded_channel();
    realm
        .connect(
            Identity {
                player_id: pid(1),
                username: "ada".into(),
            },
            "conn-99".into(),
            tx,
        )
        .await
        .unwrap();

    // The old handler's teardown carries the old handle and must be a no-op.
    realm.disconnect(pid(1), "conn-1".into()).await.unwrap();

    wait_until(|| gateway.is_online(pid(1))).await;
    assert!(gateway.is_online(pid(1)), "newer session must stay online");
}

// =========================================================================
// Hub join
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_join_emits_hub_joined_with_self() {
    let (realm, _gateway) = setup(quiet_config(100));
    let mut rx = connect(&realm, 1, "ada").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();

    match recv(&mut rx).await {
        ServerEvent::HubJoined {
            hub_id,
            players,
            your_state,
        } => {
            assert_eq!(hub_id, hub(1));
            assert_eq!(players.len(), 1);
            assert_eq!(your_state.player_id, pid(1));
            assert_eq!(your_state.username, "ada");
            assert_eq!(your_state.ship_name, "Sparrow");
            // Stored position is used as the spawn point.
            assert_eq!(your_state.x, 100.0);
            assert_eq!(your_state.y, 200.0);
            assert_eq!(your_state.velocity_x, 0.0);
        }
        other => panic!("expected hub.joined, got {other:?}"),
    }

    assert_eq!(
        realm.presence_of(pid(1)).await.unwrap(),
        Some(Location::Hub {
            hub_id: hub(1),
            ship_id: ShipId(10)
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_join_notifies_first_occupant() {
    let (realm, _gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    let _ = recv(&mut rx_a).await; // ada's hub.joined

    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();

    // Ada sees brit arrive.
    match recv(&mut rx_a).await {
        ServerEvent::HubPlayerJoined(state) => {
            assert_eq!(state.player_id, pid(2));
            assert_eq!(state.username, "brit");
        }
        other => panic!("expected hub.playerJoined, got {other:?}"),
    }

    // Brit's own snapshot holds both.
    match recv(&mut rx_b).await {
        ServerEvent::HubJoined { players, .. } => {
            let mut ids: Vec<u64> = players.iter().map(|p| p.player_id.0).collect();
            ids.sort_unstable();
            assert_eq!(ids, vec![1, 2]);
        }
        other => panic!("expected hub.joined, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_join_full_hub_is_rejected_without_side_effects() {
    let (realm, _gateway) = setup(quiet_config(1));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    let _ = recv(&mut rx_a).await;

    let result = realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await;

    assert!(
        matches!(result, Err(starlane_hub::HubError::HubFull(h)) if h == hub(1)),
        "join at capacity must be rejected"
    );
    // Occupancy unchanged, rejected player has no presence, nobody was
    // told anything.
    assert_eq!(realm.hub_snapshot(hub(1)).await.unwrap().len(), 1);
    assert_eq!(realm.presence_of(pid(2)).await.unwrap(), None);
    expect_silence(&mut rx_a).await;
    expect_silence(&mut rx_b).await;
}

#[tokio::test(start_paused = true)]
async fn test_rejected_join_keeps_prior_hub() {
    // Brit sits in hub 2; her failed move to the full hub 1 must leave
    // her exactly where she was.
    let (realm, _gateway) = setup(quiet_config(1));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    realm.hub_join(pid(2), hub(2), ship(20, "Falcon")).await.unwrap();
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_b).await;

    let result = realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await;

    assert!(matches!(result, Err(starlane_hub::HubError::HubFull(_))));
    assert_eq!(
        realm.presence_of(pid(2)).await.unwrap(),
        Some(Location::Hub {
            hub_id: hub(2),
            ship_id: ShipId(20)
        })
    );
    assert_eq!(realm.hub_snapshot(hub(2)).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_same_hub_is_idempotent() {
    let (realm, _gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    let _ = recv(&mut rx_a).await;
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();
    let _ = recv(&mut rx_a).await; // playerJoined(brit)
    let _ = recv(&mut rx_b).await; // hub.joined

    // Brit re-issues the join for the hub she is already in.
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();

    match recv(&mut rx_b).await {
        ServerEvent::HubJoined { players, .. } => assert_eq!(players.len(), 2),
        other => panic!("expected hub.joined, got {other:?}"),
    }
    // No duplicate occupant, and ada hears nothing — to her, brit never
    // left.
    assert_eq!(realm.hub_snapshot(hub(1)).await.unwrap().len(), 2);
    expect_silence(&mut rx_a).await;
}

#[tokio::test(start_paused = true)]
async fn test_switching_hubs_implicitly_leaves_the_first() {
    let (realm, gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_b).await;

    realm.hub_join(pid(1), hub(2), ship(10, "Sparrow")).await.unwrap();

    // Brit sees ada leave hub 1.
    match recv(&mut rx_b).await {
        ServerEvent::HubPlayerLeft { player_id } => assert_eq!(player_id, pid(1)),
        other => panic!("expected hub.playerLeft, got {other:?}"),
    }
    // Exactly one hub membership at any instant.
    let h1: Vec<u64> = realm
        .hub_snapshot(hub(1))
        .await
        .unwrap()
        .iter()
        .map(|p| p.player_id.0)
        .collect();
    let h2: Vec<u64> = realm
        .hub_snapshot(hub(2))
        .await
        .unwrap()
        .iter()
        .map(|p| p.player_id.0)
        .collect();
    assert_eq!(h1, vec![2]);
    assert_eq!(h2, vec![1]);

    // An implicit leave does not flush the ship position.
    tokio::task::yield_now().await;
    assert!(gateway.flushed_positions().is_empty());
}

// =========================================================================
// Hub update
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_update_relays_to_others_only() {
    let (realm, _gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_b).await;

    realm
        .hub_update(
            pid(1),
            KinematicDelta {
                x: Some(10.0),
                ..KinematicDelta::default()
            },
        )
        .await
        .unwrap();

    // Brit gets the eager relay with exactly the sent fields.
    match recv(&mut rx_b).await {
        ServerEvent::HubPlayerUpdate { player_id, delta } => {
            assert_eq!(player_id, pid(1));
            assert_eq!(delta.x, Some(10.0));
            assert_eq!(delta.y, None);
        }
        other => panic!("expected hub.playerUpdate, got {other:?}"),
    }
    // The sender's own relay is not echoed back.
    expect_silence(&mut rx_a).await;

    // The authoritative map took the merge.
    let snap = realm.hub_snapshot(hub(1)).await.unwrap();
    let ada = snap.iter().find(|p| p.player_id == pid(1)).unwrap();
    assert_eq!(ada.x, 10.0);
    assert_eq!(ada.y, 200.0);
}

#[tokio::test(start_paused = true)]
async fn test_update_without_membership_is_silent_noop() {
    let (realm, _gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();
    let _ = recv(&mut rx_b).await;

    // Ada never joined; her update must create nothing and reach no one.
    realm
        .hub_update(
            pid(1),
            KinematicDelta {
                x: Some(10.0),
                ..KinematicDelta::default()
            },
        )
        .await
        .unwrap();

    expect_silence(&mut rx_a).await;
    expect_silence(&mut rx_b).await;
    assert_eq!(realm.hub_snapshot(hub(1)).await.unwrap().len(), 1);
}

// =========================================================================
// Leave and disconnect
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_leave_broadcasts_and_flushes_position() {
    let (realm, gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_b).await;

    realm
        .hub_update(
            pid(1),
            KinematicDelta {
                x: Some(42.0),
                rotation: Some(1.5),
                ..KinematicDelta::default()
            },
        )
        .await
        .unwrap();
    let _ = recv(&mut rx_b).await; // the relay

    realm.hub_leave(pid(1)).await.unwrap();

    match recv(&mut rx_b).await {
        ServerEvent::HubPlayerLeft { player_id } => assert_eq!(player_id, pid(1)),
        other => panic!("expected hub.playerLeft, got {other:?}"),
    }
    // The final position, not the spawn position, is flushed.
    wait_until(|| !gateway.flushed_positions().is_empty()).await;
    assert_eq!(
        gateway.flushed_positions(),
        vec![(ShipId(10), 42.0, 200.0, 1.5)]
    );
    // Gone from every snapshot, presence cleared.
    assert_eq!(realm.hub_snapshot(hub(1)).await.unwrap().len(), 1);
    assert_eq!(realm.presence_of(pid(1)).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_leave_when_not_in_hub_is_noop() {
    let (realm, gateway) = setup(quiet_config(100));
    let mut rx = connect(&realm, 1, "ada").await;

    realm.hub_leave(pid(1)).await.unwrap();

    expect_silence(&mut rx).await;
    assert!(gateway.flushed_positions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_runs_the_same_hub_teardown() {
    let (realm, gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_b).await;

    realm.disconnect(pid(1), "conn-1".into()).await.unwrap();

    // Exactly one playerLeft for the survivors, position flushed, and
    // the player is gone from every snapshot.
    match recv(&mut rx_b).await {
        ServerEvent::HubPlayerLeft { player_id } => assert_eq!(player_id, pid(1)),
        other => panic!("expected hub.playerLeft, got {other:?}"),
    }
    expect_silence(&mut rx_b).await;
    wait_until(|| !gateway.flushed_positions().is_empty()).await;
    assert_eq!(realm.hub_snapshot(hub(1)).await.unwrap().len(), 1);
    assert_eq!(realm.presence_of(pid(1)).await.unwrap(), None);
}

// =========================================================================
// Chat
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_chat_at_length_bound_is_delivered() {
    let (realm, gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    let message = "x".repeat(500);
    realm
        .chat_send(pid(1), ChatChannel::Global, message.clone())
        .await
        .unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        match recv(rx).await {
            ServerEvent::ChatMessage(chat) => {
                assert_eq!(chat.content, message);
                assert_eq!(chat.channel_type, ChatChannel::Global);
                assert_eq!(chat.sender_name, "ada");
            }
            other => panic!("expected chat.message, got {other:?}"),
        }
    }
    wait_until(|| gateway.chat_log().len() == 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_chat_over_length_bound_is_dropped() {
    let (realm, gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    realm
        .chat_send(pid(1), ChatChannel::Global, "x".repeat(501))
        .await
        .unwrap();

    // Not delivered, not persisted.
    expect_silence(&mut rx_a).await;
    expect_silence(&mut rx_b).await;
    assert!(gateway.chat_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_chat_is_dropped() {
    let (realm, gateway) = setup(quiet_config(100));
    let mut rx = connect(&realm, 1, "ada").await;

    realm
        .chat_send(pid(1), ChatChannel::Global, String::new())
        .await
        .unwrap();

    expect_silence(&mut rx).await;
    assert!(gateway.chat_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hub_chat_reaches_only_occupants() {
    let (realm, _gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;
    let mut rx_c = connect(&realm, 3, "cleo").await;

    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_b).await;

    realm
        .chat_send(pid(1), ChatChannel::Hub, "form up".into())
        .await
        .unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        match recv(rx).await {
            ServerEvent::ChatMessage(chat) => {
                assert_eq!(chat.channel_type, ChatChannel::Hub);
                assert_eq!(chat.channel_id, Some(1));
            }
            other => panic!("expected chat.message, got {other:?}"),
        }
    }
    // Cleo is not in the hub.
    expect_silence(&mut rx_c).await;
}

#[tokio::test(start_paused = true)]
async fn test_hub_chat_without_hub_falls_back_to_global() {
    let (realm, _gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    // Ada asks for hub scope while in no hub.
    realm
        .chat_send(pid(1), ChatChannel::Hub, "anyone here?".into())
        .await
        .unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        match recv(rx).await {
            ServerEvent::ChatMessage(chat) => {
                assert_eq!(chat.channel_type, ChatChannel::Global);
                assert_eq!(chat.channel_id, None);
            }
            other => panic!("expected chat.message, got {other:?}"),
        }
    }
}

// =========================================================================
// Tick broadcaster
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_tick_broadcasts_full_snapshot_to_all_occupants() {
    let mut config = quiet_config(100);
    config.tick_rate_hz = 20;
    let (realm, _gateway) = setup(config);

    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;
    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        let (timestamp, players) = recv_until_tick(rx).await;
        assert!(timestamp > 0);
        let mut ids: Vec<u64> = players.iter().map(|p| p.player_id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2], "tick carries the full hub state");
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_tick_for_players_outside_hubs() {
    let mut config = quiet_config(100);
    config.tick_rate_hz = 20;
    let (realm, _gateway) = setup(config);

    let mut rx = connect(&realm, 1, "ada").await;
    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    let _ = recv(&mut rx).await; // hub.joined
    realm.hub_leave(pid(1)).await.unwrap();

    // The hub is now empty: the broadcaster skips it entirely, so no
    // tick reaches the departed player.
    expect_silence(&mut rx).await;
}

// =========================================================================
// Idle reaper
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reaper_evicts_hub_idle_past_grace() {
    let config = RealmConfig {
        hub: HubConfig {
            max_occupants: 100,
            idle_grace: Duration::from_secs(2),
        },
        tick_rate_hz: 0,
        reap_interval: Duration::from_secs(1),
        command_buffer: 64,
    };
    let (realm, _gateway) = setup(config);

    let mut rx = connect(&realm, 1, "ada").await;
    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    let _ = recv(&mut rx).await;
    realm.hub_leave(pid(1)).await.unwrap();
    assert_eq!(realm.hub_count().await.unwrap(), 1);

    // Inside the grace window the empty hub survives a sweep.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(realm.hub_count().await.unwrap(), 1);

    // Past the window it is reclaimed.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(realm.hub_count().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reaper_never_evicts_occupied_hub() {
    let config = RealmConfig {
        hub: HubConfig {
            max_occupants: 100,
            idle_grace: Duration::from_secs(2),
        },
        tick_rate_hz: 0,
        reap_interval: Duration::from_secs(1),
        command_buffer: 64,
    };
    let (realm, _gateway) = setup(config);

    let mut rx = connect(&realm, 1, "ada").await;
    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    let _ = recv(&mut rx).await;

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(realm.hub_count().await.unwrap(), 1);
    assert_eq!(realm.hub_snapshot(hub(1)).await.unwrap().len(), 1);
}

// =========================================================================
// Mission lobbies
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_mission_create_and_join_flow() {
    let (realm, gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    let mission = gateway.create_mission(pid(1), "salvage", 2).await.unwrap();
    realm.mission_open(pid(1), mission.clone()).await.unwrap();

    match recv(&mut rx_a).await {
        ServerEvent::MissionCreated { mission: m } => assert_eq!(m, mission),
        other => panic!("expected mission.created, got {other:?}"),
    }

    realm.mission_join(pid(2), mission.clone()).await.unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        match recv(rx).await {
            ServerEvent::MissionPlayerJoined {
                player_id,
                username,
                players,
            } => {
                assert_eq!(player_id, pid(2));
                assert_eq!(username, "brit");
                assert_eq!(players.len(), 2);
            }
            other => panic!("expected mission.playerJoined, got {other:?}"),
        }
    }
    wait_until(|| gateway.mission_players(mission.id) == Some(vec![pid(1), pid(2)])).await;
}

#[tokio::test(start_paused = true)]
async fn test_mission_join_full_lobby_emits_error() {
    let (realm, _gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;
    let mut rx_c = connect(&realm, 3, "cleo").await;

    let mission = MissionInfo {
        id: MissionId(7),
        kind: "escort".into(),
        difficulty: 1,
        leader_id: pid(1),
        max_players: 2,
    };
    realm.mission_open(pid(1), mission.clone()).await.unwrap();
    let _ = recv(&mut rx_a).await;
    realm.mission_join(pid(2), mission.clone()).await.unwrap();
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_b).await;

    realm.mission_join(pid(3), mission).await.unwrap();

    match recv(&mut rx_c).await {
        ServerEvent::Error { message } => {
            assert!(message.contains("full"), "got: {message}");
        }
        other => panic!("expected error, got {other:?}"),
    }
    // The members were not told anything.
    expect_silence(&mut rx_a).await;
    expect_silence(&mut rx_b).await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_drops_player_from_mission_lobby() {
    let (realm, _gateway) = setup(quiet_config(100));
    let mut rx_a = connect(&realm, 1, "ada").await;
    let mut rx_b = connect(&realm, 2, "brit").await;

    let mission = MissionInfo {
        id: MissionId(7),
        kind: "escort".into(),
        difficulty: 1,
        leader_id: pid(1),
        max_players: 4,
    };
    realm.mission_open(pid(1), mission.clone()).await.unwrap();
    let _ = recv(&mut rx_a).await;
    realm.mission_join(pid(2), mission).await.unwrap();
    let _ = recv(&mut rx_a).await;
    let _ = recv(&mut rx_b).await;

    realm.disconnect(pid(2), "conn-2".into()).await.unwrap();

    match recv(&mut rx_a).await {
        ServerEvent::MissionPlayerLeft { player_id } => assert_eq!(player_id, pid(2)),
        other => panic!("expected mission.playerLeft, got {other:?}"),
    }
}

// =========================================================================
// The full two-player scenario
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_two_player_hub_session_end_to_end() {
    let mut config = quiet_config(100);
    config.tick_rate_hz = 20;
    let (realm, gateway) = setup(config);

    // A joins H1 with S1 and sees only themself.
    let mut rx_a = connect(&realm, 1, "ada").await;
    realm.hub_join(pid(1), hub(1), ship(10, "Sparrow")).await.unwrap();
    match recv(&mut rx_a).await {
        ServerEvent::HubJoined { players, .. } => assert_eq!(players.len(), 1),
        other => panic!("expected hub.joined, got {other:?}"),
    }

    // B joins: A sees playerJoined, B's snapshot holds both.
    let mut rx_b = connect(&realm, 2, "brit").await;
    realm.hub_join(pid(2), hub(1), ship(20, "Falcon")).await.unwrap();
    loop {
        match recv(&mut rx_a).await {
            ServerEvent::HubPlayerJoined(state) => {
                assert_eq!(state.player_id, pid(2));
                break;
            }
            ServerEvent::HubTick { .. } => continue,
            other => panic!("expected hub.playerJoined, got {other:?}"),
        }
    }
    loop {
        match recv(&mut rx_b).await {
            ServerEvent::HubJoined { players, .. } => {
                assert_eq!(players.len(), 2);
                break;
            }
            ServerEvent::HubTick { .. } => continue,
            other => panic!("expected hub.joined, got {other:?}"),
        }
    }

    // A moves: B gets the eager relay.
    realm
        .hub_update(
            pid(1),
            KinematicDelta {
                x: Some(10.0),
                ..KinematicDelta::default()
            },
        )
        .await
        .unwrap();
    loop {
        match recv(&mut rx_b).await {
            ServerEvent::HubPlayerUpdate { player_id, delta } => {
                assert_eq!(player_id, pid(1));
                assert_eq!(delta.x, Some(10.0));
                break;
            }
            ServerEvent::HubTick { .. } => continue,
            other => panic!("expected hub.playerUpdate, got {other:?}"),
        }
    }

    // Next tick: both receive the reconciling snapshot with A's new x.
    for rx in [&mut rx_a, &mut rx_b] {
        let (_, players) = recv_until_tick(rx).await;
        let ada = players.iter().find(|p| p.player_id == pid(1)).unwrap();
        assert_eq!(ada.x, 10.0);
    }

    // A disconnects: B gets playerLeft, A's position hits the store.
    realm.disconnect(pid(1), "conn-1".into()).await.unwrap();
    loop {
        match recv(&mut rx_b).await {
            ServerEvent::HubPlayerLeft { player_id } => {
                assert_eq!(player_id, pid(1));
                break;
            }
            ServerEvent::HubTick { .. } => continue,
            other => panic!("expected hub.playerLeft, got {other:?}"),
        }
    }
    wait_until(|| !gateway.flushed_positions().is_empty()).await;
    let (ship_id, x, _, _) = gateway.flushed_positions()[0];
    assert_eq!(ship_id, ShipId(10));
    assert_eq!(x, 10.0);
}
