//! Runnable hub server for local development.
//!
//! Accepts any `<id>:<username>` token and grants every requested ship,
//! so a browser client can connect and fly without a database behind it.
//! Configuration comes from the environment (a `.env` file works):
//!
//! ```text
//! STARLANE_BIND=127.0.0.1:3001
//! MAX_PLAYERS_PER_HUB=100
//! TICK_RATE=20
//! RUST_LOG=info,starlane_hub=debug
//! ```

use std::str::FromStr;

use starlane::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Dev authenticator
// ---------------------------------------------------------------------------

/// Accepts tokens of the form `<id>:<username>`. Development only — a
/// real deployment validates a JWT against the identity provider here.
struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        let (id, name) = token
            .split_once(':')
            .ok_or_else(|| SessionError::AuthFailed("expected <id>:<username>".into()))?;
        let player_id = id
            .parse()
            .map_err(|_| SessionError::AuthFailed("player id must be a number".into()))?;
        if name.is_empty() {
            return Err(SessionError::AuthFailed("username must not be empty".into()));
        }
        Ok(Identity {
            player_id: PlayerId(player_id),
            username: name.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Dev gateway
// ---------------------------------------------------------------------------

/// In-memory gateway that grants every ship lookup. Positions, chat, and
/// mission records still round-trip through the backing [`MemoryGateway`],
/// so reconnecting players spawn where they last flew.
#[derive(Clone, Default)]
struct DevGateway {
    inner: MemoryGateway,
}

impl PersistenceGateway for DevGateway {
    async fn get_ship_if_owned(
        &self,
        ship: ShipId,
        owner: PlayerId,
    ) -> Result<Option<ShipRecord>, PersistError> {
        if let Some(existing) = self.inner.get_ship_if_owned(ship, owner).await? {
            return Ok(Some(existing));
        }
        // First sight of this ship: register it to the caller.
        let record = ShipRecord {
            id: ship,
            name: format!("Shuttle {ship}"),
            position_x: None,
            position_y: None,
            rotation: None,
        };
        self.inner.add_ship(owner, record.clone());
        Ok(Some(record))
    }

    async fn upsert_presence(
        &self,
        player: PlayerId,
        session_handle: String,
    ) -> Result<(), PersistError> {
        self.inner.upsert_presence(player, session_handle).await
    }

    async fn update_presence_location(
        &self,
        player: PlayerId,
        hub: HubId,
        ship: ShipId,
    ) -> Result<(), PersistError> {
        self.inner.update_presence_location(player, hub, ship).await
    }

    async fn update_ship_location(&self, ship: ShipId, hub: HubId) -> Result<(), PersistError> {
        self.inner.update_ship_location(ship, hub).await
    }

    async fn flush_ship_position(
        &self,
        ship: ShipId,
        x: f64,
        y: f64,
        rotation: f64,
    ) -> Result<(), PersistError> {
        self.inner.flush_ship_position(ship, x, y, rotation).await
    }

    async fn clear_presence(&self, player: PlayerId) -> Result<(), PersistError> {
        self.inner.clear_presence(player).await
    }

    async fn record_chat_message(&self, message: ChatMessage) -> Result<(), PersistError> {
        self.inner.record_chat_message(message).await
    }

    async fn set_online(&self, player: PlayerId, online: bool) -> Result<(), PersistError> {
        self.inner.set_online(player, online).await
    }

    async fn create_mission(
        &self,
        leader: PlayerId,
        kind: &str,
        difficulty: u32,
    ) -> Result<MissionInfo, PersistError> {
        self.inner.create_mission(leader, kind, difficulty).await
    }

    async fn get_forming_mission(
        &self,
        mission: MissionId,
    ) -> Result<Option<MissionInfo>, PersistError> {
        self.inner.get_forming_mission(mission).await
    }

    async fn update_mission_players(
        &self,
        mission: MissionId,
        players: Vec<PlayerId>,
    ) -> Result<(), PersistError> {
        self.inner.update_mission_players(mission, players).await
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), StarlaneError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("STARLANE_BIND").unwrap_or_else(|_| "127.0.0.1:3001".to_string());
    let realm_config = RealmConfig {
        hub: HubConfig {
            max_occupants: env_parse("MAX_PLAYERS_PER_HUB", 100),
            ..HubConfig::default()
        },
        tick_rate_hz: env_parse("TICK_RATE", 20),
        ..RealmConfig::default()
    };

    tracing::info!(
        %bind,
        max_occupants = realm_config.hub.max_occupants,
        tick_rate_hz = realm_config.tick_rate_hz,
        "starting hub server"
    );

    let server = StarlaneServer::<DevAuthenticator, DevGateway>::builder()
        .bind(&bind)
        .realm_config(realm_config)
        .build(DevAuthenticator, DevGateway::default())
        .await?;

    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "hub server listening");
    }

    server.run().await
}
