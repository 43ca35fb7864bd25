//! # Starlane
//!
//! Realtime hub/presence backend for browser space games.
//!
//! Starlane keeps the authoritative in-memory record of which players
//! occupy which shared spatial hubs, broadcasts kinematic snapshots at a
//! fixed rate, and reconciles the socket lifecycle (connect, join,
//! update, leave, chat, disconnect) against an external durable store.
//! Authentication and persistence are seams — implement
//! [`Authenticator`](starlane_session::Authenticator) and
//! [`PersistenceGateway`](starlane_persist::PersistenceGateway) for your
//! identity provider and database, and the server does the rest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use starlane::prelude::*;
//!
//! // Implement Authenticator and PersistenceGateway, then:
//! // let server = StarlaneServer::builder()
//! //     .bind("0.0.0.0:3001")
//! //     .build(my_auth, my_gateway)
//! //     .await?;
//! // server.run().await
//! ```

mod error;
mod handler;
mod server;

pub use error::StarlaneError;
pub use server::{StarlaneServer, StarlaneServerBuilder};

/// The common imports for building on Starlane.
pub mod prelude {
    pub use crate::{StarlaneError, StarlaneServer, StarlaneServerBuilder};

    pub use starlane_hub::{HubConfig, HubError, Location, RealmConfig, RealmHandle};
    pub use starlane_persist::{MemoryGateway, PersistError, PersistenceGateway, ShipRecord};
    pub use starlane_protocol::{
        ChatChannel, ChatMessage, ClientIntent, Codec, HubId, JsonCodec, KinematicDelta,
        KinematicState, MissionId, MissionInfo, MissionMember, PlayerId, ServerEvent, ShipId,
    };
    pub use starlane_session::{Authenticator, Identity, SessionConfig, SessionError};
    pub use starlane_transport::TransportError;
}
