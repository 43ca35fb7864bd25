//! Live presence for Starlane: hubs, occupants, and the realm actor.
//!
//! The realm actor is the single owner of every in-memory map the
//! realtime game depends on — who is connected, who is in which hub,
//! which mission lobbies are forming. All mutation flows through one
//! command queue ([`RealmHandle`]); the fixed-rate tick broadcaster and
//! the idle reaper run as arms of the same task.
//!
//! # Key types
//!
//! - [`RealmHandle`] / [`spawn_realm`] — talk to / start the actor
//! - [`PresenceRegistry`] / [`Location`] — where each player is
//! - [`HubStore`] / [`HubInstance`] — per-hub occupant maps
//! - [`MissionLobbies`] — forming mission lobbies
//! - [`RealmConfig`] / [`HubConfig`] — capacity, tick rate, reap knobs
//! - [`HubError`]

mod config;
mod error;
mod instance;
mod mission;
mod presence;
mod realm;
mod store;

pub use config::{HubConfig, RealmConfig};
pub use error::HubError;
pub use instance::HubInstance;
pub use mission::{MissionLobbies, MissionLobby};
pub use presence::{Location, PresenceRegistry};
pub use realm::{EventSender, RealmHandle, spawn_realm};
pub use store::{Admission, HubStore};
