//! Persistence seam for Starlane.
//!
//! The realtime core is the source of truth for *live* state (who is in
//! which hub, where each ship currently flies); the durable store only
//! sees connection rows, parked ship positions, chat history, and mission
//! records. This crate defines that boundary:
//!
//! - [`PersistenceGateway`] — the trait the core calls; implement it over
//!   your database of choice.
//! - [`ShipRecord`] — the ship row shape the core reads.
//! - [`MemoryGateway`] — an in-memory implementation for tests and demos.
//! - [`PersistError`].

mod error;
mod gateway;
mod memory;

pub use error::PersistError;
pub use gateway::{PersistenceGateway, ShipRecord};
pub use memory::{MemoryGateway, PresenceRow};
