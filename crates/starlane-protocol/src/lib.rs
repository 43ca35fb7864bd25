//! Wire protocol for Starlane.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Identity and kinematics** ([`PlayerId`], [`HubId`],
//!   [`KinematicState`], [`KinematicDelta`]) — the values that travel in
//!   payloads.
//! - **Messages** ([`ClientIntent`], [`ServerEvent`], chat and mission
//!   types) — the closed set of frames.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer sits between transport (raw frames) and the session
//! layer (player context). It knows nothing about connections, presence,
//! or hubs — only message shapes.

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{
    ChatChannel, ChatMessage, ClientIntent, MissionInfo, MissionMember, ServerEvent,
};
pub use types::{HubId, KinematicDelta, KinematicState, MissionId, PlayerId, ShipId};
