//! Connection sessions for Starlane.
//!
//! This crate handles the lifecycle of one authenticated realtime
//! connection:
//!
//! 1. **Authentication** — the [`Authenticator`] seam delegates token
//!    validation to the external identity provider and yields an
//!    [`Identity`].
//! 2. **Protocol state** — [`ConnectionSession`] tracks the
//!    `Connecting → Idle/InHub → Closed` lifecycle and guarantees
//!    teardown is claimed exactly once.
//! 3. **Timeouts** — [`SessionConfig`] carries the handshake, liveness,
//!    and ping knobs the connection handler enforces.
//!
//! Sessions are rebuilt from zero on process restart; clients re-run the
//! handshake when they reconnect. Nothing here is persisted.

mod auth;
mod error;
mod session;

pub use auth::{Authenticator, Identity};
pub use error::SessionError;
pub use session::{ConnectionSession, SessionConfig, SessionPhase};
