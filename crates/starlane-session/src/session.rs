//! The connection-session state machine.
//!
//! One [`ConnectionSession`] exists per live transport connection. It
//! tracks where in the protocol lifecycle that connection is:
//!
//! ```text
//!   Connecting ──(auth ok)──→ Idle ──(hub.join ok)──→ InHub(hub)
//!        │                     ↑  │                      │
//!        │                     └──┴──(hub.leave)─────────┘
//!        └────────────────(close, from any state)──→ Closed
//! ```
//!
//! - **Connecting**: transport is up, `auth` not yet validated. The only
//!   acceptable intent is `auth`.
//! - **Idle**: authenticated, not in any hub. Chat and mission intents
//!   are valid; `hub.update` is not.
//! - **InHub**: occupying exactly one hub. Joining another hub goes
//!   through an implicit leave first, handled by the realm — the session
//!   just records the new hub.
//! - **Closed**: terminal. Reached exactly once; [`ConnectionSession::close`]
//!   reports whether this call was the one that closed it, so teardown
//!   runs once no matter how many paths race to it.

use starlane_protocol::HubId;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timeouts governing a connection's lifecycle.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a fresh connection has to send its `auth` intent before
    /// the transport is dropped.
    pub handshake_timeout: std::time::Duration,

    /// How long the peer may go without any inbound frame (pongs count)
    /// before the session is torn down as silently dead.
    pub liveness_timeout: std::time::Duration,

    /// How often the server probes the peer with a ping.
    pub ping_interval: std::time::Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: std::time::Duration::from_secs(5),
            liveness_timeout: std::time::Duration::from_secs(15),
            ping_interval: std::time::Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Session phases
// ---------------------------------------------------------------------------

/// Where a connection currently is in the protocol lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Transport up, identity not yet validated.
    Connecting,
    /// Authenticated, not occupying any hub.
    Idle,
    /// Occupying exactly one hub.
    InHub(HubId),
    /// Terminal. No further transitions.
    Closed,
}

// ---------------------------------------------------------------------------
// ConnectionSession
// ---------------------------------------------------------------------------

/// Per-connection protocol state. Owned by the connection handler task;
/// never shared, so no locking.
#[derive(Debug)]
pub struct ConnectionSession {
    phase: SessionPhase,
}

impl ConnectionSession {
    /// A fresh session in the `Connecting` phase.
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Connecting,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The hub this session occupies, if any.
    pub fn hub(&self) -> Option<HubId> {
        match self.phase {
            SessionPhase::InHub(hub) => Some(hub),
            _ => None,
        }
    }

    /// Marks the handshake complete: `Connecting → Idle`.
    ///
    /// # Errors
    /// [`SessionError::AlreadyAuthenticated`] from `Idle`/`InHub`,
    /// [`SessionError::Closed`] from `Closed`.
    pub fn authenticate(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Connecting => {
                self.phase = SessionPhase::Idle;
                Ok(())
            }
            SessionPhase::Closed => Err(SessionError::Closed),
            _ => Err(SessionError::AlreadyAuthenticated),
        }
    }

    /// Records a successful hub admission: `Idle | InHub → InHub(hub)`.
    ///
    /// Returns the previously occupied hub when this join implicitly
    /// vacated one.
    ///
    /// # Errors
    /// [`SessionError::NotAuthenticated`] from `Connecting`,
    /// [`SessionError::Closed`] from `Closed`.
    pub fn enter_hub(&mut self, hub: HubId) -> Result<Option<HubId>, SessionError> {
        match self.phase {
            SessionPhase::Idle => {
                self.phase = SessionPhase::InHub(hub);
                Ok(None)
            }
            SessionPhase::InHub(prior) => {
                self.phase = SessionPhase::InHub(hub);
                Ok(Some(prior).filter(|p| *p != hub))
            }
            SessionPhase::Connecting => Err(SessionError::NotAuthenticated),
            SessionPhase::Closed => Err(SessionError::Closed),
        }
    }

    /// Records a hub departure: `InHub → Idle`. Returns the vacated hub,
    /// or `None` if the session wasn't in one (no-op — leave intents may
    /// race a disconnect).
    pub fn leave_hub(&mut self) -> Option<HubId> {
        match self.phase {
            SessionPhase::InHub(hub) => {
                self.phase = SessionPhase::Idle;
                Some(hub)
            }
            _ => None,
        }
    }

    /// Transitions to `Closed` from any phase. Returns `true` only for
    /// the call that performed the transition — the caller that gets
    /// `true` owns teardown.
    pub fn close(&mut self) -> bool {
        if self.phase == SessionPhase::Closed {
            return false;
        }
        self.phase = SessionPhase::Closed;
        true
    }

    /// Whether the session has reached its terminal phase.
    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }
}

impl Default for ConnectionSession {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
