//! Realm and hub configuration.

use std::time::Duration;

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Per-hub limits.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum occupants per hub instance. Joins beyond this are
    /// rejected; re-joins of existing occupants are not counted twice.
    pub max_occupants: usize,

    /// How long an empty hub instance survives since its last mutation
    /// before the idle reaper evicts it.
    pub idle_grace: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_occupants: 100,
            idle_grace: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// RealmConfig
// ---------------------------------------------------------------------------

/// Configuration for the realm actor: hub limits plus the periodic-task
/// knobs. All of these are environment-level settings, never negotiated
/// on the protocol.
#[derive(Debug, Clone)]
pub struct RealmConfig {
    /// Per-hub limits.
    pub hub: HubConfig,

    /// Broadcast tick rate in Hz. 0 disables the tick loop (useful in
    /// tests that assert on eager relays only).
    pub tick_rate_hz: u32,

    /// How often the idle reaper sweeps for empty hubs.
    pub reap_interval: Duration,

    /// Command-queue depth. When full, intent producers wait — bounded
    /// backpressure instead of unbounded memory growth.
    pub command_buffer: usize,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            hub: HubConfig::default(),
            tick_rate_hz: 20,
            reap_interval: Duration::from_secs(60),
            command_buffer: 256,
        }
    }
}
