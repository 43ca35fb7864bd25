//! Fixed-rate tick scheduler for Starlane's broadcast loop.
//!
//! The realm broadcasts hub snapshots at a fixed rate (default 20 Hz).
//! This scheduler drives that loop: it sleeps until the next deadline,
//! reports overruns, and keeps lightweight timing metrics so an operator
//! can see when broadcast work approaches its budget.
//!
//! Overruns are handled by skipping: if a tick fires late, the missed
//! deadlines are dropped and the next tick is scheduled from *now*. A
//! presence broadcast is a snapshot, not a simulation step — replaying
//! missed ticks would only send stale state twice.
//!
//! # Disabled mode
//!
//! A rate of 0 disables the loop: [`TickScheduler::wait_for_tick`] pends
//! forever, which is the correct shape inside a `tokio::select!` — the
//! other branches keep running. Tests use this to silence the broadcast
//! arm.
//!
//! # Integration
//!
//! The scheduler sits inside the realm actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         tick = scheduler.wait_for_tick() => {
//!             broadcast_snapshots();
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. 0 = disabled (tick never fires).
    pub tick_rate_hz: u32,
    /// Budget warning threshold (0.0–1.0). A tracing warning fires when
    /// tick execution exceeds this fraction of the tick budget.
    pub budget_warn_threshold: f64,
    /// Random jitter (0–max µs) added to the *first* tick so realms
    /// started at the same instant don't broadcast in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20,
            budget_warn_threshold: 0.80,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Config for a specific tick rate with default thresholds.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Config with the tick loop disabled.
    pub fn disabled() -> Self {
        Self::with_rate(0)
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called by [`TickScheduler::new`]. `tick_rate_hz` is capped at
    /// [`Self::MAX_TICK_RATE_HZ`] (0 stays 0 for disabled mode); the
    /// warn threshold is clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum — clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Duration of one tick. `None` when disabled.
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.tick_rate_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64))
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info and metrics
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// The fixed tick period.
    pub dt: Duration,
    /// `true` if this tick fired noticeably late.
    pub overrun: bool,
    /// How many deadlines were skipped because of the overrun.
    pub ticks_skipped: u64,
}

/// Timing metrics, updated each tick.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    /// Total ticks fired.
    pub total_ticks: u64,
    /// Total overruns detected.
    pub total_overruns: u64,
    /// Total deadlines skipped.
    pub total_skipped: u64,
    /// Exponential moving average of broadcast execution time (α = 0.1).
    pub avg_tick_time: Duration,
    /// Longest broadcast execution time observed.
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-rate tick scheduler. One per realm actor.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Option<Duration>,
    tick_count: u64,
    /// When the next tick should fire.
    next_tick: Option<TokioInstant>,
    /// When the current tick's broadcast work started. Set by
    /// `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler from config. The first tick carries optional
    /// jitter so co-started realms don't synchronize.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let next_tick = tick_duration.map(|d| {
            let jitter = if config.initial_jitter_us > 0 {
                let us = rand::rng().random_range(0..config.initial_jitter_us);
                Duration::from_micros(us)
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + d + jitter
        });

        if config.tick_rate_hz == 0 {
            debug!("tick scheduler created disabled (no broadcast loop)");
        } else {
            debug!(
                rate_hz = config.tick_rate_hz,
                budget_ms = ?tick_duration.map(|d| d.as_secs_f64() * 1000.0),
                "tick scheduler created"
            );
        }

        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Creates a scheduler for a specific rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// When disabled (`tick_rate_hz == 0`) this future pends forever —
    /// `tokio::select!` keeps processing its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, tick_dur) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(dur)) => (next, dur),
            _ => {
                // Disabled: never resolves.
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        // Overrun: we woke significantly past the deadline.
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > tick_dur / 10;
        let mut ticks_skipped = 0u64;

        if overrun {
            ticks_skipped = late_by.as_nanos() as u64 / tick_dur.as_nanos() as u64;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick overrun — skipping ahead"
                );
            }
            self.metrics.total_overruns += 1;
        }
        // Schedule from now, not from the missed deadline.
        self.next_tick = Some(now + tick_dur);

        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: tick_dur,
            overrun,
            ticks_skipped,
        }
    }

    /// Records that the broadcast work for the current tick finished.
    ///
    /// Call after the snapshot fan-out returns. Without it, budget
    /// warnings and timing metrics don't update.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if let Some(budget) = self.tick_duration {
            let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
            if utilization >= self.config.budget_warn_threshold {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = budget.as_secs_f64() * 1000.0,
                    utilization_pct = format!("{:.1}", utilization * 100.0),
                    "tick broadcast approaching budget"
                );
            }
        }

        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }
        // Exponential moving average (α = 0.1).
        let alpha = 0.1;
        let prev = self.metrics.avg_tick_time.as_secs_f64();
        let curr = elapsed.as_secs_f64();
        self.metrics.avg_tick_time =
            Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
    }

    /// Whether the broadcast loop is disabled (rate 0).
    pub fn is_disabled(&self) -> bool {
        self.tick_duration.is_none()
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// The configured tick rate in Hz.
    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    /// The fixed tick period, or `None` when disabled.
    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}
