//! # Worker configuration.
//!
//! Provides [`WorkerConfig`], the settings of one execution unit.
//!
//! Config is used in two ways:
//! 1. **Worker creation**: `WorkerBuilder::new(config)`
//! 2. **Pool units**: `Pool::spawn` overrides `unit_id` with the id it assigns
//!
//! ## Sentinel values
//! - `max_frame_bytes = 0` → no frame size cap
//! - `history_capacity = 0` → broker keeps no history (`showEvents` returns `[]`)
//! - `invoke_timeout = 0s` → supervisor-side invocations wait indefinitely
//! - `bind_attempts = 0` → treated as `1`
//!
//! ## Unit ids
//! Each `WorkerConfig::default()` draws a fresh id from a process-wide counter
//! starting at `0x8000_0000`, so standalone workers sharing one
//! [`ClusterBus`](crate::ClusterBus) never mistake each other's writes for
//! their own. Pool ids count up from
//! [`PoolConfig::first_unit_id`](crate::PoolConfig::first_unit_id) and stay
//! below that range.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::broker::DEFAULT_HISTORY;
use crate::messages::ReplyMode;
use crate::policies::{BackoffPolicy, JitterPolicy};

/// Next id handed out by `WorkerConfig::default()`.
static NEXT_UNIT_ID: AtomicU32 = AtomicU32::new(0x8000_0000);

/// Configuration of one worker.
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Unit identifier; plays the role of the process id in cluster messages.
    pub unit_id: u32,

    /// Frames buffered per direction of a channel created for this worker (min 1).
    pub channel_capacity: usize,

    /// Largest frame accepted or produced on the event channel (`0` = unlimited).
    pub max_frame_bytes: usize,

    /// Number of events kept by the broker for `showEvents` (`0` = none).
    pub history_capacity: usize,

    /// Binding attempts before the worker settles into the unbound state.
    pub bind_attempts: u32,

    /// Delay between binding attempts.
    pub bind_backoff: BackoffPolicy,

    /// Default timeout used by [`WorkerHandle::invoke`](crate::WorkerHandle::invoke)
    /// (`0s` = wait indefinitely).
    pub invoke_timeout: Duration,

    /// Maximum wait for background tasks (bridge, cluster listener) after shutdown.
    pub grace: Duration,

    /// Shape of replies on the channel and the control port.
    pub reply_mode: ReplyMode,

    /// Also stop on SIGINT/SIGTERM/SIGQUIT (exit code `0`).
    pub handle_os_signals: bool,
}

impl WorkerConfig {
    /// Returns the invocation timeout as an `Option`.
    ///
    /// - `None` → wait indefinitely
    /// - `Some(d)` → give up after `d`
    #[inline]
    pub fn invoke_timeout(&self) -> Option<Duration> {
        if self.invoke_timeout == Duration::ZERO {
            None
        } else {
            Some(self.invoke_timeout)
        }
    }

    /// Returns the channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// Returns the number of binding attempts, at least 1.
    #[inline]
    pub fn bind_attempts_clamped(&self) -> u32 {
        self.bind_attempts.max(1)
    }

    /// Returns a copy with `unit_id` replaced.
    pub fn for_unit(&self, unit_id: u32) -> Self {
        Self {
            unit_id,
            ..self.clone()
        }
    }
}

impl Default for WorkerConfig {
    /// Default configuration:
    ///
    /// - `unit_id` = next id from the process-wide counter
    /// - `channel_capacity = 256`
    /// - `max_frame_bytes = 1 MiB`
    /// - `history_capacity = 1024`
    /// - `bind_attempts = 3`, backoff 100ms ×2 up to 5s with equal jitter
    /// - `invoke_timeout = 0s` (no timeout)
    /// - `grace = 5s`
    /// - `reply_mode = Bare`
    /// - `handle_os_signals = false`
    fn default() -> Self {
        Self {
            unit_id: NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed),
            channel_capacity: 256,
            max_frame_bytes: 1024 * 1024,
            history_capacity: DEFAULT_HISTORY,
            bind_attempts: 3,
            bind_backoff: BackoffPolicy {
                first: Duration::from_millis(100),
                max: Duration::from_secs(5),
                factor: 2.0,
                jitter: JitterPolicy::Equal,
            },
            invoke_timeout: Duration::ZERO,
            grace: Duration::from_secs(5),
            reply_mode: ReplyMode::Bare,
            handle_os_signals: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_map_to_helpers() {
        let mut cfg = WorkerConfig::default();
        assert_eq!(cfg.invoke_timeout(), None);

        cfg.invoke_timeout = Duration::from_millis(250);
        cfg.channel_capacity = 0;
        cfg.bind_attempts = 0;
        assert_eq!(cfg.invoke_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(cfg.channel_capacity_clamped(), 1);
        assert_eq!(cfg.bind_attempts_clamped(), 1);

        let unit = cfg.for_unit(7);
        assert_eq!(unit.unit_id, 7);
        assert_eq!(unit.invoke_timeout, cfg.invoke_timeout);
    }

    #[test]
    fn default_unit_ids_are_distinct() {
        let a = WorkerConfig::default();
        let b = WorkerConfig::default();
        assert_ne!(a.unit_id, b.unit_id);
        assert!(a.unit_id >= 0x8000_0000);
    }
}
