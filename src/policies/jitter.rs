//! # Randomization of retry delays.
//!
//! Units of one pool usually start together; without jitter a shared failure
//! (e.g. a database not up yet) makes all of them retry at the same instants.

use std::time::Duration;

use rand::Rng;

/// How a base delay is randomized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact base delay.
    #[default]
    None,
    /// Uniform in `[0, base]`.
    Full,
    /// `base/2` plus uniform in `[0, base/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies the policy to `base`. Millisecond resolution.
    pub fn apply(&self, base: Duration) -> Duration {
        let ms = base.as_millis().min(u64::MAX as u128) as u64;
        let (floor, spread) = match self {
            JitterPolicy::None => return base,
            JitterPolicy::Full => (0, ms),
            JitterPolicy::Equal => (ms / 2, ms - ms / 2),
        };
        if spread == 0 {
            return Duration::from_millis(floor);
        }
        let extra = rand::rng().random_range(0..=spread);
        Duration::from_millis(floor + extra)
    }
}
