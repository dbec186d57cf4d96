//! Retry timing for service binding.
//!
//! A worker binds its service during the `Binding` phase. When the binder
//! fails it waits and tries again, up to `WorkerConfig::bind_attempts` times.
//!
//! ```text
//! bind_with_retry(binder, attempts, backoff)
//!   attempt 0 ── fail ──► sleep(backoff.next(0)) ──► attempt 1 ── fail ──► ...
//! ```
//!
//! - [`BackoffPolicy`]: base delay per attempt (`first × factor^attempt`, capped);
//! - [`JitterPolicy`]: randomization so units started together do not retry in lockstep.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
