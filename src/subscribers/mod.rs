//! # Broker subscribers.
//!
//! This module provides the [`Subscribe`] trait and helpers for handling
//! application events published on a unit's [`Broker`](crate::Broker).
//!
//! ## Architecture
//! ```text
//! Broker::publish(Event)
//!     │  (registration order, sequential)
//!     ├──► sub1.on_event()  ── Err/panic → logged, continue
//!     ├──► sub2.on_event()
//!     └──► bridge outbound forwarder ──► Channel
//! ```
//!
//! ## Subscriber types
//! - [`SubscriberFn`] closure-backed handlers
//! - [`LogWriter`] traces every event (feature `logging`)
//! - the bridge's outbound forwarder (internal)

mod subscriber;
mod subscriber_fn;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_fn::SubscriberFn;
