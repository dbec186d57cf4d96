//! # Application events published on a unit's broker.
//!
//! An [`Event`] is a named, immutable piece of plain data. Besides `name` and
//! `data` it carries an [`Origin`]: events injected by a channel bridge are
//! tagged [`Origin::External`] so the same bridge never sends them back out.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use workerlink::{Event, Origin};
//!
//! let ev = Event::new("orderPlaced").with_data(json!({ "id": 7 }));
//! assert_eq!(&*ev.name, "orderPlaced");
//! assert_eq!(ev.origin, Origin::Local);
//!
//! let inbound = Event::external("orderPlaced", json!(null));
//! assert!(inbound.is_external());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Where an event entered this unit's broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Raised by code running inside this unit.
    Local,
    /// Received from the supervisor over a channel bridge.
    External,
}

/// Application event.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs and `showEvents`)
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event name; subscriptions match against it.
    pub name: Arc<str>,
    /// Plain-data payload.
    pub data: Value,
    /// Where the event came from.
    pub origin: Origin,
}

impl Event {
    /// Creates a new local event with a `null` payload.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            name: name.into(),
            data: Value::Null,
            origin: Origin::Local,
        }
    }

    /// Creates an event tagged as received from outside the unit.
    pub fn external(name: impl Into<Arc<str>>, data: Value) -> Self {
        Self::new(name).with_data(data).with_origin(Origin::External)
    }

    /// Attaches a payload.
    #[inline]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Overrides the origin.
    #[inline]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        matches!(self.origin, Origin::External)
    }

    /// True if this event's name is one of `names`.
    pub fn is_ignored_by(&self, names: &std::collections::HashSet<String>) -> bool {
        !names.is_empty() && names.contains(&*self.name)
    }

    /// Plain-data record used by event listings.
    pub fn to_record(&self) -> Value {
        let at_ms = self
            .at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        serde_json::json!({
            "seq": self.seq,
            "at_ms": at_ms,
            "name": &*self.name,
            "data": self.data,
            "origin": self.origin,
        })
    }
}
