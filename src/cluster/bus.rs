//! # Process-wide messaging layer.
//!
//! [`ClusterBus`] is a thin wrapper around [`tokio::sync::broadcast`] shared by
//! every unit of a pool. It carries raw plain-data messages; each unit's
//! [`ClusterSync`](super::ClusterSync) picks out the ones it understands.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Receivers (one per unit):
//!   unit 1 datasource.save ──┐
//!   unit 2 datasource.save ──┼──► ClusterBus ──► unit 1 ClusterSync (drops pid 1)
//!   supervisor             ──┘  (broadcast)  ──► unit 2 ClusterSync (drops pid 2)
//! ```
//!
//! Every message reaches every unit including its sender; self-echo is
//! filtered by the receiver using the `pid` field.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: slow receivers observe `RecvError::Lagged(n)` and skip `n` items.
//! - **No persistence**: messages are lost if there are no receivers at send time.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::codec;
use crate::error::CodecError;

/// Broadcast channel for process-wide messages.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct ClusterBus {
    tx: broadcast::Sender<Value>,
}

impl ClusterBus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Value>(capacity);
        Self { tx }
    }

    /// Publishes a raw message to all current receivers.
    ///
    /// Returns the number of receivers that will see it.
    pub fn publish_raw(&self, msg: Value) -> usize {
        self.tx.send(msg).unwrap_or(0)
    }

    /// Converts `msg` to plain data and publishes it.
    pub fn publish<T: Serialize + ?Sized>(&self, msg: &T) -> Result<usize, CodecError> {
        let value = codec::to_plain(msg)?;
        Ok(self.publish_raw(value))
    }

    /// Creates a new receiver that observes subsequent messages.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
