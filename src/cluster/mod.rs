//! Cluster synchronization: the process-wide bus and the per-unit sync handler.
//!
//! ## Contents
//! - [`ClusterBus`] broadcast layer shared by all units of a pool
//! - [`ClusterSync`], [`SyncOutcome`] applies sibling writes via `cluster_save`

mod bus;
mod sync;

pub use bus::ClusterBus;
pub use sync::{ClusterSync, SyncOutcome};
