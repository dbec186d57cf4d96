//! # Pool configuration.
//!
//! ## Sentinel values
//! - `port_capacity = 0` → treated as `1`
//! - `ready_timeout = 0s` → [`Pool::wait_ready`](crate::Pool::wait_ready) fails
//!   unless every worker is already up

use std::time::Duration;

/// Settings shared by all workers of a [`Pool`](crate::Pool).
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Messages buffered on the process-wide cluster bus per receiver.
    pub cluster_capacity: usize,

    /// Messages buffered per direction of each worker's control port.
    pub port_capacity: usize,

    /// How long [`Pool::wait_ready`](crate::Pool::wait_ready) waits for each worker.
    pub ready_timeout: Duration,

    /// Unit id given to the first spawned worker; later ones count up.
    pub first_unit_id: u32,
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `cluster_capacity = 1024`
    /// - `port_capacity = 64`
    /// - `ready_timeout = 10s`
    /// - `first_unit_id = 1`
    fn default() -> Self {
        Self {
            cluster_capacity: 1024,
            port_capacity: 64,
            ready_timeout: Duration::from_secs(10),
            first_unit_id: 1,
        }
    }
}
