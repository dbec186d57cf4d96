//! # Worker pool: the supervising side.
//!
//! A [`Pool`] owns the process-wide [`ClusterBus`], spawns workers as tokio
//! tasks, assigns their unit ids and keeps a [`WorkerHandle`] per unit.
//!
//! ## Architecture
//! ```text
//! Pool::spawn(make)
//!   ├─► unit_id = next id
//!   ├─► builder = make(&UnitContext { unit_id, cluster })
//!   ├─► builder.with_unit_id().with_cluster().with_shutdown(pool_token.child())
//!   └─► WorkerHandle::spawn(worker) ──► tokio::spawn(worker.run(port))
//!
//! Pool::shutdown_all()
//!   ├─► drain handles
//!   ├─► pool_token.cancel()   → every worker stops with exit code 0
//!   └─► join each → (unit, Result<exit code>)
//! ```
//!
//! ## Rules
//! - Unit ids are unique within a pool and never reused.
//! - Workers share nothing but the cluster bus; everything else goes through
//!   their handles.

mod config;
mod handle;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::cluster::ClusterBus;
use crate::core::{ShutdownSignal, WorkerBuilder};
use crate::error::RuntimeError;

pub use config::PoolConfig;
pub use handle::WorkerHandle;

/// What a pool tells the code building a unit.
#[derive(Clone, Debug)]
pub struct UnitContext {
    /// Identifier the unit will run under.
    pub unit_id: u32,
    /// The pool's process-wide bus, e.g. for replicated datasources.
    pub cluster: ClusterBus,
}

/// Set of workers sharing one cluster bus.
pub struct Pool {
    cfg: PoolConfig,
    bus: ClusterBus,
    token: CancellationToken,
    next_unit: AtomicU32,
    workers: RwLock<BTreeMap<u32, Arc<WorkerHandle>>>,
}

impl Pool {
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            bus: ClusterBus::new(cfg.cluster_capacity),
            token: CancellationToken::new(),
            next_unit: AtomicU32::new(cfg.first_unit_id),
            workers: RwLock::new(BTreeMap::new()),
            cfg,
        }
    }

    pub fn cluster(&self) -> &ClusterBus {
        &self.bus
    }

    /// Builds a worker with `make` and starts it.
    ///
    /// The pool overrides the builder's unit id, cluster bus and shutdown signal.
    pub async fn spawn<F>(&self, make: F) -> Arc<WorkerHandle>
    where
        F: FnOnce(&UnitContext) -> WorkerBuilder,
    {
        let unit_id = self.next_unit.fetch_add(1, Ordering::Relaxed);
        let ctx = UnitContext {
            unit_id,
            cluster: self.bus.clone(),
        };

        let worker = make(&ctx)
            .with_unit_id(unit_id)
            .with_cluster(self.bus.clone())
            .with_shutdown(ShutdownSignal::with_token(self.token.child_token()))
            .build();
        let handle = Arc::new(WorkerHandle::spawn(worker, self.cfg.port_capacity));

        self.workers.write().await.insert(unit_id, handle.clone());
        tracing::info!(unit = unit_id, "worker spawned");
        handle
    }

    pub async fn get(&self, unit: u32) -> Option<Arc<WorkerHandle>> {
        self.workers.read().await.get(&unit).cloned()
    }

    /// Sorted unit ids of the workers in the pool.
    pub async fn units(&self) -> Vec<u32> {
        self.workers.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }

    /// Waits for every worker's ready signal, each within `ready_timeout`.
    pub async fn wait_ready(&self) -> Result<(), RuntimeError> {
        let handles: Vec<Arc<WorkerHandle>> = self.workers.read().await.values().cloned().collect();
        for h in handles {
            h.wait_ready(self.cfg.ready_timeout).await?;
        }
        Ok(())
    }

    /// Removes a worker from the pool, stops it and joins it.
    pub async fn remove(&self, unit: u32) -> Option<Result<i32, RuntimeError>> {
        let handle = self.workers.write().await.remove(&unit)?;
        handle.stop();
        Some(handle.join().await)
    }

    /// Stops every worker and joins them: cancel → join → report.
    pub async fn shutdown_all(&self) -> Vec<(u32, Result<i32, RuntimeError>)> {
        let handles: Vec<(u32, Arc<WorkerHandle>)> = {
            let mut workers = self.workers.write().await;
            std::mem::take(&mut *workers).into_iter().collect()
        };

        self.token.cancel();

        let mut results = Vec::with_capacity(handles.len());
        for (unit, h) in handles {
            let res = h.join().await;
            if let Err(e) = &res {
                tracing::error!(unit, label = e.as_label(), error = %e, "worker did not stop cleanly");
            }
            results.push((unit, res));
        }
        results
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
