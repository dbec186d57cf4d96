//! # Storage collaborators.
//!
//! The bridge does not own persistence; it only needs these seams:
//! - [`DataSource`] — per-model storage adapter with a replication-free
//!   [`cluster_save`](DataSource::cluster_save) path;
//! - [`DataSources`] — explicit name → datasource registry (one per unit);
//! - [`ModelFactory`] — rehydrates plain data into a [`Model`].
//!
//! [`MemoryDataSource`] and [`PlainModelFactory`] are reference implementations.

mod memory;
mod model;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;

pub use memory::MemoryDataSource;
pub use model::{Model, ModelFactory, PlainModelFactory};

/// Storage adapter for one model name.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Model name served by this datasource.
    fn name(&self) -> &str;

    async fn find(&self, id: &str) -> Result<Option<Model>, StorageError>;

    /// Persists a write made in this unit; may notify sibling units.
    async fn save(&self, id: &str, model: Model) -> Result<Model, StorageError>;

    /// Synchronous listing of cached records as plain data.
    fn list_sync(&self) -> Vec<Value>;

    /// Applies a write committed by another unit.
    ///
    /// Must update local state only; it never announces the write again.
    async fn cluster_save(&self, id: &str, model: Model) -> Result<(), StorageError>;

    /// Warms the local cache. Returns the number of cached records.
    async fn load(&self) -> Result<usize, StorageError> {
        Ok(0)
    }
}

/// Registry of the datasources of one unit.
#[derive(Clone, Default)]
pub struct DataSources {
    by_name: HashMap<String, Arc<dyn DataSource>>,
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `ds` under its own name, replacing any previous entry.
    pub fn with(mut self, ds: Arc<dyn DataSource>) -> Self {
        self.insert(ds);
        self
    }

    pub fn insert(&mut self, ds: Arc<dyn DataSource>) {
        self.by_name.insert(ds.name().to_string(), ds);
    }

    pub fn get(&self, model_name: &str) -> Option<Arc<dyn DataSource>> {
        self.by_name.get(model_name).cloned()
    }

    /// Sorted model names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Warms every datasource; failures are logged and skipped.
    ///
    /// Returns the total number of cached records.
    pub async fn warm_all(&self) -> usize {
        let mut total = 0;
        for name in self.names() {
            let Some(ds) = self.by_name.get(&name) else {
                continue;
            };
            match ds.load().await {
                Ok(n) => {
                    tracing::debug!(model = %name, records = n, "cache warmed");
                    total += n;
                }
                Err(e) => {
                    tracing::warn!(model = %name, error = %e, label = e.as_label(), "cache warm-up failed");
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Broken;

    #[async_trait]
    impl DataSource for Broken {
        fn name(&self) -> &str {
            "Broken"
        }
        async fn find(&self, _id: &str) -> Result<Option<Model>, StorageError> {
            Ok(None)
        }
        async fn save(&self, _id: &str, model: Model) -> Result<Model, StorageError> {
            Ok(model)
        }
        fn list_sync(&self) -> Vec<Value> {
            Vec::new()
        }
        async fn cluster_save(&self, _id: &str, _model: Model) -> Result<(), StorageError> {
            Ok(())
        }
        async fn load(&self) -> Result<usize, StorageError> {
            Err(StorageError::Unavailable {
                reason: "disk gone".into(),
            })
        }
    }

    #[tokio::test]
    async fn warm_all_skips_failures() {
        let seeded = MemoryDataSource::new("Customer").with_records([
            Model::new("Customer", "1", json!({"id": "1"})),
            Model::new("Customer", "2", json!({"id": "2"})),
        ]);
        let registry = DataSources::new()
            .with(Arc::new(seeded))
            .with(Arc::new(Broken));

        assert_eq!(registry.names(), vec!["Broken", "Customer"]);
        assert_eq!(registry.warm_all().await, 2);
        assert!(registry.get("Missing").is_none());
    }
}
