//! # In-memory datasource with cluster replication.
//!
//! [`MemoryDataSource`] keeps one model type in a local map. When built with
//! [`MemoryDataSource::replicated`], every [`save`](DataSource::save) publishes
//! a `saveCommand` on the [`ClusterBus`]; [`cluster_save`](DataSource::cluster_save)
//! only updates the map, so a replicated write travels exactly one hop.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::cluster::ClusterBus;
use crate::error::StorageError;
use crate::messages::ControlMessage;
use crate::storage::{DataSource, Model};

struct Replication {
    bus: ClusterBus,
    pid: u32,
}

/// Map-backed datasource for one model name.
pub struct MemoryDataSource {
    name: String,
    records: RwLock<BTreeMap<String, Model>>,
    replication: Option<Replication>,
}

impl MemoryDataSource {
    /// Local-only datasource.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(BTreeMap::new()),
            replication: None,
        }
    }

    /// Datasource whose saves are announced on `bus` as coming from unit `pid`.
    pub fn replicated(name: impl Into<String>, bus: ClusterBus, pid: u32) -> Self {
        Self {
            replication: Some(Replication { bus, pid }),
            ..Self::new(name)
        }
    }

    /// Preloads records, e.g. from a snapshot.
    pub fn with_records(self, models: impl IntoIterator<Item = Model>) -> Self {
        {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            for m in models {
                records.insert(m.id.clone(), m);
            }
        }
        self
    }

    fn put(&self, id: &str, model: Model) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), model);
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, id: &str) -> Result<Option<Model>, StorageError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(id).cloned())
    }

    async fn save(&self, id: &str, model: Model) -> Result<Model, StorageError> {
        self.put(id, model.clone());

        if let Some(rep) = &self.replication {
            let notice = ControlMessage::save(id, rep.pid, &self.name, model.data.clone());
            rep.bus
                .publish(&notice)
                .map_err(|e| StorageError::Unavailable {
                    reason: e.to_string(),
                })?;
        }
        Ok(model)
    }

    fn list_sync(&self) -> Vec<Value> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.values().map(|m| m.data.clone()).collect()
    }

    async fn cluster_save(&self, id: &str, model: Model) -> Result<(), StorageError> {
        self.put(id, model);
        Ok(())
    }

    async fn load(&self) -> Result<usize, StorageError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_announces_and_cluster_save_does_not() {
        let bus = ClusterBus::new(8);
        let mut rx = bus.subscribe();
        let ds = MemoryDataSource::replicated("Customer", bus.clone(), 100);

        ds.save("1", Model::new("Customer", "1", json!({"id": "1"})))
            .await
            .unwrap();
        let announced = ControlMessage::parse(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(announced.pid(), 100);

        ds.cluster_save("2", Model::new("Customer", "2", json!({"id": "2"})))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());

        assert_eq!(ds.list_sync(), vec![json!({"id": "1"}), json!({"id": "2"})]);
        assert_eq!(ds.load().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn find_returns_saved_model() {
        let ds = MemoryDataSource::new("Order")
            .with_records([Model::new("Order", "9", json!({"id": 9, "total": 3}))]);
        let found = ds.find("9").await.unwrap().unwrap();
        assert_eq!(found.data["total"], 3);
        assert!(ds.find("10").await.unwrap().is_none());
    }
}
