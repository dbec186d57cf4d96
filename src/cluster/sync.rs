//! # Cluster sync: apply writes committed by sibling units.
//!
//! ```text
//! ClusterBus ──► ClusterSync::spawn() listener
//!                  ├─► not a control message        → ignored
//!                  ├─► saveCommand, pid == own pid  → SelfEcho (silent)
//!                  └─► saveCommand, pid != own pid
//!                        ├─ datasource = DataSources::get(name)
//!                        ├─ model = ModelFactory::load_model(broker, ds, data, name)
//!                        └─ ds.cluster_save(id, model)   (never re-announced)
//! ```
//!
//! ## Rules
//! - Messages are applied one at a time, in bus order.
//! - A failure on one message is logged; the listener keeps running.
//! - Lagging behind the bus skips the oldest messages and logs how many.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::Broker;
use crate::error::RuntimeError;
use crate::messages::ControlMessage;
use crate::storage::{DataSources, ModelFactory};

/// What happened to one process-wide message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The write was applied through `cluster_save`.
    Applied {
        /// Model name.
        model: String,
        /// Record identifier.
        id: String,
    },
    /// The message originated in this unit.
    SelfEcho,
    /// Not addressed to the sync handler.
    NotControl,
}

/// Cluster sync handler of one unit.
pub struct ClusterSync {
    pid: u32,
    broker: Arc<Broker>,
    datasources: Arc<DataSources>,
    factory: Arc<dyn ModelFactory>,
}

impl ClusterSync {
    pub fn new(
        pid: u32,
        broker: Arc<Broker>,
        datasources: Arc<DataSources>,
        factory: Arc<dyn ModelFactory>,
    ) -> Self {
        Self {
            pid,
            broker,
            datasources,
            factory,
        }
    }

    /// Identifier of the unit this handler belongs to.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Handles one raw process-wide message.
    pub async fn handle_raw(&self, raw: &Value) -> Result<SyncOutcome, RuntimeError> {
        match ControlMessage::parse(raw) {
            Some(msg) => self.handle(&msg).await,
            None => Ok(SyncOutcome::NotControl),
        }
    }

    /// Handles one parsed control message.
    pub async fn handle(&self, msg: &ControlMessage) -> Result<SyncOutcome, RuntimeError> {
        match msg {
            ControlMessage::Save { pid, .. } if *pid == self.pid => Ok(SyncOutcome::SelfEcho),
            ControlMessage::Save { id, name, data, .. } => {
                let ds = self
                    .datasources
                    .get(name)
                    .ok_or_else(|| RuntimeError::UnknownModel { name: name.clone() })?;
                let model = self
                    .factory
                    .load_model(&self.broker, &ds, data.clone(), name)?;
                ds.cluster_save(id, model).await?;
                Ok(SyncOutcome::Applied {
                    model: name.clone(),
                    id: id.clone(),
                })
            }
        }
    }

    /// Spawns the listener loop on `rx` until `token` is cancelled or the bus closes.
    pub fn spawn(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<Value>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(raw) => self.apply_logged(&raw).await,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(unit = self.pid, skipped, "cluster listener lagged");
                            continue;
                        }
                    }
                }
            }
        })
    }

    async fn apply_logged(&self, raw: &Value) {
        match self.handle_raw(raw).await {
            Ok(SyncOutcome::Applied { model, id }) => {
                tracing::debug!(unit = self.pid, %model, %id, "cluster save applied");
            }
            Ok(SyncOutcome::SelfEcho | SyncOutcome::NotControl) => {}
            Err(e) => {
                tracing::warn!(unit = self.pid, label = e.as_label(), error = %e, "cluster sync failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterBus;
    use crate::error::StorageError;
    use crate::storage::{DataSource, MemoryDataSource, Model, PlainModelFactory};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Datasource that records which write path was taken.
    #[derive(Default)]
    struct Spy {
        saves: Mutex<Vec<String>>,
        cluster_saves: Mutex<Vec<(String, Model)>>,
    }

    #[async_trait]
    impl DataSource for Spy {
        fn name(&self) -> &str {
            "Customer"
        }
        async fn find(&self, _id: &str) -> Result<Option<Model>, StorageError> {
            Ok(None)
        }
        async fn save(&self, id: &str, model: Model) -> Result<Model, StorageError> {
            self.saves.lock().unwrap().push(id.to_string());
            Ok(model)
        }
        fn list_sync(&self) -> Vec<Value> {
            Vec::new()
        }
        async fn cluster_save(&self, id: &str, model: Model) -> Result<(), StorageError> {
            self.cluster_saves.lock().unwrap().push((id.to_string(), model));
            Ok(())
        }
    }

    fn handler(pid: u32, spy: Arc<Spy>) -> ClusterSync {
        ClusterSync::new(
            pid,
            Arc::new(Broker::new()),
            Arc::new(DataSources::new().with(spy)),
            Arc::new(PlainModelFactory),
        )
    }

    #[tokio::test]
    async fn own_pid_never_triggers_cluster_save() {
        let spy = Arc::new(Spy::default());
        let sync = handler(100, spy.clone());

        for (id, name) in [("42", "Customer"), ("7", "Order"), ("", "")] {
            let raw = json!({"cmd": "saveCommand", "id": id, "pid": 100, "name": name, "data": {"n": 1}});
            assert_eq!(sync.handle_raw(&raw).await.unwrap(), SyncOutcome::SelfEcho);
        }
        assert!(spy.cluster_saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_pid_rehydrates_and_cluster_saves() {
        let spy = Arc::new(Spy::default());
        let sync = handler(100, spy.clone());

        let raw = json!({"cmd": "saveCommand", "id": "42", "pid": 200, "name": "Customer", "data": {"id": "42", "name": "Ada"}});
        let out = sync.handle_raw(&raw).await.unwrap();
        assert_eq!(
            out,
            SyncOutcome::Applied {
                model: "Customer".into(),
                id: "42".into()
            }
        );

        let applied = spy.cluster_saves.lock().unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].0, "42");
        assert_eq!(applied[0].1.model_name, "Customer");
        assert_eq!(applied[0].1.data["name"], "Ada");
        assert!(spy.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_model_and_foreign_messages() {
        let sync = handler(1, Arc::new(Spy::default()));

        let unknown = json!({"cmd": "saveCommand", "id": "1", "pid": 2, "name": "Invoice", "data": {}});
        assert!(matches!(
            sync.handle_raw(&unknown).await,
            Err(RuntimeError::UnknownModel { .. })
        ));

        let other = json!({"cmd": "somethingElse"});
        assert_eq!(sync.handle_raw(&other).await.unwrap(), SyncOutcome::NotControl);
    }

    #[tokio::test]
    async fn replication_stops_after_one_hop() {
        let bus = ClusterBus::new(16);
        let token = CancellationToken::new();

        let a_ds = Arc::new(MemoryDataSource::replicated("Customer", bus.clone(), 1));
        let b_ds = Arc::new(MemoryDataSource::replicated("Customer", bus.clone(), 2));

        let a = Arc::new(ClusterSync::new(
            1,
            Arc::new(Broker::new()),
            Arc::new(DataSources::new().with(a_ds.clone())),
            Arc::new(PlainModelFactory),
        ));
        let b = Arc::new(ClusterSync::new(
            2,
            Arc::new(Broker::new()),
            Arc::new(DataSources::new().with(b_ds.clone())),
            Arc::new(PlainModelFactory),
        ));
        let mut listener = bus.subscribe();
        let ha = a.spawn(bus.subscribe(), token.clone());
        let hb = b.spawn(bus.subscribe(), token.clone());

        a_ds.save("9", Model::new("Customer", "9", json!({"id": "9"})))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while b_ds.list_sync().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        // exactly one notification ever hit the bus
        assert!(listener.recv().await.is_ok());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(listener.try_recv().is_err());

        token.cancel();
        ha.await.unwrap();
        hb.await.unwrap();
    }
}
