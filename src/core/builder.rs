use std::sync::Arc;

use tokio::sync::watch;

use crate::broker::{Broker, SubscribeOptions};
use crate::cluster::ClusterBus;
use crate::core::worker::{PendingSubscription, Worker};
use crate::core::{Phase, ShutdownSignal, WorkerConfig};
use crate::events::Pattern;
use crate::service::{Bind, Prebound, Service};
use crate::storage::{DataSource, DataSources, ModelFactory, PlainModelFactory};
use crate::subscribers::Subscribe;

/// Builder for constructing a [`Worker`] with optional collaborators.
pub struct WorkerBuilder {
    cfg: WorkerConfig,
    broker: Option<Arc<Broker>>,
    datasources: DataSources,
    factory: Arc<dyn ModelFactory>,
    binder: Option<Arc<dyn Bind>>,
    cluster: Option<ClusterBus>,
    shutdown: Option<ShutdownSignal>,
    subscriptions: Vec<PendingSubscription>,
}

impl WorkerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: WorkerConfig) -> Self {
        Self {
            cfg,
            broker: None,
            datasources: DataSources::new(),
            factory: Arc::new(PlainModelFactory),
            binder: None,
            cluster: None,
            shutdown: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn with_unit_id(mut self, unit_id: u32) -> Self {
        self.cfg.unit_id = unit_id;
        self
    }

    /// Uses `broker` as the unit's broker, so services built beforehand can hold it.
    ///
    /// By default the worker creates one keeping `history_capacity` events.
    pub fn with_broker(mut self, broker: Arc<Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Sets the binder run during the `Binding` phase.
    pub fn with_binder(mut self, binder: Arc<dyn Bind>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Binds an already-built service.
    pub fn with_service(self, service: Arc<dyn Service>) -> Self {
        self.with_binder(Arc::new(Prebound(service)))
    }

    pub fn with_datasource(mut self, ds: Arc<dyn DataSource>) -> Self {
        self.datasources.insert(ds);
        self
    }

    pub fn with_datasources(mut self, datasources: DataSources) -> Self {
        self.datasources = datasources;
        self
    }

    /// Replaces the default [`PlainModelFactory`].
    pub fn with_factory(mut self, factory: Arc<dyn ModelFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Joins the process-wide bus; enables the cluster sync listener.
    pub fn with_cluster(mut self, bus: ClusterBus) -> Self {
        self.cluster = Some(bus);
        self
    }

    /// Uses an externally owned shutdown signal (e.g. derived from a pool token).
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Registers `handler` on the worker's broker when it starts.
    pub fn with_subscriber(
        mut self,
        pattern: impl Into<Pattern>,
        handler: Arc<dyn Subscribe>,
        options: SubscribeOptions,
    ) -> Self {
        self.subscriptions.push(PendingSubscription {
            pattern: pattern.into(),
            handler,
            options,
        });
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.cfg
    }

    /// Builds the worker. Nothing runs until [`Worker::run`].
    pub fn build(self) -> Worker {
        let (phase, _) = watch::channel(Phase::Initializing);
        Worker {
            broker: self
                .broker
                .unwrap_or_else(|| Arc::new(Broker::with_history(self.cfg.history_capacity))),
            datasources: Arc::new(self.datasources),
            factory: self.factory,
            binder: self.binder,
            cluster: self.cluster,
            shutdown: self.shutdown.unwrap_or_default(),
            phase,
            subscriptions: self.subscriptions,
            cfg: self.cfg,
        }
    }
}
