//! # Worker: one execution unit and its lifecycle.
//!
//! The [`Worker`] owns the unit's broker, datasources and shutdown signal. It
//! binds the service, announces readiness once, answers its control port,
//! attaches the event channel when handed one, and runs the cluster sync
//! listener next to all of that.
//!
//! ## High-level architecture
//! ```text
//! Worker::run(port)
//!   ├─► register builder subscriptions on the Broker
//!   ├─► spawn ClusterSync listener         (if a ClusterBus is set)
//!   ├─► spawn OS signal listener           (if cfg.handle_os_signals)
//!   ├─► Binding: bind_with_retry()
//!   │      ├─ Ok  → Ready, send {signal:"worker-up"} (once per worker)
//!   │      └─ Err → log, stay unbound (Initializing)
//!   │
//!   ├─► loop select! (biased)
//!   │      ├─ shutdown token cancelled        → break
//!   │      ├─ ToWorker::Invoke(msg)           → command | service | drop → Reply
//!   │      │                                    (interrupted by the shutdown token)
//!   │      ├─ ToWorker::AttachChannel(ep)     → detach old bridge, warm caches,
//!   │      │                                    Bridge::attach → Bridged
//!   │      ├─ ToWorker::Rebind                → bind again if unbound
//!   │      └─ control port closed             → request shutdown(0)
//!   │
//!   └─► ShuttingDown:
//!          wait_all_with_grace(cfg.grace):
//!             ├─ bridge.detach() + join background tasks → Ok(exit code)
//!             └─ timeout → abort stragglers → RuntimeError::GraceExceeded
//!        Terminated
//! ```
//!
//! `run` returns the exit code instead of ending the process; the caller
//! decides what to do with it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::bridge::{Bridge, BridgeConfig};
use crate::broker::{Broker, SubscribeOptions};
use crate::channel::Endpoint;
use crate::cluster::{ClusterBus, ClusterSync};
use crate::commands::CommandDispatcher;
use crate::core::binding::bind_with_retry;
use crate::core::port::{FromWorker, ToWorker, WorkerPort};
use crate::core::shutdown::{ShutdownSignal, wait_for_shutdown_signal};
use crate::core::{Phase, WorkerConfig};
use crate::error::RuntimeError;
use crate::events::Pattern;
use crate::messages::Signal;
use crate::service::{Bind, Service};
use crate::storage::{DataSources, ModelFactory};
use crate::subscribers::Subscribe;

/// Subscription registered when the worker starts.
pub(crate) struct PendingSubscription {
    pub(crate) pattern: Pattern,
    pub(crate) handler: Arc<dyn Subscribe>,
    pub(crate) options: SubscribeOptions,
}

/// One execution unit. Built by [`WorkerBuilder`](crate::WorkerBuilder).
pub struct Worker {
    pub(crate) cfg: WorkerConfig,
    pub(crate) broker: Arc<Broker>,
    pub(crate) datasources: Arc<DataSources>,
    pub(crate) factory: Arc<dyn ModelFactory>,
    pub(crate) binder: Option<Arc<dyn Bind>>,
    pub(crate) cluster: Option<ClusterBus>,
    pub(crate) shutdown: ShutdownSignal,
    pub(crate) phase: watch::Sender<Phase>,
    pub(crate) subscriptions: Vec<PendingSubscription>,
}

/// Mutable state of a running worker.
#[derive(Default)]
struct RunState {
    service: Option<Arc<dyn Service>>,
    bridge: Option<Bridge>,
    ready_sent: bool,
}

impl Worker {
    pub fn config(&self) -> &WorkerConfig {
        &self.cfg
    }

    pub fn unit_id(&self) -> u32 {
        self.cfg.unit_id
    }

    /// The unit's broker; application code publishes on it.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    pub fn datasources(&self) -> &Arc<DataSources> {
        &self.datasources
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Watches phase changes.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Drives the worker until shutdown. Returns the requested exit code.
    pub async fn run(mut self, mut port: WorkerPort) -> Result<i32, RuntimeError> {
        let unit = self.cfg.unit_id;
        let token = self.shutdown.token().clone();

        for sub in std::mem::take(&mut self.subscriptions) {
            self.broker.on(sub.pattern, sub.handler, sub.options).await;
        }

        let mut background: Vec<(&'static str, JoinHandle<()>)> = Vec::new();
        if let Some(bus) = &self.cluster {
            let sync = Arc::new(ClusterSync::new(
                unit,
                self.broker.clone(),
                self.datasources.clone(),
                self.factory.clone(),
            ));
            background.push(("cluster-sync", sync.spawn(bus.subscribe(), token.clone())));
        }
        if self.cfg.handle_os_signals {
            background.push(("os-signals", self.spawn_signal_listener()));
        }

        let commands = CommandDispatcher::new(
            self.broker.clone(),
            self.datasources.clone(),
            self.shutdown.clone(),
        );
        let mut state = RunState::default();
        self.bind(&mut state, &port).await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                msg = port.rx.recv() => match msg {
                    Some(ToWorker::Invoke(msg)) => {
                        let name = msg.name.clone();
                        let dispatched = tokio::select! {
                            biased;
                            _ = token.cancelled() => None,
                            d = commands.dispatch(msg, state.service.as_ref()) => Some(d),
                        };
                        let Some(dispatched) = dispatched else {
                            tracing::warn!(unit, operation = %name, "invocation interrupted by shutdown");
                            // keep one reply per invoke; the port may already be full or gone
                            let _ = port.tx.try_send(FromWorker::Reply(None));
                            break;
                        };
                        let reply = dispatched.into_reply(self.cfg.reply_mode);
                        if port.tx.send(FromWorker::Reply(reply)).await.is_err() {
                            tracing::debug!(unit, "reply dropped; supervisor gone");
                        }
                    }
                    Some(ToWorker::AttachChannel(endpoint)) => {
                        self.attach(&mut state, endpoint, &commands).await;
                    }
                    Some(ToWorker::Rebind) => {
                        if state.service.is_some() {
                            tracing::debug!(unit, "already bound; rebind ignored");
                        } else {
                            self.bind(&mut state, &port).await;
                        }
                    }
                    None => {
                        tracing::info!(unit, "control port closed");
                        self.shutdown.request(0);
                        break;
                    }
                }
            }
        }

        self.set_phase(Phase::ShuttingDown);
        let code = self.shutdown.exit_code();
        tracing::info!(unit, code, "worker shutting down");

        let res = self.wait_all_with_grace(state.bridge.take(), background).await;
        self.set_phase(Phase::Terminated);
        res.map(|()| code)
    }

    /// Binds the service; on success announces readiness once.
    async fn bind(&self, state: &mut RunState, port: &WorkerPort) {
        let unit = self.cfg.unit_id;
        let Some(binder) = &self.binder else {
            tracing::warn!(unit, "no binder configured; worker stays unbound");
            return;
        };

        self.set_phase(Phase::Binding);
        let res = bind_with_retry(
            binder.as_ref(),
            self.cfg.bind_attempts_clamped(),
            &self.cfg.bind_backoff,
            self.shutdown.token(),
            unit,
        )
        .await;

        match res {
            Ok(service) => {
                state.service = Some(service);
                self.set_phase(if state.bridge.is_some() {
                    Phase::Bridged
                } else {
                    Phase::Ready
                });
                if !state.ready_sent {
                    state.ready_sent = true;
                    if port.tx.send(FromWorker::Signal(Signal::ready())).await.is_err() {
                        tracing::debug!(unit, "ready signal dropped; supervisor gone");
                    }
                }
            }
            Err(e) => {
                tracing::error!(unit, label = e.as_label(), error = %e, "worker stays unbound");
                self.set_phase(if state.bridge.is_some() {
                    Phase::Bridged
                } else {
                    Phase::Initializing
                });
            }
        }
    }

    /// Warms caches and attaches a bridge, replacing any existing one.
    async fn attach(&self, state: &mut RunState, endpoint: Endpoint, commands: &CommandDispatcher) {
        let unit = self.cfg.unit_id;
        if let Some(old) = state.bridge.take() {
            tracing::warn!(unit, "channel handed over while bridged; replacing bridge");
            old.detach().await;
        }

        let records = self.datasources.warm_all().await;
        tracing::debug!(unit, records, "caches warmed");

        let cfg = BridgeConfig {
            unit,
            reply_mode: self.cfg.reply_mode,
            max_frame_bytes: self.cfg.max_frame_bytes,
        };
        let bridge = Bridge::attach(
            self.broker.clone(),
            endpoint,
            commands.clone(),
            cfg,
            self.shutdown.token(),
        )
        .await;
        state.bridge = Some(bridge);
        self.set_phase(Phase::Bridged);
    }

    fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let shutdown = self.shutdown.clone();
        let unit = self.cfg.unit_id;
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.requested() => {}
                res = wait_for_shutdown_signal() => match res {
                    Ok(()) => {
                        tracing::info!(unit, "termination signal received");
                        shutdown.request(0);
                    }
                    Err(e) => tracing::warn!(unit, error = %e, "signal handlers unavailable"),
                }
            }
        })
    }

    /// Detaches the bridge and joins background tasks within `cfg.grace`.
    ///
    /// Tasks still running after the grace period are aborted and reported in
    /// [`RuntimeError::GraceExceeded`].
    async fn wait_all_with_grace(
        &self,
        bridge: Option<Bridge>,
        mut background: Vec<(&'static str, JoinHandle<()>)>,
    ) -> Result<(), RuntimeError> {
        let unit = self.cfg.unit_id;
        let grace = self.cfg.grace;
        let mut bridge_stopped = bridge.is_none();

        let done = async {
            if let Some(bridge) = bridge {
                bridge.detach().await;
            }
            bridge_stopped = true;
            for (name, handle) in background.iter_mut() {
                if let Err(e) = handle.await {
                    tracing::error!(unit, task = *name, error = %e, "background task ended abnormally");
                }
            }
        };

        let outcome = time::timeout(grace, done).await;
        match outcome {
            Ok(()) => Ok(()),
            Err(_) => {
                let mut stuck: Vec<String> = Vec::new();
                if !bridge_stopped {
                    stuck.push("bridge".to_string());
                }
                for (name, handle) in &background {
                    if !handle.is_finished() {
                        stuck.push((*name).to_string());
                    }
                    handle.abort();
                }
                tracing::error!(unit, ?grace, ?stuck, "grace period exceeded");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    fn set_phase(&self, phase: Phase) {
        let prev = self.phase.send_replace(phase);
        if prev != phase {
            tracing::debug!(unit = self.cfg.unit_id, from = %prev, to = %phase, "phase changed");
        }
    }
}
