//! # workerlink
//!
//! **Workerlink** connects a pool of isolated async workers to their
//! supervisor and to each other.
//!
//! Every worker (a *unit*) owns an in-process event [`Broker`]. Once the
//! supervisor hands it a channel, a [`Bridge`] forwards the unit's events out
//! and injects inbound events back in, without ever echoing an event to the
//! side it came from. Writes committed by one unit are broadcast on the
//! [`ClusterBus`] so sibling units can refresh their caches.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         ┌─────────────────────────────────┐
//!                         │  Pool (supervisor side)         │
//!                         │  - ClusterBus (process-wide)    │
//!                         │  - WorkerHandle per unit        │
//!                         └──┬──────────────────────────┬───┘
//!          control port      │                          │     control port
//!   (Invoke/Attach/Rebind)   ▼                          ▼
//!   ┌───────────────────────────────────┐   ┌───────────────────────────────────┐
//!   │  Worker #1                        │   │  Worker #2                        │
//!   │  - Broker (events + history)      │   │  - Broker                         │
//!   │  - CommandDispatcher              │   │  - CommandDispatcher              │
//!   │  - Service (bound with retry)     │   │  - Service                        │
//!   │  - DataSources                    │   │  - DataSources                    │
//!   │  - ClusterSync listener ◄─────────┼───┼── saveCommand ◄── ds.save()       │
//!   └───────┬───────────────────────────┘   └───────────────────────────────────┘
//!           │ Bridge (after channel handoff)
//!           ▼
//!   ┌───────────────────────────────────┐
//!   │  Endpoint: JSON frames            │
//!   │  out: {"name", "data"} per event  │
//!   │  in : commands or external events │
//!   └───────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Initializing ──► Binding ──► Ready ──► Bridged ──► ShuttingDown ──► Terminated
//!                     │                     ▲
//!                     └─ bind failed ──► Initializing (until Rebind)
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                          |
//! |-------------------|----------------------------------------------------------------|---------------------------------------------|
//! | **Events**        | Per-unit pub/sub with glob/regex patterns and origin tagging.  | [`Broker`], [`Event`], [`Pattern`]          |
//! | **Subscribers**   | Handlers run sequentially, isolated from each other's faults.  | [`Subscribe`], [`SubscriberFn`]             |
//! | **Bridge**        | Event channel between a unit and its supervisor.               | [`Bridge`], [`Endpoint`], [`Envelope`]      |
//! | **Commands**      | Built-in `shutdown`, `showData`, `showEvents`.                 | [`Command`], [`CommandDispatcher`]          |
//! | **Services**      | Named operations bound per unit.                               | [`Service`], [`ServiceTable`], [`Bind`]     |
//! | **Cluster sync**  | Cross-unit cache coherence on committed writes.                | [`ClusterBus`], [`ClusterSync`], [`DataSource`] |
//! | **Workers**       | Unit lifecycle, binding with backoff, graceful shutdown.       | [`Worker`], [`WorkerBuilder`], [`Pool`]     |
//! | **Errors**        | Typed errors with stable labels.                               | [`RuntimeError`], [`ServiceError`]          |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use serde_json::{Value, json};
//! use workerlink::{Envelope, OperationFn, Pool, PoolConfig, ServiceTable, WorkerBuilder, WorkerConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Pool::new(PoolConfig::default());
//!
//!     let worker = pool
//!         .spawn(|_ctx| {
//!             let service = ServiceTable::builder()
//!                 .operation(OperationFn::arc("double", |v: Value| async move {
//!                     Ok::<_, String>(v.as_i64().unwrap_or(0) * 2)
//!                 }))
//!                 .build()
//!                 .expect("valid table");
//!             WorkerBuilder::new(WorkerConfig::default()).with_service(Arc::new(service))
//!         })
//!         .await;
//!     worker.wait_ready(Duration::from_secs(1)).await?;
//!
//!     assert_eq!(worker.invoke("double", json!(21)).await?, Some(json!(42)));
//!
//!     // Hand over the event channel and stop the unit through it.
//!     let channel = worker.attach_channel().await?;
//!     channel.send(&Envelope::new("shutdown", json!(0))).await?;
//!     assert_eq!(worker.join().await?, 0);
//!     Ok(())
//! }
//! ```
mod bridge;
mod broker;
mod channel;
mod cluster;
pub mod codec;
mod commands;
mod core;
mod error;
mod events;
mod messages;
mod policies;
mod pool;
pub mod service;
mod storage;
mod subscribers;

// ---- Public re-exports ----

pub use bridge::{Bridge, BridgeConfig};
pub use broker::{Broker, DEFAULT_HISTORY, Delivery, SubscribeOptions, SubscriptionId};
pub use channel::{Endpoint, framed, pair};
pub use cluster::{ClusterBus, ClusterSync, SyncOutcome};
pub use commands::{Command, CommandDispatcher, Dispatch};
pub use core::{
    FromWorker, Phase, ShutdownSignal, SupervisorPort, ToWorker, Worker, WorkerBuilder,
    WorkerConfig, WorkerPort, control_port, wait_for_shutdown_signal,
};
pub use error::{CodecError, HandlerError, RuntimeError, ServiceError, StorageError};
pub use events::{Event, Origin, Pattern};
pub use messages::{ControlMessage, Envelope, READY_MARKER, ReplyMode, Signal};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use pool::{Pool, PoolConfig, UnitContext, WorkerHandle};
pub use service::{Bind, BindFn, Operation, OperationFn, Prebound, Service, ServiceTable};
pub use storage::{DataSource, DataSources, MemoryDataSource, Model, ModelFactory, PlainModelFactory};
pub use subscribers::{Subscribe, SubscriberFn};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
