//! Runtime core: one execution unit and its lifecycle.
//!
//! The public API from this module is [`Worker`] / [`WorkerBuilder`], the
//! control port connecting a worker to its supervisor, and the shutdown and
//! configuration types around them.
//!
//! Internal modules:
//! - [`worker`]: lifecycle loop, channel handoff, graceful shutdown;
//! - [`binding`]: binds the service with retry/backoff;
//! - [`port`]: supervisor ⇄ worker control messages;
//! - [`shutdown`]: exit-code carrying shutdown signal, OS signal handling;
//! - [`config`]: worker settings and their sentinel values.

mod binding;
mod builder;
mod config;
mod phase;
mod port;
mod shutdown;
mod worker;

pub use builder::WorkerBuilder;
pub use config::WorkerConfig;
pub use phase::Phase;
pub use port::{FromWorker, SupervisorPort, ToWorker, WorkerPort, control_port};
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
pub use worker::Worker;
