//! # Control port: the supervisor's private line to one worker.
//!
//! Distinct from the event channel handed over later: the control port exists
//! from the moment a worker is spawned and carries lifecycle traffic and
//! service invocations.
//!
//! ```text
//! supervisor                          worker
//!   ToWorker::Invoke{name,data} ──►   command | service op | drop
//!   ToWorker::AttachChannel(ep) ──►   warm caches, attach bridge
//!   ToWorker::Rebind            ──►   retry binding if unbound
//!                               ◄──   FromWorker::Signal{signal:"worker-up"} (once)
//!                               ◄──   FromWorker::Reply(Option<Value>) (one per Invoke)
//! ```
//!
//! Every `Invoke` is answered by exactly one `Reply`; `Reply(None)` means the
//! message produced nothing to send back. This keeps the supervisor side in
//! step even when a caller gives up waiting.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::channel::Endpoint;
use crate::error::RuntimeError;
use crate::messages::{Envelope, Signal};

/// Supervisor → worker.
#[derive(Debug)]
pub enum ToWorker {
    Invoke(Envelope),
    AttachChannel(Endpoint),
    Rebind,
}

/// Worker → supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum FromWorker {
    Signal(Signal),
    Reply(Option<Value>),
}

/// Worker end of a control port.
#[derive(Debug)]
pub struct WorkerPort {
    pub(crate) rx: mpsc::Receiver<ToWorker>,
    pub(crate) tx: mpsc::Sender<FromWorker>,
}

/// Supervisor end of a control port.
#[derive(Debug)]
pub struct SupervisorPort {
    pub(crate) tx: mpsc::Sender<ToWorker>,
    pub(crate) rx: mpsc::Receiver<FromWorker>,
}

/// Creates a connected control port; each direction buffers `capacity` messages.
pub fn control_port(capacity: usize) -> (SupervisorPort, WorkerPort) {
    let capacity = capacity.max(1);
    let (to_worker, from_supervisor) = mpsc::channel(capacity);
    let (to_supervisor, from_worker) = mpsc::channel(capacity);
    (
        SupervisorPort {
            tx: to_worker,
            rx: from_worker,
        },
        WorkerPort {
            rx: from_supervisor,
            tx: to_supervisor,
        },
    )
}

impl SupervisorPort {
    pub async fn send(&self, msg: ToWorker) -> Result<(), RuntimeError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn recv(&mut self) -> Option<FromWorker> {
        self.rx.recv().await
    }
}
