//! # Supervisor-side handle to one running worker.
//!
//! ## Rules
//! - Invocations are **serialized per worker**: the reply lock is held across
//!   send and receive, so concurrent callers never see each other's replies.
//! - The worker answers every invocation exactly once, in order. Replies are
//!   numbered on arrival and matched against the number of the invocation
//!   waiting for them; anything older belongs to a caller that gave up (timed
//!   out, or had its future dropped) and is discarded.
//! - The ready signal may arrive at any time before the first reply; it is
//!   recorded wherever it is observed.

use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::channel::{self, Endpoint};
use crate::commands::Command;
use crate::core::{FromWorker, Phase, ToWorker, Worker, control_port};
use crate::error::RuntimeError;
use crate::messages::Envelope;

struct Replies {
    rx: mpsc::Receiver<FromWorker>,
    ready: bool,
    /// Invocations handed to the worker.
    sent: u64,
    /// Replies taken off the port.
    received: u64,
}

impl Replies {
    /// Reply to invocation number `seq`; earlier replies are discarded.
    ///
    /// Cancel-safe: bookkeeping only changes once a message has been received.
    async fn reply_to(&mut self, seq: u64) -> Result<Option<Value>, RuntimeError> {
        loop {
            match self.rx.recv().await {
                Some(FromWorker::Signal(sig)) => self.ready |= sig.is_ready(),
                Some(FromWorker::Reply(reply)) => {
                    let n = self.received;
                    self.received += 1;
                    if n == seq {
                        return Ok(reply);
                    }
                    tracing::debug!(reply = n, waiting_for = seq, "abandoned reply discarded");
                }
                None => return Err(RuntimeError::ChannelClosed),
            }
        }
    }

    async fn next_ready(&mut self) -> Result<(), RuntimeError> {
        while !self.ready {
            match self.rx.recv().await {
                Some(FromWorker::Signal(sig)) => self.ready = sig.is_ready(),
                Some(FromWorker::Reply(_)) => self.received += 1,
                None => return Err(RuntimeError::ChannelClosed),
            }
        }
        Ok(())
    }
}

/// Handle to a worker running as a tokio task.
pub struct WorkerHandle {
    unit: u32,
    tx: mpsc::Sender<ToWorker>,
    replies: Mutex<Replies>,
    phase: watch::Receiver<Phase>,
    cancel: CancellationToken,
    join: StdMutex<Option<JoinHandle<Result<i32, RuntimeError>>>>,
    invoke_timeout: Option<Duration>,
    channel_capacity: usize,
    max_frame_bytes: usize,
}

impl WorkerHandle {
    /// Spawns `worker` on the current runtime with a control port of `port_capacity`.
    pub fn spawn(worker: Worker, port_capacity: usize) -> Self {
        let (port, worker_port) = control_port(port_capacity);
        let cfg = worker.config();
        let unit = cfg.unit_id;
        let invoke_timeout = cfg.invoke_timeout();
        let channel_capacity = cfg.channel_capacity_clamped();
        let max_frame_bytes = cfg.max_frame_bytes;
        let phase = worker.phase();
        let cancel = worker.shutdown_signal().token().clone();

        let join = tokio::spawn(worker.run(worker_port));

        Self {
            unit,
            tx: port.tx,
            replies: Mutex::new(Replies {
                rx: port.rx,
                ready: false,
                sent: 0,
                received: 0,
            }),
            phase,
            cancel,
            join: StdMutex::new(Some(join)),
            invoke_timeout,
            channel_capacity,
            max_frame_bytes,
        }
    }

    pub fn unit(&self) -> u32 {
        self.unit
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Watches phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.clone()
    }

    /// Waits for the one-time ready signal.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), RuntimeError> {
        let mut replies = self.replies.lock().await;
        let res = time::timeout(timeout, replies.next_ready()).await;
        res.map_err(|_| RuntimeError::Timeout { timeout })?
    }

    /// Invokes `name` with the worker's default timeout.
    ///
    /// `Ok(None)` means the worker produced nothing to send back (e.g. an
    /// unknown name in bare reply mode, or `shutdown`).
    pub async fn invoke(&self, name: &str, data: Value) -> Result<Option<Value>, RuntimeError> {
        self.invoke_with_timeout(name, data, self.invoke_timeout).await
    }

    /// Invokes `name`; `timeout = None` waits indefinitely.
    pub async fn invoke_with_timeout(
        &self,
        name: &str,
        data: Value,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, RuntimeError> {
        let mut replies = self.replies.lock().await;
        self.send(ToWorker::Invoke(Envelope::new(name, data))).await?;
        let seq = replies.sent;
        replies.sent += 1;

        let Some(timeout) = timeout else {
            return replies.reply_to(seq).await;
        };
        let res = time::timeout(timeout, replies.reply_to(seq)).await;
        res.unwrap_or_else(|_| {
            tracing::warn!(unit = self.unit, operation = %name, ?timeout, "invocation timed out");
            Err(RuntimeError::Timeout { timeout })
        })
    }

    /// Hands over a fresh in-process channel; returns the supervisor's end.
    pub async fn attach_channel(&self) -> Result<Endpoint, RuntimeError> {
        let (local, remote) = channel::pair(self.channel_capacity);
        self.attach_endpoint(remote).await?;
        Ok(local)
    }

    /// Hands over a channel running over a byte stream (pipe, socket).
    pub async fn attach_stream<R, W>(&self, reader: R, writer: W) -> Result<(), RuntimeError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let endpoint = channel::framed(reader, writer, self.channel_capacity, self.max_frame_bytes);
        self.attach_endpoint(endpoint).await
    }

    /// Hands over the worker's end of an existing channel.
    pub async fn attach_endpoint(&self, endpoint: Endpoint) -> Result<(), RuntimeError> {
        self.send(ToWorker::AttachChannel(endpoint)).await
    }

    /// Asks an unbound worker to retry binding.
    pub async fn rebind(&self) -> Result<(), RuntimeError> {
        self.send(ToWorker::Rebind).await
    }

    /// Sends the `shutdown` command with `code` over the control port.
    pub async fn shutdown(&self, code: i32) -> Result<(), RuntimeError> {
        self.invoke(Command::SHUTDOWN, Value::from(code)).await?;
        Ok(())
    }

    /// Stops the worker without a command (exit code `0`).
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits for the worker task; returns its exit code.
    ///
    /// Only the first call observes the worker; later calls fail.
    pub async fn join(&self) -> Result<i32, RuntimeError> {
        let join = self
            .join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(join) = join else {
            return Err(RuntimeError::WorkerLost {
                unit: self.unit,
                reason: "already joined".into(),
            });
        };
        join.await.map_err(|e| RuntimeError::WorkerLost {
            unit: self.unit,
            reason: e.to_string(),
        })?
    }

    async fn send(&self, msg: ToWorker) -> Result<(), RuntimeError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}
