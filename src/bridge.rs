//! # Channel bridge: one broker ⇄ one duplex channel.
//!
//! ```text
//!                     ┌──────────────── Bridge ────────────────┐
//! channel frame ──►   │ inbound loop                           │
//!   {name, data}      │   decode ✗ ─► warn, drop               │
//!                     │   command ─► run ─► reply (if any) ────┼──► channel
//!                     │   else    ─► publish Event(External) ──┼──► Broker
//!                     │                                        │
//! Broker (Local) ──►  │ forwarder (Any, ignore External)       │
//!                     │   encode ✗ ─► warn, drop               │
//!                     │   channel full ─► warn, drop           │
//!                     │   encode ✓ ─► send {name, data} ───────┼──► channel
//!                     └────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Events injected by the inbound loop carry [`Origin::External`] and are
//!   never sent back out by the forwarder, whatever their name.
//! - A bad frame or an unencodable event drops that one message only.
//! - The forwarder never waits on the channel: when the peer is not draining
//!   it and the buffer is full, the event is dropped with a warning.
//! - Cancellation interrupts the inbound loop even while a frame is being
//!   handled.
//! - [`Bridge::detach`] unsubscribes the forwarder and stops the inbound loop.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, SubscribeOptions, SubscriptionId};
use crate::channel::Endpoint;
use crate::codec;
use crate::commands::{CommandDispatcher, Dispatch};
use crate::error::HandlerError;
use crate::events::{Event, Origin, Pattern};
use crate::messages::{Envelope, ReplyMode};
use crate::subscribers::Subscribe;

/// Settings of one bridge.
#[derive(Clone, Copy, Debug, Default)]
pub struct BridgeConfig {
    /// Unit identifier used in logs.
    pub unit: u32,
    /// Shape of command replies.
    pub reply_mode: ReplyMode,
    /// Frame size cap in bytes (`0` = unlimited).
    pub max_frame_bytes: usize,
}

/// An attached bridge.
pub struct Bridge {
    broker: Arc<Broker>,
    forwarder: SubscriptionId,
    token: CancellationToken,
    inbound: JoinHandle<()>,
    unit: u32,
}

impl Bridge {
    /// Binds `broker` to `endpoint` in both directions.
    ///
    /// The inbound loop stops when `parent` is cancelled, on [`detach`](Self::detach),
    /// or when the peer closes the channel.
    pub async fn attach(
        broker: Arc<Broker>,
        endpoint: Endpoint,
        commands: CommandDispatcher,
        cfg: BridgeConfig,
        parent: &CancellationToken,
    ) -> Self {
        let (tx, rx) = endpoint.into_parts();

        let forwarder = Arc::new(Forwarder {
            tx: tx.clone(),
            max_frame_bytes: cfg.max_frame_bytes,
            unit: cfg.unit,
        });
        let forwarder = broker
            .on(Pattern::Any, forwarder, SubscribeOptions::new().ignore_external())
            .await;

        let token = parent.child_token();
        let inbound = Inbound {
            broker: broker.clone(),
            commands,
            tx,
            cfg,
        };
        let inbound = tokio::spawn(inbound.run(rx, token.clone()));

        tracing::info!(unit = cfg.unit, "bridge attached");
        Self {
            broker,
            forwarder,
            token,
            inbound,
            unit: cfg.unit,
        }
    }

    /// True while the inbound loop is running.
    pub fn is_running(&self) -> bool {
        !self.inbound.is_finished()
    }

    /// Unsubscribes the forwarder and waits for the inbound loop to stop.
    pub async fn detach(self) {
        self.broker.off(self.forwarder).await;
        self.token.cancel();
        if let Err(e) = self.inbound.await {
            tracing::error!(unit = self.unit, error = %e, "bridge inbound loop ended abnormally");
        }
        tracing::info!(unit = self.unit, "bridge detached");
    }
}

/// Outbound half: broker subscriber that writes local events to the channel.
struct Forwarder {
    tx: mpsc::Sender<String>,
    max_frame_bytes: usize,
    unit: u32,
}

#[async_trait]
impl Subscribe for Forwarder {
    async fn on_event(&self, event: &Event) -> Result<(), HandlerError> {
        debug_assert_eq!(event.origin, Origin::Local);

        let msg = Envelope::new(&*event.name, event.data.clone());
        let frame = match codec::encode(&msg, self.max_frame_bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    unit = self.unit,
                    event = %event.name,
                    label = e.as_label(),
                    error = %e,
                    "event not forwarded"
                );
                return Ok(());
            }
        };
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(unit = self.unit, event = %event.name, "channel full; event dropped");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(HandlerError::new("channel closed")),
        }
    }

    fn name(&self) -> &'static str {
        "bridge-forwarder"
    }
}

/// Inbound half: channel frames → commands or external events.
struct Inbound {
    broker: Arc<Broker>,
    commands: CommandDispatcher,
    tx: mpsc::Sender<String>,
    cfg: BridgeConfig,
}

impl Inbound {
    async fn run(self, mut rx: mpsc::Receiver<String>, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                frame = rx.recv() => match frame {
                    Some(frame) => tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = self.handle_frame(&frame) => {}
                    },
                    None => {
                        tracing::debug!(unit = self.cfg.unit, "channel closed by peer");
                        break;
                    }
                }
            }
        }
    }

    async fn handle_frame(&self, frame: &str) {
        let unit = self.cfg.unit;
        let max = self.cfg.max_frame_bytes;
        if max > 0 && frame.len() > max {
            tracing::warn!(unit, len = frame.len(), max, "inbound frame too large; dropped");
            return;
        }

        let msg: Envelope = match codec::decode(frame) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(unit, label = e.as_label(), error = %e, "undecodable frame dropped");
                return;
            }
        };

        if let Some(res) = self.commands.try_run(&msg.name, &msg.data).await {
            if let Err(e) = &res {
                tracing::warn!(unit, command = %msg.name, label = e.as_label(), error = %e, "command failed");
            }
            if let Some(reply) = Dispatch::Command(res).into_reply(self.cfg.reply_mode) {
                self.send_reply(&msg.name, &reply).await;
            }
            return;
        }

        self.broker
            .publish(Event::external(msg.name, msg.data))
            .await;
    }

    async fn send_reply(&self, name: &str, reply: &serde_json::Value) {
        match codec::encode(reply, self.cfg.max_frame_bytes) {
            Ok(frame) => {
                if self.tx.send(frame).await.is_err() {
                    tracing::debug!(unit = self.cfg.unit, command = %name, "reply not sent; channel closed");
                }
            }
            Err(e) => {
                tracing::warn!(unit = self.cfg.unit, command = %name, label = e.as_label(), error = %e, "reply dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel;
    use crate::core::ShutdownSignal;
    use crate::storage::{DataSources, MemoryDataSource, Model};
    use crate::subscribers::SubscriberFn;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Fixture {
        broker: Arc<Broker>,
        bridge: Bridge,
        peer: Endpoint,
        shutdown: ShutdownSignal,
    }

    async fn fixture(max_frame_bytes: usize) -> Fixture {
        let broker = Arc::new(Broker::new());
        let ds = MemoryDataSource::new("Customer")
            .with_records([Model::new("Customer", "42", json!({"id": "42"}))]);
        let shutdown = ShutdownSignal::new();
        let commands = CommandDispatcher::new(
            broker.clone(),
            Arc::new(DataSources::new().with(Arc::new(ds))),
            shutdown.clone(),
        );
        let (peer, local) = channel::pair(16);
        let cfg = BridgeConfig {
            unit: 1,
            reply_mode: ReplyMode::Bare,
            max_frame_bytes,
        };
        let bridge =
            Bridge::attach(broker.clone(), local, commands, cfg, shutdown.token()).await;
        Fixture {
            broker,
            bridge,
            peer,
            shutdown,
        }
    }

    async fn no_frame(peer: &mut Endpoint) -> bool {
        !matches!(
            tokio::time::timeout(Duration::from_millis(50), peer.recv_frame()).await,
            Ok(Some(_))
        )
    }

    async fn next(peer: &mut Endpoint) -> Value {
        tokio::time::timeout(Duration::from_secs(1), peer.recv::<Value>())
            .await
            .expect("frame expected")
            .expect("channel open")
            .expect("valid json")
    }

    #[tokio::test]
    async fn local_event_is_forwarded_exactly_once() {
        let mut f = fixture(0).await;
        f.broker.notify("orderPlaced", json!({"id": 7})).await;

        assert_eq!(
            next(&mut f.peer).await,
            json!({"name": "orderPlaced", "data": {"id": 7}})
        );
        assert!(no_frame(&mut f.peer).await);
    }

    #[tokio::test]
    async fn inbound_event_is_published_but_not_echoed() {
        let mut f = fixture(0).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        f.broker
            .on(
                Pattern::Any,
                SubscriberFn::arc("recorder", move |ev: Event| {
                    let s = s.clone();
                    async move {
                        s.lock().unwrap().push((ev.name.to_string(), ev.origin));
                        Ok::<_, HandlerError>(())
                    }
                }),
                SubscribeOptions::new(),
            )
            .await;

        f.peer.send(&Envelope::new("orderPlaced", json!({"id": 1}))).await.unwrap();
        f.peer.send(&Envelope::new(".*", Value::Null)).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while seen.lock().unwrap().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("orderPlaced".to_string(), Origin::External),
                (".*".to_string(), Origin::External)
            ]
        );
        assert!(no_frame(&mut f.peer).await);
    }

    #[tokio::test]
    async fn commands_reply_on_the_same_channel() {
        let mut f = fixture(0).await;

        f.peer.send(&Envelope::new("showData", json!("Customer"))).await.unwrap();
        assert_eq!(next(&mut f.peer).await, json!([{"id": "42"}]));

        // unknown model: no reply in bare mode
        f.peer.send(&Envelope::new("showData", json!("Order"))).await.unwrap();
        assert!(no_frame(&mut f.peer).await);

        f.peer.send(&Envelope::new("shutdown", json!(3))).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), f.shutdown.requested())
            .await
            .unwrap();
        assert_eq!(f.shutdown.exit_code(), 3);
        // commands are never published as events
        assert!(f.broker.events().await.is_empty());
    }

    #[tokio::test]
    async fn bad_frames_are_dropped_and_the_bridge_keeps_running() {
        let mut f = fixture(64).await;

        f.peer.send_frame("{not json".into()).await.unwrap();
        f.peer.send_frame(json!({"data": 1}).to_string()).await.unwrap();
        f.peer.send(&Envelope::new("showData", json!("Customer"))).await.unwrap();
        assert_eq!(next(&mut f.peer).await, json!([{"id": "42"}]));

        f.broker.notify("big", json!("x".repeat(256))).await;
        f.broker.notify("small", json!(1)).await;
        assert_eq!(next(&mut f.peer).await, json!({"name": "small", "data": 1}));
        assert!(f.bridge.is_running());
    }

    #[tokio::test]
    async fn detach_stops_both_directions() {
        let mut f = fixture(0).await;
        assert_eq!(f.broker.len().await, 1);

        f.bridge.detach().await;
        assert_eq!(f.broker.len().await, 0);

        f.broker.notify("afterDetach", Value::Null).await;
        assert!(no_frame(&mut f.peer).await);
    }

    #[tokio::test]
    async fn full_channel_drops_events_without_blocking_the_publisher() {
        let f = fixture(0).await;

        // the peer never reads; the buffer holds 16 frames
        for i in 0..40 {
            tokio::time::timeout(Duration::from_secs(1), f.broker.notify("tick", json!(i)))
                .await
                .expect("publish completed");
        }
        assert_eq!(f.broker.events().await.len(), 40);

        let mut peer = f.peer;
        let mut received = 0;
        while let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(50), peer.recv_frame()).await {
            received += 1;
        }
        assert_eq!(received, 16);
        assert!(f.bridge.is_running());
    }

    #[tokio::test]
    async fn local_event_named_like_an_origin_is_forwarded() {
        let mut f = fixture(0).await;
        f.broker.notify("from_main", json!(1)).await;
        f.broker.notify("external", json!(2)).await;

        assert_eq!(next(&mut f.peer).await, json!({"name": "from_main", "data": 1}));
        assert_eq!(next(&mut f.peer).await, json!({"name": "external", "data": 2}));
    }

    #[tokio::test]
    async fn detach_interrupts_a_blocked_reply() {
        let f = fixture(0).await;

        // fill the worker-to-peer direction, then ask for a reply
        for i in 0..16 {
            f.broker.notify("tick", json!(i)).await;
        }
        f.peer.send(&Envelope::new("showData", json!("Customer"))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), f.bridge.detach())
            .await
            .expect("detach completed");
    }
}
