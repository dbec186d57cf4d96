//! # Broker: in-process publish/subscribe hub of one execution unit.
//!
//! [`Broker`] delivers each [`Event`] to every matching subscription,
//! **sequentially and in registration order**.
//!
//! ## What it guarantees
//! - Subscriptions see events in publish order; handlers run one at a time.
//! - A subscriber's `Err` or panic is caught and logged (isolation); the
//!   remaining subscribers still run and the publisher is not affected.
//! - Ignore filters skip events by name or by [`Origin`](crate::Origin)
//!   regardless of pattern; the two never overlap.
//!
//! ## What it does **not** do
//! - Cross-unit delivery. One broker exists per unit and is never shared across
//!   a unit boundary; see [`Bridge`](crate::Bridge).
//!
//! ## Diagram
//! ```text
//!    publish(Event)
//!        │  record into history (bounded)
//!        │  snapshot matching subscriptions
//!        ├──► sub #1 (pattern ✓, not ignored) ─► on_event().await
//!        ├──► sub #2 (ignored: External)        (skipped)
//!        └──► sub #N (pattern ✓)               ─► on_event().await ── panic → logged
//! ```
//!
//! Handlers may publish on the same broker; the subscription list is
//! snapshotted before delivery, so re-entrant publishing does not deadlock.

mod subscription;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::codec;
use crate::error::CodecError;
use crate::events::{Event, Pattern};
use crate::subscribers::Subscribe;

pub use subscription::{SubscribeOptions, SubscriptionId};
use subscription::Subscription;

/// Default number of events kept for listings.
pub const DEFAULT_HISTORY: usize = 1024;

/// Outcome of one publish call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscriptions whose pattern matched and that were not ignoring the event.
    pub matched: usize,
    /// Of those, how many returned an error or panicked.
    pub failed: usize,
}

/// Per-unit event broker.
pub struct Broker {
    subs: RwLock<Vec<Arc<Subscription>>>,
    next_id: AtomicU64,
    history: Mutex<VecDeque<Event>>,
    history_capacity: usize,
}

impl Broker {
    /// Creates a broker that keeps the last [`DEFAULT_HISTORY`] events.
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Creates a broker keeping at most `history_capacity` events (`0` = none).
    pub fn with_history(history_capacity: usize) -> Self {
        Self {
            subs: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            history: Mutex::new(VecDeque::with_capacity(history_capacity.min(DEFAULT_HISTORY))),
            history_capacity,
        }
    }

    /// Registers `handler` for events selected by `pattern`.
    pub async fn on(
        &self,
        pattern: impl Into<Pattern>,
        handler: Arc<dyn Subscribe>,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let sub = Subscription {
            id,
            pattern: pattern.into(),
            handler,
            ignore: options.ignore,
            ignore_origins: options.ignore_origins,
        };
        self.subs.write().await.push(Arc::new(sub));
        id
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub async fn off(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subs.write().await;
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Publishes a new local event named `name` carrying `data`.
    pub async fn notify(&self, name: &str, data: Value) -> Delivery {
        self.publish(Event::new(name).with_data(data)).await
    }

    /// Converts `data` to plain data and publishes it as a local event.
    ///
    /// Nothing is published when `data` has no plain-data representation.
    pub async fn emit<T: Serialize + ?Sized>(
        &self,
        name: &str,
        data: &T,
    ) -> Result<Delivery, CodecError> {
        let data = codec::to_plain(data)?;
        Ok(self.notify(name, data).await)
    }

    /// Publishes `event` to all matching subscribers.
    pub async fn publish(&self, event: Event) -> Delivery {
        self.record(&event).await;

        let targets: Vec<Arc<Subscription>> = {
            let subs = self.subs.read().await;
            subs.iter()
                .filter(|s| s.accepts(&event))
                .cloned()
                .collect()
        };

        let mut report = Delivery::default();
        for sub in targets {
            report.matched += 1;
            let fut = sub.handler.on_event(&event);
            match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(
                        subscriber = sub.handler.name(),
                        event = %event.name,
                        error = %e,
                        "subscriber failed"
                    );
                }
                Err(panic_err) => {
                    report.failed += 1;
                    let info = panic_message(&*panic_err);
                    tracing::error!(
                        subscriber = sub.handler.name(),
                        event = %event.name,
                        info = %info,
                        "subscriber panicked"
                    );
                }
            }
        }
        report
    }

    /// Returns the recorded events, oldest first.
    pub async fn events(&self) -> Vec<Event> {
        self.history.lock().await.iter().cloned().collect()
    }

    /// Number of registered subscriptions.
    pub async fn len(&self) -> usize {
        self.subs.read().await.len()
    }

    /// True if there are no subscriptions.
    pub async fn is_empty(&self) -> bool {
        self.subs.read().await.is_empty()
    }

    async fn record(&self, event: &Event) {
        if self.history_capacity == 0 {
            return;
        }
        let mut history = self.history.lock().await;
        while history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(event.clone());
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::events::Origin;
    use crate::subscribers::SubscriberFn;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn recorder(tag: &'static str, log: Arc<StdMutex<Vec<String>>>) -> Arc<dyn Subscribe> {
        SubscriberFn::arc(tag, move |ev: Event| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{tag}:{}", ev.name));
                Ok::<_, HandlerError>(())
            }
        })
    }

    #[tokio::test]
    async fn delivers_in_registration_order() {
        let broker = Broker::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        broker.on("a", recorder("first", log.clone()), SubscribeOptions::new()).await;
        broker.on(Pattern::Any, recorder("second", log.clone()), SubscribeOptions::new()).await;
        broker.on("b", recorder("third", log.clone()), SubscribeOptions::new()).await;

        let d = broker.notify("a", json!(1)).await;
        assert_eq!(d, Delivery { matched: 2, failed: 0 });
        broker.notify("b", json!(2)).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:a", "second:a", "second:b", "third:b"]
        );
    }

    #[tokio::test]
    async fn failing_and_panicking_subscribers_are_isolated() {
        let broker = Broker::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        broker
            .on(
                Pattern::Any,
                SubscriberFn::arc("err", |_ev: Event| async { Err::<(), _>(HandlerError::from("nope")) }),
                SubscribeOptions::new(),
            )
            .await;
        broker
            .on(
                Pattern::Any,
                SubscriberFn::arc("boom", |ev: Event| async move {
                    if !ev.name.is_empty() {
                        panic!("subscriber exploded");
                    }
                    Ok::<_, HandlerError>(())
                }),
                SubscribeOptions::new(),
            )
            .await;
        broker.on(Pattern::Any, recorder("ok", log.clone()), SubscribeOptions::new()).await;

        let d = broker.notify("x", json!(null)).await;
        assert_eq!(d, Delivery { matched: 3, failed: 2 });
        assert_eq!(*log.lock().unwrap(), vec!["ok:x"]);
    }

    #[tokio::test]
    async fn ignore_filter_beats_pattern() {
        let broker = Broker::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        broker
            .on(
                Pattern::Any,
                recorder("out", log.clone()),
                SubscribeOptions::new().ignore_external().ignore("internalOnly"),
            )
            .await;

        broker.publish(Event::external("orderPlaced", json!({}))).await;
        broker.notify("internalOnly", json!({})).await;
        broker.notify("orderPlaced", json!({})).await;

        assert_eq!(*log.lock().unwrap(), vec!["out:orderPlaced"]);
    }

    #[tokio::test]
    async fn off_removes_subscription() {
        let broker = Broker::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let id = broker.on("a", recorder("r", log.clone()), SubscribeOptions::new()).await;

        assert!(broker.off(id).await);
        assert!(!broker.off(id).await);
        assert_eq!(broker.notify("a", json!(0)).await.matched, 0);
        assert!(broker.is_empty().await);
    }

    #[tokio::test]
    async fn reentrant_publish_does_not_deadlock() {
        let broker = Arc::new(Broker::new());
        let log = Arc::new(StdMutex::new(Vec::new()));
        let inner = Arc::clone(&broker);

        broker
            .on(
                "ping",
                SubscriberFn::arc("relay", move |_ev: Event| {
                    let b = Arc::clone(&inner);
                    async move {
                        b.notify("pong", json!(null)).await;
                        Ok::<_, HandlerError>(())
                    }
                }),
                SubscribeOptions::new(),
            )
            .await;
        broker.on("pong", recorder("sink", log.clone()), SubscribeOptions::new()).await;

        broker.notify("ping", json!(null)).await;
        assert_eq!(*log.lock().unwrap(), vec!["sink:pong"]);
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let broker = Broker::with_history(2);
        broker.notify("a", json!(1)).await;
        broker.notify("b", json!(2)).await;
        broker.publish(Event::external("c", json!(3))).await;

        let names: Vec<String> = broker.events().await.iter().map(|e| e.name.to_string()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(broker.events().await[1].origin, Origin::External);

        let silent = Broker::with_history(0);
        silent.notify("a", json!(1)).await;
        assert!(silent.events().await.is_empty());
    }

    #[tokio::test]
    async fn emit_rejects_values_that_are_not_plain_data() {
        let broker = Broker::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        broker.on(Pattern::Any, recorder("all", log.clone()), SubscribeOptions::new()).await;

        let mut keyed = std::collections::HashMap::new();
        keyed.insert((1, 2), "cell");
        assert!(broker.emit("grid", &keyed).await.is_err());

        let d = broker.emit("point", &json!({"x": 1})).await.unwrap();
        assert_eq!(d.matched, 1);
        assert_eq!(*log.lock().unwrap(), vec!["all:point"]);
        assert_eq!(broker.events().await.len(), 1);
    }
}
