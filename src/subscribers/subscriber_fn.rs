//! # Function-backed subscriber (`SubscriberFn`)
//!
//! [`SubscriberFn`] wraps a closure `F: Fn(Event) -> Fut`, producing a fresh
//! future per delivered event. The closure receives an owned clone of the event
//! so the future can be `'static`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use workerlink::{HandlerError, Subscribe, SubscriberFn};
//!
//! let s: Arc<dyn Subscribe> = SubscriberFn::arc("printer", |ev| async move {
//!     println!("{} {}", ev.name, ev.data);
//!     Ok::<_, HandlerError>(())
//! });
//! assert_eq!(s.name(), "printer");
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::events::Event;
use crate::subscribers::Subscribe;

/// Function-backed subscriber.
pub struct SubscriberFn<F> {
    name: &'static str,
    f: F,
}

impl<F, Fut> SubscriberFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    /// Creates a new function-backed subscriber.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    /// Creates the subscriber and returns it as a shared handle.
    pub fn arc(name: &'static str, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Subscribe for SubscriberFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn on_event(&self, event: &Event) -> Result<(), HandlerError> {
        (self.f)(event.clone()).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
