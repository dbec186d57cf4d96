//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] an extension point for plugging handlers into a unit's
//! [`Broker`](crate::Broker).
//!
//! ## Rules
//! - Handlers run **in registration order**, one after another, for each event.
//! - An `Err` or a panic is caught by the broker, logged, and delivery moves on
//!   to the next subscriber. The publisher never observes it.
//! - A handler may await; other inbound sources of the unit interleave there.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use workerlink::{Event, HandlerError, Subscribe};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Subscribe for Audit {
//!     async fn on_event(&self, ev: &Event) -> Result<(), HandlerError> {
//!         if ev.name.starts_with("order") {
//!             // write an audit record, etc.
//!         }
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &'static str { "audit" }
//! }
//! ```

use async_trait::async_trait;

use crate::{error::HandlerError, events::Event};

/// Broker subscriber.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Return `Err` instead of panicking; both are isolated, but errors keep their message.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event) -> Result<(), HandlerError>;

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
