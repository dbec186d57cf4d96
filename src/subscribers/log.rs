//! # LogWriter — traces every broker event
//!
//! A minimal subscriber that writes each [`Event`] through `tracing`.
//! Register it on [`Pattern::Any`](crate::Pattern::Any) for a debug trail.
//!
//! ## Example output
//! ```text
//! INFO event name="orderPlaced" origin=Local seq=12
//! INFO event name="orderPlaced" origin=External seq=13
//! ```

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::events::{Event, Origin};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) -> Result<(), HandlerError> {
        match e.origin {
            Origin::Local => {
                tracing::info!(name = %e.name, origin = ?e.origin, seq = e.seq, "event");
            }
            Origin::External => {
                tracing::info!(
                    name = %e.name,
                    origin = ?e.origin,
                    seq = e.seq,
                    data = %e.data,
                    "event"
                );
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
