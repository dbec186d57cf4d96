//! Application events: data model and subscription patterns.
//!
//! ## Contents
//! - [`Event`], [`Origin`] the event record and its externally-sourced tag
//! - [`Pattern`] exact / regex / wildcard name selection
//!
//! Events are published on a per-unit [`Broker`](crate::Broker); crossing a unit
//! boundary is the job of the [`Bridge`](crate::Bridge).

mod event;
mod pattern;

pub use event::{Event, Origin};
pub use pattern::Pattern;
