use std::collections::HashSet;
use std::sync::Arc;

use crate::events::{Event, Origin, Pattern};
use crate::subscribers::Subscribe;

/// Handle returned by [`Broker::on`](super::Broker::on); pass it to `off`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Per-subscription options.
#[derive(Clone, Debug, Default)]
pub struct SubscribeOptions {
    /// Event names this subscriber declines.
    pub ignore: HashSet<String>,
    /// Origins this subscriber declines.
    pub ignore_origins: HashSet<Origin>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines events named `name`.
    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignore.insert(name.into());
        self
    }

    /// Declines events from `origin`, whatever their name.
    pub fn ignore_origin(mut self, origin: Origin) -> Self {
        self.ignore_origins.insert(origin);
        self
    }

    /// Declines every event that arrived over a channel bridge.
    pub fn ignore_external(self) -> Self {
        self.ignore_origin(Origin::External)
    }
}

pub(crate) struct Subscription {
    pub(crate) id: SubscriptionId,
    pub(crate) pattern: Pattern,
    pub(crate) handler: Arc<dyn Subscribe>,
    pub(crate) ignore: HashSet<String>,
    pub(crate) ignore_origins: HashSet<Origin>,
}

impl Subscription {
    pub(crate) fn accepts(&self, event: &Event) -> bool {
        self.pattern.matches(&event.name)
            && !self.ignore_origins.contains(&event.origin)
            && !event.is_ignored_by(&self.ignore)
    }
}
