use std::fmt;

/// Lifecycle phase of a worker.
///
/// ```text
/// Initializing ─► Binding ─► Ready ─► Bridged ─► ShuttingDown ─► Terminated
///      ▲             │                   ▲
///      └── failed ───┘                   └── channel handoff (also while unbound)
/// ```
///
/// A worker whose binding failed returns to `Initializing`: alive, without a
/// service, waiting for a `Rebind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Initializing,
    Binding,
    Ready,
    Bridged,
    ShuttingDown,
    Terminated,
}

impl Phase {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Phase::Initializing => "initializing",
            Phase::Binding => "binding",
            Phase::Ready => "ready",
            Phase::Bridged => "bridged",
            Phase::ShuttingDown => "shutting_down",
            Phase::Terminated => "terminated",
        }
    }

    /// True once shutdown has started.
    pub fn is_stopping(&self) -> bool {
        matches!(self, Phase::ShuttingDown | Phase::Terminated)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
