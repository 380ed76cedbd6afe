//! Core types for the reconciler.

use std::fmt;

/// Successful result of reconciling one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not in the cache; deleted since it was queued.
    NotFound,
    /// Status already records delivery; nothing was sent.
    AlreadyDelivered,
    /// Comment posted and status stored.
    Delivered,
}

impl ReconcileOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyDelivered => "already_delivered",
            Self::Delivered => "delivered",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
