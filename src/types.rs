//! Core types shared by publishers, subscribers and subscriptions.

use std::fmt;

/// Unique identifier for one publisher/subscriber exchange.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a single exchange.
///
/// Transitions only move forward: `Unsubscribed -> Active -> terminal`.
/// Once a terminal state is reached no callback or demand change is legal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExchangeState {
    /// Created, `on_subscribe` not yet delivered.
    Unsubscribed = 0,
    /// `on_subscribe` delivered; elements may flow.
    Active = 1,
    /// `on_complete` delivered.
    Completed = 2,
    /// `on_error` delivered.
    Failed = 3,
    /// Cancellation observed by the publisher.
    Cancelled = 4,
}

impl ExchangeState {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExchangeState::Completed | ExchangeState::Failed | ExchangeState::Cancelled
        )
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ExchangeState::Unsubscribed,
            1 => ExchangeState::Active,
            2 => ExchangeState::Completed,
            3 => ExchangeState::Failed,
            _ => ExchangeState::Cancelled,
        }
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeState::Unsubscribed => "unsubscribed",
            ExchangeState::Active => "active",
            ExchangeState::Completed => "terminated-complete",
            ExchangeState::Failed => "terminated-error",
            ExchangeState::Cancelled => "terminated-cancelled",
        };
        f.write_str(name)
    }
}
