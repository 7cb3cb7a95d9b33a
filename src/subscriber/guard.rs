//! Subscriber-side checks on publisher behaviour.
//!
//! The protocol has no back-channel from subscriber to publisher. When a
//! publisher misbehaves, the only recourse is to cancel and fail locally;
//! [`ConformanceGuard`] does exactly that for the subscriber it wraps.

use crate::error::StreamError;
use crate::spi::{Subscriber, Subscription};
use crate::subscription::DemandCounter;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Shared count of violations observed by a guard.
#[derive(Clone, Debug, Default)]
pub struct Violations(Arc<AtomicUsize>);

impl Violations {
    /// Violations recorded so far.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    AwaitingSubscribe,
    Active,
    Terminated,
}

/// Subscription handed to the wrapped subscriber; tracks granted demand.
struct GuardedSubscription {
    upstream: Arc<dyn Subscription>,
    outstanding: Arc<DemandCounter>,
    cancelled: Arc<AtomicBool>,
}

impl Subscription for GuardedSubscription {
    fn request_more(&self, n: i64) {
        // Counted before forwarding so an element racing the request is
        // never misread as exceeding demand.
        if n > 0 {
            self.outstanding.add(n as u64);
        }
        self.upstream.request_more(n);
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.upstream.cancel();
    }
}

/// Wraps a subscriber and enforces the publisher's side of the protocol.
///
/// Detected violations:
/// - a signal before `on_subscribe` (dropped; the wrapped subscriber cannot
///   be told before it has been subscribed)
/// - a second `on_subscribe` (the new subscription is cancelled)
/// - `on_next` beyond granted demand (upstream cancelled, wrapped
///   subscriber failed with [`StreamError::ProtocolViolation`])
/// - any signal after a terminal one (ignored)
///
/// Signals that race with a cancellation issued by the wrapped subscriber
/// are expected and silently dropped.
pub struct ConformanceGuard<S> {
    inner: S,
    phase: Phase,
    upstream: Option<Arc<dyn Subscription>>,
    outstanding: Arc<DemandCounter>,
    cancelled: Arc<AtomicBool>,
    violations: Violations,
}

impl<S> ConformanceGuard<S> {
    /// Wrap `inner`; nothing is checked until `on_subscribe` arrives.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            phase: Phase::AwaitingSubscribe,
            upstream: None,
            outstanding: Arc::new(DemandCounter::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
            violations: Violations::default(),
        }
    }

    /// Handle for observing violations after the guard has been boxed away.
    pub fn violations(&self) -> Violations {
        self.violations.clone()
    }

    /// Unwrap the guarded subscriber.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn ignore(&self, signal: &str) {
        if self.is_cancelled() {
            trace!(signal, "signal after cancellation dropped");
            return;
        }
        self.violations.record();
        match self.phase {
            Phase::AwaitingSubscribe => error!(signal, "signal before on_subscribe"),
            _ => warn!(signal, "signal after terminal ignored"),
        }
    }

    fn fail<T>(&mut self, reason: &str)
    where
        S: Subscriber<T>,
    {
        error!(reason, "publisher violated the protocol; cancelling");
        self.violations.record();
        self.phase = Phase::Terminated;
        self.cancelled.store(true, Ordering::Release);
        if let Some(upstream) = self.upstream.take() {
            upstream.cancel();
        }
        self.inner.on_error(StreamError::ProtocolViolation(reason.to_string()));
    }
}

impl<T, S> Subscriber<T> for ConformanceGuard<S>
where
    S: Subscriber<T>,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        if self.phase != Phase::AwaitingSubscribe {
            error!("duplicate on_subscribe; cancelling the new subscription");
            self.violations.record();
            subscription.cancel();
            return;
        }

        self.phase = Phase::Active;
        self.upstream = Some(Arc::clone(&subscription));
        let guarded = GuardedSubscription {
            upstream: subscription,
            outstanding: Arc::clone(&self.outstanding),
            cancelled: Arc::clone(&self.cancelled),
        };
        self.inner.on_subscribe(Arc::new(guarded));
    }

    fn on_next(&mut self, element: T) {
        if self.phase != Phase::Active {
            self.ignore("on_next");
            return;
        }
        if self.is_cancelled() {
            trace!("element after cancellation dropped");
            return;
        }
        if !self.outstanding.try_consume() {
            self.fail::<T>("on_next beyond granted demand");
            return;
        }
        self.inner.on_next(element);
    }

    fn on_complete(&mut self) {
        if self.phase != Phase::Active {
            self.ignore("on_complete");
            return;
        }
        self.phase = Phase::Terminated;
        self.upstream = None;
        self.inner.on_complete();
    }

    fn on_error(&mut self, cause: StreamError) {
        if self.phase != Phase::Active {
            self.ignore("on_error");
            return;
        }
        self.phase = Phase::Terminated;
        self.upstream = None;
        self.inner.on_error(cause);
    }
}
