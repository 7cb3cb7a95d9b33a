//! Per-subscriber emission engine.
//!
//! An [`Exchange`] binds one subscriber to one source and is itself the
//! [`Subscription`] handed to that subscriber. All delivery happens inside a
//! drain loop guarded by a work-in-progress counter: the first caller to
//! bump the counter from zero owns the loop, every other caller (including
//! reentrant `request_more` from inside `on_next`) just bumps the counter
//! and returns. The owner keeps looping until the counter falls back to
//! zero, so no wake-up is lost and the call stack never grows with demand.

use super::demand::DemandCounter;
use crate::error::{panic_message, StreamError};
use crate::source::{Pull, Source};
use crate::spi::{Subscriber, Subscription};
use crate::types::{ExchangeState, SubscriptionId};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Callback run once when the exchange releases its resources.
pub type ReleaseHook = Box<dyn FnOnce(SubscriptionId, ExchangeState) + Send>;

/// State only touched by the drain owner.
struct Inner<T> {
    subscriber: Option<Box<dyn Subscriber<T>>>,
    source: Option<Box<dyn Source<T>>>,
    /// One element pulled ahead so exhaustion is noticed without demand.
    lookahead: Option<T>,
    on_release: Option<ReleaseHook>,
}

/// One bound publisher/subscriber exchange.
pub struct Exchange<T> {
    id: SubscriptionId,
    demand: DemandCounter,
    state: AtomicU8,
    cancelled: AtomicBool,
    started: AtomicBool,
    /// First pending failure (misuse or external fault), delivered by the drain owner.
    fault: Mutex<Option<StreamError>>,
    wip: AtomicUsize,
    inner: Mutex<Inner<T>>,
}

impl<T: Send + 'static> Exchange<T> {
    /// Create an exchange. Nothing is delivered until [`start`](Self::start).
    pub fn new(
        id: SubscriptionId,
        subscriber: Box<dyn Subscriber<T>>,
        source: Box<dyn Source<T>>,
    ) -> Arc<Self> {
        Self::build(id, subscriber, source, None)
    }

    /// Create an exchange that runs `hook` once it terminates or is cancelled.
    pub fn with_release_hook(
        id: SubscriptionId,
        subscriber: Box<dyn Subscriber<T>>,
        source: Box<dyn Source<T>>,
        hook: ReleaseHook,
    ) -> Arc<Self> {
        Self::build(id, subscriber, source, Some(hook))
    }

    fn build(
        id: SubscriptionId,
        subscriber: Box<dyn Subscriber<T>>,
        source: Box<dyn Source<T>>,
        on_release: Option<ReleaseHook>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            demand: DemandCounter::new(),
            state: AtomicU8::new(ExchangeState::Unsubscribed as u8),
            cancelled: AtomicBool::new(false),
            started: AtomicBool::new(false),
            fault: Mutex::new(None),
            // The start call owns the first drain pass; wake-ups that
            // arrive before it are folded into that pass.
            wip: AtomicUsize::new(1),
            inner: Mutex::new(Inner {
                subscriber: Some(subscriber),
                source: Some(source),
                lookahead: None,
                on_release,
            }),
        })
    }

    /// Deliver `on_subscribe`, then drain whatever is already possible.
    ///
    /// Demand requested inside `on_subscribe` is honoured only after the
    /// callback returns.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!(subscription = %self.id, "exchange started twice");
            return;
        }

        let handle: Arc<dyn Subscription> = Arc::clone(self) as Arc<dyn Subscription>;
        {
            let mut inner = self.inner.lock();
            if let Some(subscriber) = inner.subscriber.as_mut() {
                self.set_state(ExchangeState::Active);
                let delivered =
                    panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_subscribe(handle)));
                if let Err(payload) = delivered {
                    error!(
                        subscription = %self.id,
                        reason = %panic_message(&*payload),
                        "subscriber panicked in on_subscribe; cancelling"
                    );
                    self.cancelled.store(true, Ordering::Release);
                }
            }
        }

        self.run_drain(1);
    }

    /// Wake the exchange after its source gained an element or terminated.
    pub fn signal(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            self.run_drain(1);
        }
    }

    /// Fail the exchange from outside the source.
    ///
    /// The first failure wins; ignored once the exchange is closed.
    pub fn fail(&self, cause: StreamError) {
        if self.is_closed() {
            return;
        }
        {
            let mut slot = self.fault.lock();
            if slot.is_none() {
                *slot = Some(cause);
            }
        }
        self.signal();
    }

    /// Identifier assigned by the publisher.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Current lifecycle state. `Cancelled` appears once the drain loop
    /// has observed the cancellation.
    pub fn state(&self) -> ExchangeState {
        ExchangeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Outstanding demand not yet consumed by emission.
    pub fn pending_demand(&self) -> u64 {
        self.demand.pending()
    }

    /// Terminated, or cancelled but not yet observed by the drain loop.
    pub fn is_closed(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.state().is_terminal()
    }

    fn set_state(&self, state: ExchangeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn run_drain(&self, mut missed: usize) {
        loop {
            {
                let mut inner = self.inner.lock();
                self.drain_once(&mut inner);
            }
            let previous = self.wip.fetch_sub(missed, Ordering::AcqRel);
            missed = previous - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn drain_once(&self, inner: &mut Inner<T>) {
        loop {
            if self.state().is_terminal() {
                return;
            }
            if self.cancelled.load(Ordering::Acquire) {
                debug!(subscription = %self.id, "cancellation observed");
                self.release(inner, ExchangeState::Cancelled);
                return;
            }
            let fault = self.fault.lock().take();
            if let Some(cause) = fault {
                self.terminate_with_error(inner, cause);
                return;
            }

            if inner.lookahead.is_none() {
                match self.pull(inner) {
                    Pull::Element(element) => inner.lookahead = Some(element),
                    Pull::Pending => return,
                    Pull::Exhausted => {
                        self.terminate_with_complete(inner);
                        return;
                    }
                    Pull::Failed(cause) => {
                        self.terminate_with_error(inner, cause);
                        return;
                    }
                }
            }

            if !self.demand.try_consume() {
                return;
            }
            let Some(element) = inner.lookahead.take() else {
                return;
            };
            self.deliver_next(inner, element);
        }
    }

    fn pull(&self, inner: &mut Inner<T>) -> Pull<T> {
        let Some(source) = inner.source.as_mut() else {
            return Pull::Exhausted;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| source.pull())) {
            Ok(pull) => pull,
            Err(payload) => {
                let cause = StreamError::from_panic(payload);
                error!(subscription = %self.id, error = %cause, "source panicked");
                Pull::Failed(cause)
            }
        }
    }

    fn deliver_next(&self, inner: &mut Inner<T>, element: T) {
        let Some(subscriber) = inner.subscriber.as_mut() else {
            return;
        };
        trace!(subscription = %self.id, "on_next");
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_next(element)))
        {
            error!(
                subscription = %self.id,
                reason = %panic_message(&*payload),
                "subscriber panicked in on_next; cancelling"
            );
            self.cancelled.store(true, Ordering::Release);
            self.release(inner, ExchangeState::Cancelled);
        }
    }

    fn terminate_with_complete(&self, inner: &mut Inner<T>) {
        let subscriber = inner.subscriber.take();
        self.release(inner, ExchangeState::Completed);
        if let Some(mut subscriber) = subscriber {
            debug!(subscription = %self.id, "on_complete");
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_complete()))
            {
                error!(
                    subscription = %self.id,
                    reason = %panic_message(&*payload),
                    "subscriber panicked in on_complete"
                );
            }
        }
    }

    fn terminate_with_error(&self, inner: &mut Inner<T>, cause: StreamError) {
        let subscriber = inner.subscriber.take();
        self.release(inner, ExchangeState::Failed);
        if let Some(mut subscriber) = subscriber {
            debug!(subscription = %self.id, error = %cause, "on_error");
            if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_error(cause)))
            {
                error!(
                    subscription = %self.id,
                    reason = %panic_message(&*payload),
                    "subscriber panicked in on_error"
                );
            }
        }
    }

    /// Enter `state` and drop everything held for the subscriber.
    fn release(&self, inner: &mut Inner<T>, state: ExchangeState) {
        self.set_state(state);
        inner.subscriber = None;
        inner.source = None;
        inner.lookahead = None;
        if let Some(hook) = inner.on_release.take() {
            let id = self.id;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(id, state))) {
                error!(
                    subscription = %id,
                    reason = %panic_message(&*payload),
                    "release hook panicked"
                );
            }
        }
    }
}

impl<T: Send + 'static> Subscription for Exchange<T> {
    fn request_more(&self, n: i64) {
        if self.is_closed() {
            trace!(subscription = %self.id, requested = n, "demand after termination ignored");
            return;
        }
        if n <= 0 {
            warn!(subscription = %self.id, requested = n, "non-positive demand requested");
            self.fail(StreamError::NonPositiveDemand(n));
            return;
        }
        let pending = self.demand.add(n as u64);
        trace!(subscription = %self.id, requested = n, pending, "demand added");
        self.signal();
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(subscription = %self.id, "cancel requested");
        self.signal();
    }
}
