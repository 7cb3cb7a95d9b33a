//! Subscriber that records every signal for inspection.

use crate::error::StreamError;
use crate::spi::{Subscriber, Subscription};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A signal observed by a [`RecordingSubscriber`].
#[derive(Clone, Debug)]
pub enum Signal<T> {
    Subscribe,
    Next(T),
    Complete,
    Error(StreamError),
}

impl<T> Signal<T> {
    /// `Complete` or `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Signal::Complete | Signal::Error(_))
    }

    /// The carried element, for `Next`.
    pub fn element(&self) -> Option<&T> {
        match self {
            Signal::Next(element) => Some(element),
            _ => None,
        }
    }

    /// Elements carried by `signals`, in delivery order.
    pub fn elements(signals: &[Signal<T>]) -> Vec<T>
    where
        T: Clone,
    {
        signals.iter().filter_map(Signal::element).cloned().collect()
    }
}

type SharedSubscription = Arc<Mutex<Option<Arc<dyn Subscription>>>>;

/// Subscriber that forwards every signal to a [`Probe`].
///
/// Demand behaviour is scripted up front: an initial request from
/// `on_subscribe`, a refill from each `on_next`, or cancellation at a given
/// point. Anything else is driven from the probe.
pub struct RecordingSubscriber<T> {
    sender: Sender<Signal<T>>,
    subscription: SharedSubscription,
    initial_request: Option<i64>,
    refill: Option<i64>,
    cancel_on_subscribe: bool,
    cancel_after: Option<usize>,
    received: usize,
}

/// Test-side handle of a [`RecordingSubscriber`].
pub struct Probe<T> {
    receiver: Receiver<Signal<T>>,
    subscription: SharedSubscription,
}

impl<T: Send> RecordingSubscriber<T> {
    /// Create a subscriber and the probe observing it.
    pub fn new() -> (Self, Probe<T>) {
        let (sender, receiver) = unbounded();
        let subscription: SharedSubscription = Arc::new(Mutex::new(None));
        let subscriber = Self {
            sender,
            subscription: Arc::clone(&subscription),
            initial_request: None,
            refill: None,
            cancel_on_subscribe: false,
            cancel_after: None,
            received: 0,
        };
        (
            subscriber,
            Probe {
                receiver,
                subscription,
            },
        )
    }

    /// Request `n` from inside `on_subscribe`.
    pub fn with_initial_request(mut self, n: i64) -> Self {
        self.initial_request = Some(n);
        self
    }

    /// Request `n` more from inside every `on_next`.
    pub fn with_refill(mut self, n: i64) -> Self {
        self.refill = Some(n);
        self
    }

    /// Cancel from inside `on_subscribe`, before any request.
    pub fn cancel_on_subscribe(mut self) -> Self {
        self.cancel_on_subscribe = true;
        self
    }

    /// Cancel from inside the `count`-th `on_next`.
    pub fn cancel_after(mut self, count: usize) -> Self {
        self.cancel_after = Some(count);
        self
    }

    /// Box for `Publisher::subscribe`.
    pub fn boxed(self) -> Box<dyn Subscriber<T>>
    where
        T: 'static,
    {
        Box::new(self)
    }

    fn record(&self, signal: Signal<T>) {
        // The probe may already be gone; nothing left to record for.
        let _ = self.sender.send(signal);
    }

    fn current(&self) -> Option<Arc<dyn Subscription>> {
        self.subscription.lock().clone()
    }
}

impl<T: Send> Subscriber<T> for RecordingSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock() = Some(Arc::clone(&subscription));
        self.record(Signal::Subscribe);

        if self.cancel_on_subscribe {
            subscription.cancel();
            return;
        }
        if let Some(n) = self.initial_request {
            subscription.request_more(n);
        }
    }

    fn on_next(&mut self, element: T) {
        self.received += 1;
        self.record(Signal::Next(element));

        let Some(subscription) = self.current() else {
            return;
        };
        if self.cancel_after == Some(self.received) {
            subscription.cancel();
            return;
        }
        if let Some(n) = self.refill {
            subscription.request_more(n);
        }
    }

    fn on_complete(&mut self) {
        self.record(Signal::Complete);
    }

    fn on_error(&mut self, cause: StreamError) {
        self.record(Signal::Error(cause));
    }
}

impl<T> Probe<T> {
    /// Grant demand from outside the subscriber. Returns `false` before
    /// `on_subscribe` has been delivered.
    pub fn request(&self, n: i64) -> bool {
        let subscription = self.subscription.lock().clone();
        match subscription {
            Some(subscription) => {
                subscription.request_more(n);
                true
            }
            None => false,
        }
    }

    /// Cancel the exchange; no-op before `on_subscribe`.
    pub fn cancel(&self) {
        let subscription = self.subscription.lock().clone();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    /// Whether `on_subscribe` has been delivered.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Next recorded signal, if one is already waiting.
    pub fn try_recv(&self) -> Result<Signal<T>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for the next signal, up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Signal<T>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Every signal recorded so far, without blocking.
    pub fn drain(&self) -> Vec<Signal<T>> {
        self.receiver.try_iter().collect()
    }

    /// Collect signals until a terminal one arrives or `timeout` elapses.
    pub fn wait_for_terminal(&self, timeout: Duration) -> Vec<Signal<T>> {
        let deadline = Instant::now() + timeout;
        let mut signals = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(signal) => {
                    let terminal = signal.is_terminal();
                    signals.push(signal);
                    if terminal {
                        return signals;
                    }
                }
                Err(_) => return signals,
            }
        }
    }
}
