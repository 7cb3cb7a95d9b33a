//! Cold publisher: a fresh source per subscriber.

use super::config::PublisherConfig;
use crate::error::{Result, StreamError};
use crate::source::{FailedSource, FallibleIterSource, IterSource, Source};
use crate::spi::{Publisher, Subscriber};
use crate::subscription::Exchange;
use crate::types::SubscriptionId;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds the source for one new subscriber. An error rejects the subscription.
pub type SourceFactory<T> = Box<dyn Fn() -> Result<Box<dyn Source<T>>> + Send + Sync>;

/// Publisher that replays a source from the start for every subscriber.
///
/// Emission runs on whichever thread grants demand (or calls `subscribe`),
/// so a subscriber that requests from inside `on_next` is fed by the same
/// drain loop instead of a nested call.
pub struct SourcePublisher<T> {
    factory: SourceFactory<T>,
    config: PublisherConfig,
    /// Exchanges admitted and not yet released.
    active: Arc<AtomicUsize>,
    next_id: AtomicU64,
}

impl<T: Send + 'static> SourcePublisher<T> {
    /// Create a publisher from a source factory.
    pub fn new(factory: SourceFactory<T>) -> Self {
        Self {
            factory,
            config: PublisherConfig::default(),
            active: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Publisher over any source type built by `make`.
    pub fn from_source_fn<F, S>(make: F) -> Self
    where
        F: Fn() -> Result<S> + Send + Sync + 'static,
        S: Source<T> + 'static,
    {
        Self::new(Box::new(move || {
            make().map(|source| Box::new(source) as Box<dyn Source<T>>)
        }))
    }

    /// Publisher over a freshly created iterator per subscriber.
    pub fn from_iter<F, I>(make: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::from_source_fn(move || Ok(IterSource::new(make())))
    }

    /// Publisher over an iterator of results; the first `Err` fails the exchange.
    pub fn from_fallible_iter<F, I, E>(make: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = std::result::Result<T, E>>,
        I::IntoIter: Send + 'static,
        E: Into<StreamError> + 'static,
    {
        Self::from_source_fn(move || Ok(FallibleIterSource::new(make())))
    }

    /// Replace the default configuration.
    pub fn with_config(mut self, config: PublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the configuration in effect.
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Number of exchanges that have not yet terminated or been cancelled.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Reserve a slot and build the source, or explain the rejection.
    fn admit(&self) -> Result<Box<dyn Source<T>>> {
        let mut active = self.active.load(Ordering::Acquire);
        loop {
            if !self.config.admits(active) {
                return Err(StreamError::Rejected(format!(
                    "subscriber limit of {} reached",
                    self.config.max_subscribers.unwrap_or_default()
                )));
            }
            match self.active.compare_exchange_weak(
                active,
                active + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => active = actual,
            }
        }

        let built = panic::catch_unwind(AssertUnwindSafe(|| (self.factory)()))
            .unwrap_or_else(|payload| Err(StreamError::from_panic(payload)));
        if built.is_err() {
            self.active.fetch_sub(1, Ordering::AcqRel);
        }
        built
    }
}

impl<T: Send + 'static> Publisher<T> for SourcePublisher<T> {
    /// Rejected subscribers receive `on_subscribe` followed by `on_error`.
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));

        let exchange = match self.admit() {
            Ok(source) => {
                debug!(subscription = %id, "subscription accepted");
                let active = Arc::clone(&self.active);
                Exchange::with_release_hook(
                    id,
                    subscriber,
                    source,
                    Box::new(move |_, _| {
                        active.fetch_sub(1, Ordering::AcqRel);
                    }),
                )
            }
            Err(cause) => {
                warn!(subscription = %id, error = %cause, "subscription rejected");
                Exchange::new(id, subscriber, Box::new(FailedSource::new(cause)))
            }
        };

        exchange.start();
    }
}
