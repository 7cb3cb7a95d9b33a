//! Hot publisher broadcasting producer-pushed elements.

use super::config::PublisherConfig;
use crate::error::{Result, StreamError};
use crate::source::{FailedSource, IterSource, Pull, Source};
use crate::spi::{Publisher, Subscriber};
use crate::subscription::Exchange;
use crate::types::SubscriptionId;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// How the broadcast ended.
type Outcome = std::result::Result<(), StreamError>;

/// Per-subscriber buffer and its exchange.
struct Feed<T> {
    sender: Sender<T>,
    exchange: Arc<Exchange<T>>,
    outcome: Arc<Mutex<Option<Outcome>>>,
}

struct Registry<T> {
    feeds: HashMap<SubscriptionId, Feed<T>>,
    terminal: Option<Outcome>,
}

/// Source draining one subscriber's buffer.
///
/// Once the sender side is gone and the buffer is empty, the recorded
/// outcome decides between completion and failure.
struct ChannelSource<T> {
    receiver: Receiver<T>,
    outcome: Arc<Mutex<Option<Outcome>>>,
}

impl<T: Send> Source<T> for ChannelSource<T> {
    fn pull(&mut self) -> Pull<T> {
        match self.receiver.try_recv() {
            Ok(element) => Pull::Element(element),
            Err(TryRecvError::Empty) => Pull::Pending,
            Err(TryRecvError::Disconnected) => match self.outcome.lock().clone() {
                Some(Ok(())) => Pull::Exhausted,
                Some(Err(cause)) => Pull::Failed(cause),
                None => Pull::Failed(StreamError::Abandoned),
            },
        }
    }
}

/// Publisher that fans producer-pushed elements out to every subscriber.
///
/// Each subscriber owns a bounded buffer and its own demand ledger, so a
/// slow subscriber never holds back a fast one. A subscriber whose buffer
/// fills up is failed with [`StreamError::BufferOverflow`] and dropped.
///
/// Any number of producer threads may call [`emit`](Self::emit)
/// concurrently; per-subscriber delivery stays serialized.
pub struct BroadcastPublisher<T: Send + 'static> {
    registry: Arc<RwLock<Registry<T>>>,
    config: PublisherConfig,
    next_id: AtomicU64,
}

impl<T: Clone + Send + 'static> BroadcastPublisher<T> {
    /// Create a broadcast with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PublisherConfig::default())
    }

    /// Create a broadcast with explicit buffer and subscriber limits.
    pub fn with_config(config: PublisherConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry {
                feeds: HashMap::new(),
                terminal: None,
            })),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Get the configuration this broadcast was built with.
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Push one element to every active subscriber.
    ///
    /// Returns how many subscribers buffered it. Fails with
    /// [`StreamError::Terminated`] after `complete` or `fail`.
    pub fn emit(&self, element: T) -> Result<usize> {
        let mut buffered = Vec::new();
        let mut overflowed = Vec::new();
        {
            let registry = self.registry.read();
            if registry.terminal.is_some() {
                return Err(StreamError::Terminated);
            }
            for feed in registry.feeds.values() {
                match feed.sender.try_send(element.clone()) {
                    Ok(()) => buffered.push(Arc::clone(&feed.exchange)),
                    Err(TrySendError::Full(_)) => overflowed.push(Arc::clone(&feed.exchange)),
                    // Receiver released; the release hook prunes the feed.
                    Err(TrySendError::Disconnected(_)) => {}
                }
            }
        }

        // Delivery runs outside the registry lock so callbacks may
        // subscribe or emit again.
        let delivered = buffered.len();
        for exchange in buffered {
            exchange.signal();
        }
        let capacity = self.buffer_capacity();
        for exchange in overflowed {
            warn!(subscription = %exchange.id(), capacity, "subscriber buffer overflowed");
            exchange.fail(StreamError::BufferOverflow { capacity });
        }
        Ok(delivered)
    }

    /// Number of subscribers currently receiving elements.
    pub fn subscriber_count(&self) -> usize {
        self.registry.read().feeds.len()
    }

    fn buffer_capacity(&self) -> usize {
        self.config.buffer_capacity.max(1)
    }
}

impl<T: Send + 'static> BroadcastPublisher<T> {
    /// End the broadcast successfully.
    ///
    /// Buffered elements are still delivered against demand before
    /// `on_complete`.
    pub fn complete(&self) -> Result<()> {
        self.terminate(Ok(()))
    }

    /// End the broadcast with a failure, delivered without waiting for demand.
    pub fn fail(&self, cause: StreamError) -> Result<()> {
        self.terminate(Err(cause))
    }

    /// Whether `complete` or `fail` has already run.
    pub fn is_terminated(&self) -> bool {
        self.registry.read().terminal.is_some()
    }

    fn terminate(&self, outcome: Outcome) -> Result<()> {
        let feeds = {
            let mut registry = self.registry.write();
            if registry.terminal.is_some() {
                return Err(StreamError::Terminated);
            }
            registry.terminal = Some(outcome.clone());
            std::mem::take(&mut registry.feeds)
        };

        debug!(subscribers = feeds.len(), failed = outcome.is_err(), "broadcast terminated");
        for (_, feed) in feeds {
            let Feed {
                sender,
                exchange,
                outcome: slot,
            } = feed;
            *slot.lock() = Some(outcome.clone());
            drop(sender);
            match &outcome {
                Ok(()) => exchange.signal(),
                Err(cause) => exchange.fail(cause.clone()),
            }
        }
        Ok(())
    }
}

impl<T: Clone + Send + 'static> Default for BroadcastPublisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Publisher<T> for BroadcastPublisher<T> {
    /// Late subscribers to a terminated broadcast get `on_subscribe`
    /// followed by the recorded terminal signal. Subscribers beyond
    /// `max_subscribers` get `on_subscribe` followed by `on_error`.
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));

        let exchange = {
            let mut registry = self.registry.write();
            match registry.terminal.clone() {
                Some(Ok(())) => {
                    debug!(subscription = %id, "subscribed after completion");
                    let source = IterSource::new(std::iter::empty::<T>());
                    Exchange::new(id, subscriber, Box::new(source))
                }
                Some(Err(cause)) => {
                    debug!(subscription = %id, "subscribed after failure");
                    Exchange::new(id, subscriber, Box::new(FailedSource::new(cause)))
                }
                None if !self.config.admits(registry.feeds.len()) => {
                    let cause = StreamError::Rejected(format!(
                        "subscriber limit of {} reached",
                        self.config.max_subscribers.unwrap_or_default()
                    ));
                    warn!(subscription = %id, error = %cause, "subscription rejected");
                    Exchange::new(id, subscriber, Box::new(FailedSource::new(cause)))
                }
                None => {
                    let (sender, receiver) = bounded(self.buffer_capacity());
                    let outcome = Arc::new(Mutex::new(None));
                    let source = ChannelSource {
                        receiver,
                        outcome: Arc::clone(&outcome),
                    };
                    let registry_ref = Arc::downgrade(&self.registry);
                    let exchange = Exchange::with_release_hook(
                        id,
                        subscriber,
                        Box::new(source),
                        Box::new(move |id, _| {
                            if let Some(registry) = registry_ref.upgrade() {
                                registry.write().feeds.remove(&id);
                            }
                        }),
                    );
                    registry.feeds.insert(
                        id,
                        Feed {
                            sender,
                            exchange: Arc::clone(&exchange),
                            outcome,
                        },
                    );
                    debug!(subscription = %id, "subscription accepted");
                    exchange
                }
            }
        };

        exchange.start();
    }
}

impl<T: Send + 'static> Drop for BroadcastPublisher<T> {
    fn drop(&mut self) {
        if self.terminate(Err(StreamError::Abandoned)).is_ok() {
            debug!("broadcast dropped before terminating");
        }
    }
}
