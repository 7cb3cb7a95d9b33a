//! # Reactive SPI
//!
//! A push-based, demand-driven streaming protocol between a producer and a
//! consumer.
//!
//! ## Core Concepts
//!
//! - **Publisher**: produces elements and binds each subscriber to a subscription
//! - **Subscriber**: consumes elements through four callbacks
//! - **Subscription**: per-exchange demand ledger and cancellation switch
//! - **Backpressure**: a publisher never emits more than the demand granted
//!
//! Every exchange ends exactly once: `on_complete`, `on_error`, or a silent
//! cancellation. Callbacks to one subscriber never overlap.
//!
//! ## Example
//!
//! ```ignore
//! use reactive_spi::{Publisher, RecordingSubscriber, SourcePublisher};
//!
//! let publisher = SourcePublisher::from_iter(|| vec!["a", "b", "c"]);
//! let (subscriber, probe) = RecordingSubscriber::new();
//! publisher.subscribe(subscriber.with_initial_request(2).boxed());
//!
//! // "a" and "b" delivered; "c" waits for more demand.
//! probe.request(1);
//! ```

pub mod error;
pub mod publisher;
pub mod source;
pub mod spi;
pub mod subscriber;
pub mod subscription;
pub mod types;

// Re-exports
pub use error::{Result, SharedError, StreamError};
pub use publisher::{BroadcastPublisher, PublisherConfig, SourceFactory, SourcePublisher};
pub use source::{FailedSource, FallibleIterSource, FnSource, IterSource, Pull, Source};
pub use spi::{Publisher, Subscriber, Subscription};
pub use subscriber::{ConformanceGuard, Probe, RecordingSubscriber, Signal, Violations};
pub use subscription::{DemandCounter, Exchange, ReleaseHook, UNBOUNDED};
pub use types::{ExchangeState, SubscriptionId};
