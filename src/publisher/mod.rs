//! Reference publishers built on [`Exchange`](crate::subscription::Exchange).
//!
//! - [`SourcePublisher`]: cold; every subscriber gets a fresh source and
//!   emission runs on the thread granting demand.
//! - [`BroadcastPublisher`]: hot; producer threads push elements that fan
//!   out to every subscriber through per-subscriber bounded buffers.
//!
//! Both reject subscriptions beyond [`PublisherConfig::max_subscribers`] by
//! delivering `on_subscribe` followed immediately by `on_error`.
//!
//! # Example
//!
//! ```ignore
//! let publisher = BroadcastPublisher::new();
//! let (subscriber, probe) = RecordingSubscriber::new();
//! publisher.subscribe(subscriber.with_initial_request(16).boxed());
//!
//! publisher.emit(42)?;
//! publisher.complete()?;
//! ```

mod broadcast;
mod cold;
mod config;

pub use broadcast::BroadcastPublisher;
pub use cold::{SourceFactory, SourcePublisher};
pub use config::PublisherConfig;
