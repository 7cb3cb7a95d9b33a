//! Subscription side of an exchange: demand ledger and emission engine.
//!
//! [`Exchange`] is the reusable core for publishers. A publisher creates one
//! per subscriber, hands it a [`Source`](crate::source::Source), and calls
//! [`Exchange::start`]. The exchange then:
//! - delivers `on_subscribe` before anything else
//! - emits only against demand granted through `request_more`
//! - serializes every callback to its subscriber
//! - turns misuse, source faults and panics into `on_error` or cancellation
//!
//! # Example
//!
//! ```ignore
//! let exchange = Exchange::new(
//!     SubscriptionId(1),
//!     Box::new(subscriber),
//!     Box::new(IterSource::new(vec![1, 2, 3])),
//! );
//! exchange.start();
//! ```

mod demand;
mod exchange;

pub use demand::{DemandCounter, UNBOUNDED};
pub use exchange::{Exchange, ReleaseHook};
