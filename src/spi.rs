//! The three protocol roles.
//!
//! A [`Publisher`] hands each [`Subscriber`] a [`Subscription`] through
//! `on_subscribe`. The subscriber signals demand with
//! [`Subscription::request_more`]; the publisher emits at most that many
//! elements through `on_next` and ends the exchange with exactly one of
//! `on_complete` / `on_error`, unless the subscriber cancelled first.
//!
//! Callbacks take `&mut self`: a publisher must own its subscriber
//! exclusively while delivering, so two callbacks to the same subscriber can
//! never overlap.

use crate::error::StreamError;
use std::sync::Arc;

/// Per-exchange handle for demand and cancellation.
///
/// Both operations return immediately and never report errors to the
/// caller. Misuse is reported to the subscriber through `on_error`.
pub trait Subscription: Send + Sync {
    /// Grant `n` more elements.
    ///
    /// `n <= 0` fails the exchange with [`StreamError::NonPositiveDemand`].
    /// Demand saturates instead of overflowing. No-op once terminated.
    fn request_more(&self, n: i64);

    /// Stop the exchange. Idempotent.
    ///
    /// After the publisher observes the cancellation no further callbacks
    /// are delivered, terminal ones included.
    fn cancel(&self);
}

/// Consumer side of an exchange.
pub trait Subscriber<T>: Send {
    /// First callback, delivered exactly once.
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);

    /// One element; consumes one unit of demand.
    fn on_next(&mut self, element: T);

    /// Successful termination. Nothing follows.
    fn on_complete(&mut self);

    /// Failed termination. Nothing follows.
    fn on_error(&mut self, cause: StreamError);
}

/// Producer side of an exchange.
pub trait Publisher<T> {
    /// Bind `subscriber` to a fresh subscription.
    ///
    /// `on_subscribe` is always delivered before anything else, including
    /// when the subscription is rejected.
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>);
}

impl<T, S> Subscriber<T> for Box<S>
where
    S: Subscriber<T> + ?Sized,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        (**self).on_subscribe(subscription)
    }

    fn on_next(&mut self, element: T) {
        (**self).on_next(element)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }

    fn on_error(&mut self, cause: StreamError) {
        (**self).on_error(cause)
    }
}

impl<T, P> Publisher<T> for Arc<P>
where
    P: Publisher<T> + ?Sized,
{
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        (**self).subscribe(subscriber)
    }
}
