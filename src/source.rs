//! Pull-side element sources feeding an exchange.
//!
//! An exchange pulls from its [`Source`] only while it is draining. A source
//! that has nothing ready returns [`Pull::Pending`]; whoever later makes an
//! element available is responsible for waking the exchange again.

use crate::error::StreamError;
use std::fmt;

/// Outcome of one pull.
pub enum Pull<T> {
    /// An element is ready.
    Element(T),
    /// Nothing ready yet; the source is still live.
    Pending,
    /// No more elements will ever be produced.
    Exhausted,
    /// Unrecoverable fault.
    Failed(StreamError),
}

impl<T> fmt::Debug for Pull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pull::Element(_) => f.write_str("Element(..)"),
            Pull::Pending => f.write_str("Pending"),
            Pull::Exhausted => f.write_str("Exhausted"),
            Pull::Failed(e) => write!(f, "Failed({e})"),
        }
    }
}

/// A producer of elements for a single exchange.
pub trait Source<T>: Send {
    fn pull(&mut self) -> Pull<T>;
}

impl<T, S> Source<T> for Box<S>
where
    S: Source<T> + ?Sized,
{
    fn pull(&mut self) -> Pull<T> {
        (**self).pull()
    }
}

/// Source over any iterator. Exhausted when the iterator ends.
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I> {
    pub fn new<II>(iter: II) -> Self
    where
        II: IntoIterator<IntoIter = I>,
    {
        Self {
            iter: iter.into_iter(),
        }
    }
}

impl<I> Source<I::Item> for IterSource<I>
where
    I: Iterator + Send,
{
    fn pull(&mut self) -> Pull<I::Item> {
        match self.iter.next() {
            Some(item) => Pull::Element(item),
            None => Pull::Exhausted,
        }
    }
}

/// Source over an iterator of results. The first `Err` fails the exchange.
pub struct FallibleIterSource<I> {
    iter: I,
}

impl<I> FallibleIterSource<I> {
    pub fn new<II>(iter: II) -> Self
    where
        II: IntoIterator<IntoIter = I>,
    {
        Self {
            iter: iter.into_iter(),
        }
    }
}

impl<I, T, E> Source<T> for FallibleIterSource<I>
where
    I: Iterator<Item = std::result::Result<T, E>> + Send,
    E: Into<StreamError>,
{
    fn pull(&mut self) -> Pull<T> {
        match self.iter.next() {
            Some(Ok(item)) => Pull::Element(item),
            Some(Err(e)) => Pull::Failed(e.into()),
            None => Pull::Exhausted,
        }
    }
}

/// Source backed by a closure.
pub struct FnSource<F> {
    f: F,
}

impl<F> FnSource<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> Source<T> for FnSource<F>
where
    F: FnMut() -> Pull<T> + Send,
{
    fn pull(&mut self) -> Pull<T> {
        (self.f)()
    }
}

/// Source that fails on the first pull and is exhausted afterwards.
///
/// Used to reject a subscription: the subscriber still gets
/// `on_subscribe`, immediately followed by `on_error`.
pub struct FailedSource {
    cause: Option<StreamError>,
}

impl FailedSource {
    pub fn new(cause: StreamError) -> Self {
        Self { cause: Some(cause) }
    }
}

impl<T> Source<T> for FailedSource {
    fn pull(&mut self) -> Pull<T> {
        match self.cause.take() {
            Some(cause) => Pull::Failed(cause),
            None => Pull::Exhausted,
        }
    }
}
