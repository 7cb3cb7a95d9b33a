//! Subscriber helpers.
//!
//! - [`ConformanceGuard`] wraps any subscriber and cancels upstream when the
//!   publisher breaks the protocol.
//! - [`RecordingSubscriber`] records signals for a [`Probe`], with scripted
//!   demand; used to exercise publishers in tests.

mod guard;
mod recorder;

pub use guard::{ConformanceGuard, Violations};
pub use recorder::{Probe, RecordingSubscriber, Signal};
