//! Shared helpers for integration tests.

#![allow(dead_code)]

use reactive_spi::Signal;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(10);

/// Route library logs through the test harness writer.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Number of terminal signals in `signals`.
pub fn terminal_count<T>(signals: &[Signal<T>]) -> usize {
    signals.iter().filter(|s| s.is_terminal()).count()
}
