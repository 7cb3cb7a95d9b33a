//! Error types for the streaming protocol.

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Shared, clonable upstream error.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Failure description delivered through `Subscriber::on_error`.
///
/// Cloned rather than moved so a broadcast failure can reach every
/// subscriber of the same publisher.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("Demand must be positive, got {0}")]
    NonPositiveDemand(i64),

    #[error("Subscription rejected: {0}")]
    Rejected(String),

    #[error("Source failed: {0}")]
    Source(#[source] SharedError),

    #[error("Source fault: {0}")]
    SourceFault(String),

    #[error("Subscriber buffer overflowed (capacity {capacity})")]
    BufferOverflow { capacity: usize },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Publisher already terminated")]
    Terminated,

    #[error("Publisher dropped before terminating")]
    Abandoned,
}

impl StreamError {
    /// Wrap an arbitrary error, keeping it reachable through `source()`.
    pub fn upstream<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        StreamError::Source(Arc::new(err))
    }

    /// Build a fault from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        StreamError::SourceFault(panic_message(&*payload))
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Result type for producer-facing operations.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_source_keeps_cause_chain() {
        let err = StreamError::upstream(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        let cause = err.source().expect("cause should be kept");
        assert_eq!(cause.to_string(), "pipe closed");
        assert_eq!(err.to_string(), "Source failed: pipe closed");
    }

    #[test]
    fn test_clone_shares_cause() {
        let err = StreamError::upstream(io::Error::new(io::ErrorKind::Other, "boom"));
        let cloned = err.clone();
        match (err, cloned) {
            (StreamError::Source(a), StreamError::Source(b)) => assert!(Arc::ptr_eq(&a, &b)),
            other => panic!("unexpected variants: {:?}", other),
        }
    }

    #[test]
    fn test_panic_message_from_payload() {
        let payload = std::panic::catch_unwind(|| panic!("bad element")).unwrap_err();
        let err = StreamError::from_panic(payload);
        assert!(matches!(err, StreamError::SourceFault(ref m) if m == "panicked: bad element"));
    }
}
