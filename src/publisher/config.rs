//! Publisher configuration.

/// Configuration shared by the bundled publishers.
#[derive(Clone, Debug)]
pub struct PublisherConfig {
    /// Max buffered elements per broadcast subscriber before it is failed
    /// with `BufferOverflow`.
    /// Default: 1000
    pub buffer_capacity: usize,

    /// Max concurrently active exchanges (None = unlimited).
    /// Subscriptions beyond the limit are rejected.
    pub max_subscribers: Option<usize>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            max_subscribers: None,
        }
    }
}

impl PublisherConfig {
    /// Set the per-subscriber buffer capacity of a broadcast.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Cap the number of concurrently active exchanges.
    pub fn with_max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = Some(max);
        self
    }

    /// Whether one more subscriber fits next to `active` existing ones.
    pub(crate) fn admits(&self, active: usize) -> bool {
        match self.max_subscribers {
            Some(max) => active < max,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PublisherConfig::default();
        assert_eq!(config.buffer_capacity, 1000);
        assert!(config.max_subscribers.is_none());
        assert!(config.admits(usize::MAX - 1));
    }

    #[test]
    fn test_subscriber_limit() {
        let config = PublisherConfig::default().with_max_subscribers(2);
        assert!(config.admits(0));
        assert!(config.admits(1));
        assert!(!config.admits(2));
    }
}
