//! Outstanding-demand ledger.

use std::sync::atomic::{AtomicU64, Ordering};

/// Demand value treated as unbounded. Never decremented once reached.
pub const UNBOUNDED: u64 = u64::MAX;

/// Atomic, saturating demand counter.
///
/// Shared between the subscriber (which adds through `request_more`) and
/// the emitting side (which consumes one unit per element). Both sides use
/// CAS loops so concurrent updates are never lost or applied twice.
#[derive(Debug, Default)]
pub struct DemandCounter {
    pending: AtomicU64,
}

impl DemandCounter {
    /// Create a counter with zero outstanding demand.
    pub fn new() -> Self {
        Self {
            pending: AtomicU64::new(0),
        }
    }

    /// Add `n` units, saturating at [`UNBOUNDED`]. Returns the new value.
    pub fn add(&self, n: u64) -> u64 {
        let mut current = self.pending.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(n);
            match self.pending.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Take one unit of demand.
    ///
    /// Returns `false` when nothing is outstanding. Unbounded demand is
    /// reported as available without being decremented.
    #[inline]
    pub fn try_consume(&self) -> bool {
        let mut current = self.pending.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            if current == UNBOUNDED {
                return true;
            }
            match self.pending.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Current outstanding demand.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether demand has saturated to unbounded.
    pub fn is_unbounded(&self) -> bool {
        self.pending() == UNBOUNDED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_and_consume() {
        let demand = DemandCounter::new();
        assert!(!demand.try_consume());

        assert_eq!(demand.add(2), 2);
        assert!(demand.try_consume());
        assert!(demand.try_consume());
        assert!(!demand.try_consume());
        assert_eq!(demand.pending(), 0);
    }

    #[test]
    fn test_add_saturates() {
        let demand = DemandCounter::new();
        demand.add(u64::MAX - 1);
        assert_eq!(demand.add(10), UNBOUNDED);
        assert!(demand.is_unbounded());
    }

    #[test]
    fn test_unbounded_never_decrements() {
        let demand = DemandCounter::new();
        demand.add(UNBOUNDED);
        for _ in 0..1000 {
            assert!(demand.try_consume());
        }
        assert_eq!(demand.pending(), UNBOUNDED);
    }

    #[test]
    fn test_concurrent_add_and_consume() {
        let demand = Arc::new(DemandCounter::new());
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let demand = Arc::clone(&demand);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        demand.add(1);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let demand = Arc::clone(&demand);
                thread::spawn(move || {
                    let mut taken = 0u64;
                    while demand.try_consume() {
                        taken += 1;
                    }
                    taken
                })
            })
            .collect();
        let total: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();

        assert_eq!(total, 40_000);
        assert_eq!(demand.pending(), 0);
    }
}
