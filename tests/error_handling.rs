//! Error handling and edge case tests.

mod common;

use common::{init_tracing, terminal_count};
use reactive_spi::{
    BroadcastPublisher, FnSource, Publisher, PublisherConfig, Pull, RecordingSubscriber, Signal,
    Source, SourcePublisher, StreamError, Subscriber, Subscription,
};
use std::error::Error as _;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Demand Errors ---

#[test]
fn test_zero_demand_fails_exchange() {
    init_tracing();
    let publisher = SourcePublisher::from_iter(|| 0..10u32);
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.boxed());

    probe.request(0);

    let signals = probe.drain();
    assert_eq!(signals.len(), 2);
    assert!(matches!(
        signals[1],
        Signal::Error(StreamError::NonPositiveDemand(0))
    ));
    assert_eq!(publisher.active_count(), 0);
}

#[test]
fn test_negative_demand_fails_exchange() {
    init_tracing();
    let publisher = SourcePublisher::from_iter(|| 0..10u32);
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.with_initial_request(2).boxed());

    probe.request(-5);
    probe.request(10);

    let signals = probe.drain();
    assert_eq!(Signal::elements(&signals), vec![0, 1]);
    assert_eq!(terminal_count(&signals), 1);
    assert!(matches!(
        signals.last(),
        Some(Signal::Error(StreamError::NonPositiveDemand(-5)))
    ));
}

#[test]
fn test_non_positive_demand_from_on_subscribe() {
    init_tracing();
    let publisher = BroadcastPublisher::<u32>::new();
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.with_initial_request(-1).boxed());

    let signals = probe.drain();
    assert!(matches!(signals[0], Signal::Subscribe));
    assert!(matches!(
        signals[1],
        Signal::Error(StreamError::NonPositiveDemand(-1))
    ));
    assert_eq!(publisher.subscriber_count(), 0);
}

// --- Source Errors ---

#[test]
fn test_source_error_after_elements() {
    init_tracing();
    let publisher = SourcePublisher::from_fallible_iter(|| {
        vec![
            Ok(1u32),
            Ok(2),
            Err(StreamError::SourceFault("disk read failed".to_string())),
        ]
    });
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.with_initial_request(2).boxed());

    // Failure is delivered without further demand.
    let signals = probe.drain();
    assert_eq!(Signal::elements(&signals), vec![1, 2]);
    assert!(matches!(
        signals.last(),
        Some(Signal::Error(StreamError::SourceFault(ref m))) if m == "disk read failed"
    ));
}

#[test]
fn test_upstream_cause_chain_preserved() {
    init_tracing();
    let publisher = SourcePublisher::from_fallible_iter(|| {
        vec![
            Ok("header"),
            Err(StreamError::upstream(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated frame",
            ))),
        ]
    });
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.with_initial_request(5).boxed());

    let signals = probe.drain();
    let Some(Signal::Error(err)) = signals.last() else {
        panic!("expected an error, got {:?}", signals.last());
    };
    let cause = err.source().expect("io cause should be kept");
    assert_eq!(cause.to_string(), "truncated frame");
}

#[test]
fn test_panicking_source_becomes_error() {
    init_tracing();
    let publisher: SourcePublisher<u32> = SourcePublisher::from_source_fn(|| {
        let mut pulled = 0u32;
        Ok(FnSource::new(move || {
            pulled += 1;
            if pulled > 2 {
                panic!("decoder state corrupted");
            }
            Pull::Element(pulled)
        }))
    });
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.with_initial_request(10).boxed());

    let signals = probe.drain();
    assert_eq!(Signal::elements(&signals), vec![1, 2]);
    assert!(matches!(
        signals.last(),
        Some(Signal::Error(StreamError::SourceFault(ref m))) if m.contains("decoder state corrupted")
    ));
    assert_eq!(publisher.active_count(), 0);
}

// --- Rejection ---

#[test]
fn test_rejected_subscriber_sees_subscribe_then_error() {
    init_tracing();
    let publisher = SourcePublisher::from_iter(|| 0..3u32)
        .with_config(PublisherConfig::default().with_max_subscribers(0));
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.with_initial_request(3).boxed());

    let signals = probe.drain();
    assert_eq!(signals.len(), 2);
    assert!(matches!(signals[0], Signal::Subscribe));
    assert!(matches!(signals[1], Signal::Error(StreamError::Rejected(_))));
}

#[test]
fn test_rejected_subscription_ignores_later_calls() {
    init_tracing();
    let publisher = BroadcastPublisher::<u32>::with_config(
        PublisherConfig::default().with_max_subscribers(0),
    );
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.boxed());

    probe.request(1);
    probe.request(-1);
    probe.cancel();
    publisher.emit(1).unwrap();

    assert_eq!(terminal_count(&probe.drain()), 1);
}

// --- After Termination ---

#[test]
fn test_calls_after_completion_are_noops() {
    init_tracing();
    let publisher = SourcePublisher::from_iter(|| vec![1u32]);
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.with_initial_request(1).boxed());
    assert_eq!(terminal_count(&probe.drain()), 1);

    probe.request(1);
    probe.request(0);
    probe.request(-1);
    probe.cancel();
    probe.cancel();

    assert!(probe.drain().is_empty());
}

#[test]
fn test_calls_after_cancel_are_noops() {
    init_tracing();
    let publisher = SourcePublisher::from_iter(|| 0..10u32);
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.with_initial_request(1).boxed());

    probe.cancel();
    probe.request(5);
    probe.request(-3);

    let signals = probe.drain();
    assert_eq!(Signal::elements(&signals), vec![0]);
    assert_eq!(terminal_count(&signals), 0);
}

// --- Subscriber Faults ---

/// Subscriber that panics on its first element.
struct Exploding {
    calls: Arc<AtomicUsize>,
}

impl Subscriber<u32> for Exploding {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        subscription.request_more(10);
    }

    fn on_next(&mut self, _element: u32) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("handler bug");
    }

    fn on_complete(&mut self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&mut self, _cause: StreamError) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_panicking_subscriber_is_cancelled_alone() {
    init_tracing();
    let publisher = BroadcastPublisher::<u32>::new();
    let calls = Arc::new(AtomicUsize::new(0));
    publisher.subscribe(Box::new(Exploding {
        calls: Arc::clone(&calls),
    }));
    let (healthy, probe) = RecordingSubscriber::new();
    publisher.subscribe(healthy.with_initial_request(10).boxed());

    publisher.emit(1u32).unwrap();
    publisher.emit(2u32).unwrap();
    publisher.complete().unwrap();

    // One on_next, then nothing: the panic cancelled that exchange.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let signals = probe.drain();
    assert_eq!(Signal::elements(&signals), vec![1, 2]);
    assert!(matches!(signals.last(), Some(Signal::Complete)));
}

#[test]
fn test_panicking_factory_rejects() {
    init_tracing();
    let publisher: SourcePublisher<u32> =
        SourcePublisher::new(Box::new(|| -> reactive_spi::Result<Box<dyn Source<u32>>> {
            panic!("factory exploded")
        }));
    let (subscriber, probe) = RecordingSubscriber::new();
    publisher.subscribe(subscriber.boxed());

    let signals = probe.drain();
    assert!(matches!(signals[0], Signal::Subscribe));
    assert!(matches!(signals[1], Signal::Error(_)));
    assert_eq!(publisher.active_count(), 0);
}
