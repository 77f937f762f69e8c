use std::sync::{Arc, Mutex};
use std::time::Duration;

use bisect_core::progress::{latest_channel, ProgressEvent, ProgressReporter};

fn event(high: usize) -> ProgressEvent {
    ProgressEvent {
        low: 0,
        high,
        malicious: high % 2 == 0,
        elapsed: Duration::from_millis(high as u64),
    }
}

#[test]
fn reporter_exits_cleanly_without_events() {
    let (tx, rx) = latest_channel::<ProgressEvent>();
    let reporter =
        ProgressReporter::spawn(rx, Duration::from_millis(1), Box::new(|_: &ProgressEvent| {}))
            .expect("spawn reporter");
    drop(tx);
    assert_eq!(reporter.join().expect("join reporter"), 0);
}

#[test]
fn reporter_emits_latest_event_on_tick() {
    let (tx, rx) = latest_channel();
    let seen: Arc<Mutex<Vec<ProgressEvent>>> = Arc::default();
    let sink_seen = Arc::clone(&seen);
    let reporter = ProgressReporter::spawn(
        rx,
        Duration::from_millis(20),
        Box::new(move |e: &ProgressEvent| sink_seen.lock().unwrap().push(*e)),
    )
    .expect("spawn reporter");

    // A burst between ticks: only the newest may be reported.
    for high in 1..=50 {
        tx.publish(event(high));
    }
    std::thread::sleep(Duration::from_millis(120));
    drop(tx);
    let reported = reporter.join().expect("join reporter");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), reported);
    assert_eq!(seen.last().map(|e| e.high), Some(50));
    assert!(seen.len() <= 50);
}

#[test]
fn publish_never_blocks_without_consumer() {
    let (tx, _rx) = latest_channel();
    for high in 0..10_000 {
        assert!(tx.publish(event(high)));
    }
}

#[test]
fn stale_event_is_not_reported_twice() {
    let (tx, rx) = latest_channel();
    let count = Arc::new(Mutex::new(0usize));
    let sink_count = Arc::clone(&count);
    let reporter = ProgressReporter::spawn(
        rx,
        Duration::from_millis(5),
        Box::new(move |_: &ProgressEvent| *sink_count.lock().unwrap() += 1),
    )
    .expect("spawn reporter");

    tx.publish(event(4));
    // Many ticks pass with no new event.
    std::thread::sleep(Duration::from_millis(100));
    drop(tx);
    assert_eq!(reporter.join().expect("join"), 1);
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn publish_overwrites_unconsumed_value() {
    let (tx, rx) = latest_channel();
    assert!(tx.publish(1));
    assert!(tx.publish(2));
    assert!(tx.publish(3));
    assert_eq!(rx.try_recv().ok(), Some(3));
    assert!(rx.try_recv().is_err());
}

#[test]
fn receiver_sees_disconnect_after_sender_drop() {
    let (tx, rx) = latest_channel::<u8>();
    tx.publish(7);
    drop(tx);
    assert_eq!(rx.recv().ok(), Some(7));
    assert!(rx.recv().is_err());
}
