//! Tests for the poller. Time is paused, so sleeps advance instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use runboard_core::{Poller, FETCH_INTERVAL};

fn counting_poller(interval: Duration) -> (Poller<usize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let poller = Poller::spawn(interval, move || {
        let counter = counter.clone();
        async move { counter.fetch_add(1, Ordering::SeqCst) + 1 }
    });
    (poller, calls)
}

#[tokio::test(start_paused = true)]
async fn test_fetches_immediately_then_periodically() {
    let (poller, calls) = counting_poller(FETCH_INTERVAL);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(poller.latest(), Some(1));

    tokio::time::sleep(FETCH_INTERVAL).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(FETCH_INTERVAL * 3).await;
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(poller.completed(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetches_never_overlap() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (a, p) = (active.clone(), peak.clone());

    let poller = Poller::spawn(Duration::from_secs(1), move || {
        let (a, p) = (a.clone(), p.clone());
        async move {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            // Slower than the interval.
            tokio::time::sleep(Duration::from_secs(3)).await;
            a.fetch_sub(1, Ordering::SeqCst);
        }
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(poller.in_flight(), 1);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert!(poller.in_flight() <= 1);
    // Each cycle is 3s of work plus 1s of waiting.
    assert_eq!(poller.completed(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_flush_fetches_now() {
    let (poller, calls) = counting_poller(Duration::from_secs(60));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let fresh = poller.flush().await.unwrap();
    assert_eq!(fresh, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(poller.latest(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_updates() {
    let (poller, _calls) = counting_poller(Duration::from_secs(1));
    let mut rx = poller.subscribe();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), Some(1));
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_polling() {
    let (poller, calls) = counting_poller(Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    poller.stop().await;

    let seen = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), seen);
}

#[tokio::test(start_paused = true)]
async fn test_drop_halts_polling() {
    let (poller, calls) = counting_poller(Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let mut rx = poller.subscribe();
    rx.borrow_and_update();
    drop(poller);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // The publishing side is gone with the task.
    assert!(rx.changed().await.is_err());
}
