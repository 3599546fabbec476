//! Integration tests for change-feed polling and subtree invalidation

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use ::common::remote::memory::Operation;
use ::common::{ChangeFeed, StalenessMonitor};
use tokio_util::sync::CancellationToken;

use fixtures::RecordingNotifier;

#[tokio::test]
async fn test_change_feed_protocol() {
    let drive = fixtures::setup_drive().await;
    let mut feed = ChangeFeed::new(drive.remote.clone());

    // No marker yet: one poll, no signal
    assert!(!feed.check().await.unwrap());
    assert!(feed.marker().is_some());
    assert_eq!(drive.remote.calls(Operation::PollChangeFeed), 1);

    assert!(!feed.check().await.unwrap());
    assert_eq!(drive.remote.calls(Operation::HasAdvanced), 1);

    drive.remote.touch();
    assert!(feed.check().await.unwrap());
    assert!(feed.marker().is_none());

    // Marker was dropped, so the next step fetches a fresh one
    assert!(!feed.check().await.unwrap());
    assert_eq!(drive.remote.calls(Operation::PollChangeFeed), 2);
}

#[tokio::test]
async fn test_single_invalidation_on_advance() {
    let drive = fixtures::setup_drive().await;
    drive.cache.resolve(&drive.a).await.unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let mut monitor =
        StalenessMonitor::new(drive.cache.clone(), drive.root.clone(), notifier.clone());
    let events = monitor.subscribe();

    assert!(monitor.tick().await.unwrap().is_none());
    assert!(monitor.tick().await.unwrap().is_none());
    assert!(events.is_empty());
    assert!(!drive.cache.get(&drive.root).unwrap().is_shallow());

    drive.remote.touch();
    let event = monitor.tick().await.unwrap().expect("stale event");

    assert_eq!(event.root, drive.root);
    assert_eq!(event.entries, 3);
    assert_eq!(events.len(), 1);
    assert_eq!(events.try_recv().unwrap(), event);
    assert_eq!(notifier.entries.lock().len(), 3);
    assert!(drive.cache.get(&drive.root).unwrap().is_shallow());
    assert!(drive.cache.get(&drive.a).unwrap().is_shallow());
}

#[tokio::test]
async fn test_poll_failure_is_reported_and_retried() {
    let drive = fixtures::setup_drive().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut monitor = StalenessMonitor::new(drive.cache.clone(), drive.root.clone(), notifier);

    drive.remote.set_failing(Operation::PollChangeFeed, true);
    assert!(monitor.tick().await.is_err());

    drive.remote.set_failing(Operation::PollChangeFeed, false);
    assert!(monitor.tick().await.unwrap().is_none());
    assert!(!drive.cache.get(&drive.root).unwrap().is_shallow());
}

#[tokio::test(start_paused = true)]
async fn test_spawned_monitor_ticks_until_cancelled() {
    let drive = fixtures::setup_drive().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut monitor = StalenessMonitor::new(drive.cache.clone(), drive.root.clone(), notifier)
        .with_interval(Duration::from_secs(5));
    let events = monitor.subscribe();
    let cancel = CancellationToken::new();
    let handle = monitor.spawn(cancel.clone());

    // First tick fires immediately and obtains the marker
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(drive.remote.calls(Operation::PollChangeFeed), 1);

    drive.remote.touch();
    tokio::time::sleep(Duration::from_secs(5)).await;
    let event = events.recv_async().await.unwrap();
    assert_eq!(event.root, drive.root);

    cancel.cancel();
    handle.await.unwrap();
    let polls = drive.remote.calls(Operation::HasAdvanced);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(drive.remote.calls(Operation::HasAdvanced), polls);
}
