//! Change-feed polling and whole-subtree invalidation
//!
//! The remote drive has no push notifications. Its change feed only answers
//! whether anything changed since a continuation marker, so a positive answer
//! invalidates the whole watched subtree and tells the filesystem bridge to
//! drop its entry caches. Coarse, but the cache never stays stale for longer
//! than one poll interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::NodeCache;
use crate::error::RemoteError;
use crate::node::NodeId;
use crate::remote::{ContinuationMarker, RemoteTree};

/// Default interval between change-feed polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Lets the monitor tell the filesystem bridge to forget a directory entry.
pub trait EntryNotifier: Send + Sync {
    fn invalidate_entry(&self, parent: &NodeId, name: &str) -> std::io::Result<()>;
}

/// Emitted each time a watched subtree is declared stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleEvent {
    /// Root of the invalidated subtree
    pub root: NodeId,
    /// Number of bridge entries that were notified
    pub entries: usize,
}

/// Holds at most one continuation marker into the remote change feed.
pub struct ChangeFeed {
    remote: Arc<dyn RemoteTree>,
    marker: Option<ContinuationMarker>,
}

impl ChangeFeed {
    pub fn new(remote: Arc<dyn RemoteTree>) -> Self {
        Self {
            remote,
            marker: None,
        }
    }

    pub fn marker(&self) -> Option<&ContinuationMarker> {
        self.marker.as_ref()
    }

    /// One poll step.
    ///
    /// Without a marker, obtains one and reports no change. With a marker,
    /// asks whether the feed has advanced; if so the marker is dropped so the
    /// next step fetches a fresh one.
    pub async fn check(&mut self) -> Result<bool, RemoteError> {
        let Some(marker) = &self.marker else {
            self.marker = Some(self.remote.poll_change_feed().await?);
            return Ok(false);
        };

        let advanced = self.remote.has_advanced(marker).await?;
        if advanced {
            self.marker = None;
        }
        Ok(advanced)
    }
}

/// Periodically invalidates a mounted subtree when the remote changes.
pub struct StalenessMonitor {
    feed: ChangeFeed,
    cache: Arc<NodeCache>,
    root: NodeId,
    notifier: Arc<dyn EntryNotifier>,
    events: Option<flume::Sender<StaleEvent>>,
    interval: Duration,
}

impl StalenessMonitor {
    pub fn new(
        cache: Arc<NodeCache>,
        root: NodeId,
        notifier: Arc<dyn EntryNotifier>,
    ) -> Self {
        Self {
            feed: ChangeFeed::new(cache.remote().clone()),
            cache,
            root,
            notifier,
            events: None,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Report every invalidation on the returned channel.
    pub fn subscribe(&mut self) -> flume::Receiver<StaleEvent> {
        let (tx, rx) = flume::unbounded();
        self.events = Some(tx);
        rx
    }

    /// Run one poll. Returns the event if the subtree was declared stale.
    pub async fn tick(&mut self) -> Result<Option<StaleEvent>, RemoteError> {
        if !self.feed.check().await? {
            return Ok(None);
        }

        // Entries must be collected before invalidation discards them.
        let entries = self.cache.materialized_entries(&self.root);
        self.cache.invalidate_subtree(&self.root);

        for (parent, name) in &entries {
            if let Err(e) = self.notifier.invalidate_entry(parent, name) {
                tracing::debug!(parent = %parent, name = %name, error = %e, "entry notification failed");
            }
        }

        let event = StaleEvent {
            root: self.root.clone(),
            entries: entries.len(),
        };
        tracing::info!(root = %event.root, entries = event.entries, "remote changed, cache invalidated");
        if let Some(events) = &self.events {
            let _ = events.send(event.clone());
        }
        Ok(Some(event))
    }

    /// Poll on a fixed interval until `cancel` fires.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(root = %self.root, "staleness monitor stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.tick().await {
                            tracing::warn!(root = %self.root, error = %e, "change feed poll failed");
                        }
                    }
                }
            }
        })
    }
}
