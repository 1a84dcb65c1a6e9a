//! Realtime notifications and the canonical feed state.
//!
//! Insert notifications arrive in any order relative to local mutations, so
//! they are never applied as deltas. The dispatcher treats each burst of
//! notifications as one trigger to re-fetch the feed into [`FeedStore`],
//! which views observe through a `watch` channel.

use chrono::{DateTime, Utc};
use futures::{FutureExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tracing::{debug, warn};

use guardian_core::FeedItem;

use crate::feed::SymbiosisFeedMerger;
use crate::types::{RealtimeEvent, Result};

/// Immutable view of the feed at one revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    pub items: Vec<FeedItem>,
    /// Incremented on every refresh
    pub revision: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Single owner of the current feed.
pub struct FeedStore {
    tx: watch::Sender<FeedSnapshot>,
}

impl FeedStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FeedSnapshot::default());
        Self { tx }
    }

    pub fn current(&self) -> FeedSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.tx.subscribe()
    }

    /// Snapshots as a stream, starting with the current one.
    pub fn stream(&self) -> WatchStream<FeedSnapshot> {
        WatchStream::new(self.subscribe())
    }

    /// Replace the feed. Returns the new revision.
    pub fn replace(&self, items: Vec<FeedItem>) -> u64 {
        let mut revision = 0;
        self.tx.send_modify(|snapshot| {
            snapshot.items = items;
            snapshot.revision += 1;
            snapshot.refreshed_at = Some(Utc::now());
            revision = snapshot.revision;
        });
        revision
    }
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumes realtime events and refreshes the feed store.
#[derive(Clone)]
pub struct RealtimeDispatcher {
    merger: Arc<SymbiosisFeedMerger>,
    store: Arc<FeedStore>,
}

impl RealtimeDispatcher {
    pub fn new(merger: Arc<SymbiosisFeedMerger>, store: Arc<FeedStore>) -> Self {
        Self { merger, store }
    }

    /// Bounded channel feeding a dispatcher.
    pub fn channel(buffer: usize) -> (mpsc::Sender<RealtimeEvent>, mpsc::Receiver<RealtimeEvent>) {
        mpsc::channel(buffer.max(1))
    }

    /// Re-fetch the feed into the store.
    pub async fn refresh(&self) -> Result<u64> {
        let items = self.merger.get_feed().await?;
        let revision = self.store.replace(items);
        debug!(revision, "Feed store refreshed");
        Ok(revision)
    }

    /// Process events until the stream ends. Events already queued behind the
    /// current one are folded into the same refresh.
    pub async fn run<S>(self, mut events: S)
    where
        S: Stream<Item = RealtimeEvent> + Unpin,
    {
        while let Some(event) = events.next().await {
            let mut relevant = event.table.affects_feed();
            let mut burst = 1usize;

            while let Some(Some(next)) = events.next().now_or_never() {
                relevant |= next.table.affects_feed();
                burst += 1;
            }

            if !relevant {
                debug!(burst, "Realtime burst does not touch the feed");
                continue;
            }
            if let Err(e) = self.refresh().await {
                warn!(error = %e, burst, "Feed refresh after realtime event failed");
            }
        }
        debug!("Realtime stream closed, dispatcher exiting");
    }

    /// Run on a Tokio task over an mpsc receiver.
    pub fn spawn(self, events: mpsc::Receiver<RealtimeEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(ReceiverStream::new(events)))
    }
}
