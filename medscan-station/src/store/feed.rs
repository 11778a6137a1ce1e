//! Live comment feed
//!
//! Combines the initial `list()` snapshot with the insert subscription so
//! a viewer sees every record exactly once. Subscribing before listing
//! closes the race where an insert lands between the two; any record the
//! snapshot already contained is suppressed when it arrives again on the
//! channel.

use super::comments::CommentStore;
use medscan_common::records::FeedbackRecord;
use medscan_common::Result;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// A viewer's live, dedup'd subscription to new records
pub struct LiveFeed {
    seen: HashSet<Uuid>,
    rx: broadcast::Receiver<FeedbackRecord>,
}

impl LiveFeed {
    /// Open the read path: subscribe first, then snapshot, so no insert can
    /// fall between the two. Returns the newest-first snapshot plus the
    /// feed of subsequent inserts.
    pub async fn open(store: &CommentStore) -> Result<(Vec<FeedbackRecord>, LiveFeed)> {
        let rx = store.subscribe();
        let snapshot = store.list().await?;
        let seen = snapshot.iter().map(|r| r.id).collect();
        Ok((snapshot, LiveFeed { seen, rx }))
    }

    /// Assemble a feed from an already-fetched snapshot and receiver
    pub fn from_parts(
        snapshot: &[FeedbackRecord],
        rx: broadcast::Receiver<FeedbackRecord>,
    ) -> Self {
        Self {
            seen: snapshot.iter().map(|r| r.id).collect(),
            rx,
        }
    }

    /// Next record not yet seen by this viewer
    ///
    /// Returns `None` once the store (and with it the channel) is gone.
    pub async fn next(&mut self) -> Option<FeedbackRecord> {
        loop {
            match self.rx.recv().await {
                Ok(record) => {
                    if self.seen.insert(record.id) {
                        return Some(record);
                    }
                    // Already delivered via the snapshot; suppress
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "comment feed lagged; records were skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
