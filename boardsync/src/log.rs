//! The remote event log contract.
//!
//! DESIGN
//! ======
//! A board's history is an append-only list of records, each stamped with a
//! server-assigned [`ArrivalToken`]. Subscribers never receive deltas: every
//! change pushes the full current record set, ascending by token. Clients
//! therefore converge by replacing their confirmed list on every delivery.
//!
//! `Subscription` wraps a `tokio::sync::watch` receiver, so a slow reader
//! skips intermediate snapshots and only ever sees the latest one.

use async_trait::async_trait;
use canvas::board::BoardId;
use canvas::element::{ArrivalToken, Record, RemoteRecord};
use tokio::sync::watch;

use crate::error::LogError;

/// Acknowledgement of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub token: ArrivalToken,
}

/// Remote, durable, ordered store of board records.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Store one record and return its arrival token. A record whose `nonce`
    /// is already on the board is not stored again; the existing token is
    /// returned.
    async fn append(&self, board: &BoardId, record: Record) -> Result<Ack, LogError>;

    /// Open a live feed of full snapshots. The first snapshot arrives
    /// without waiting for a change.
    async fn subscribe(&self, board: &BoardId) -> Result<Subscription, LogError>;

    /// Delete every record of the board in one step.
    async fn clear_all(&self, board: &BoardId) -> Result<(), LogError>;
}

type Release = Box<dyn FnOnce() + Send + Sync>;

/// A live feed of board snapshots.
///
/// Dropping or closing the subscription releases it exactly once.
pub struct Subscription {
    board: BoardId,
    feed: watch::Receiver<Vec<RemoteRecord>>,
    release: Option<Release>,
}

impl Subscription {
    #[must_use]
    pub fn new(board: BoardId, feed: watch::Receiver<Vec<RemoteRecord>>) -> Self {
        Self { board, feed, release: None }
    }

    /// Run `release` when the subscription is closed or dropped.
    #[must_use]
    pub fn on_release(mut self, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    #[must_use]
    pub fn board(&self) -> &BoardId {
        &self.board
    }

    /// Wait for the next snapshot. Returns `None` once the feed has dropped.
    pub async fn next(&mut self) -> Option<Vec<RemoteRecord>> {
        if self.feed.changed().await.is_err() {
            return None;
        }
        Some(self.feed.borrow_and_update().clone())
    }

    /// Release the subscription now.
    pub fn close(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("board", &self.board)
            .field("released", &self.release.is_none())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn board() -> BoardId {
        BoardId::new("b").unwrap()
    }

    #[tokio::test]
    async fn next_returns_none_when_feed_drops() {
        let (tx, rx) = watch::channel(Vec::new());
        let mut sub = Subscription::new(board(), rx);
        drop(tx);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn pending_snapshot_is_delivered_before_drop() {
        let (tx, rx) = watch::channel(Vec::new());
        let mut sub = Subscription::new(board(), rx);
        tx.send_replace(vec![RemoteRecord::new(ArrivalToken(1), Record::new())]);
        drop(tx);
        assert_eq!(sub.next().await.map(|s| s.len()), Some(1));
        assert_eq!(sub.next().await, None);
    }

    #[test]
    fn release_runs_once_on_close() {
        let count = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = watch::channel(Vec::new());
        let c = count.clone();
        let sub = Subscription::new(board(), rx).on_release(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.close();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_runs_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = watch::channel(Vec::new());
        let c = count.clone();
        {
            let _sub = Subscription::new(board(), rx).on_release(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
