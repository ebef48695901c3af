//! In-process event log.
//!
//! Holds every board in a map behind a `tokio::sync::RwLock`. Tokens come
//! from one monotonic counter shared by all boards and are never reused,
//! not even after a clear. Fault hooks let tests fail or lose appends and
//! clears, and drop a board's live feed.

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use canvas::board::BoardId;
use canvas::element::{self, ArrivalToken, Record, RemoteRecord};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};

use crate::error::LogError;
use crate::log::{Ack, EventLog, Subscription};

struct BoardLog {
    records: Vec<RemoteRecord>,
    feed: watch::Sender<Vec<RemoteRecord>>,
}

impl BoardLog {
    fn new() -> Self {
        let (feed, _) = watch::channel(Vec::new());
        Self { records: Vec::new(), feed }
    }

    fn publish(&self) {
        self.feed.send_replace(self.records.clone());
    }
}

/// Injected failures, consumed one per call.
#[derive(Debug, Default)]
struct Faults {
    /// Appends rejected before storing.
    failed_appends: usize,
    /// Appends stored whose acknowledgement is lost.
    lost_acks: usize,
    failed_clears: usize,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    FailAppend,
    LoseAck,
    FailClear,
}

#[derive(Default)]
pub struct MemoryLog {
    boards: RwLock<HashMap<BoardId, BoardLog>>,
    last_token: AtomicU64,
    faults: RwLock<Faults>,
}

impl MemoryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records currently stored for `board`, ascending by token.
    pub async fn records(&self, board: &BoardId) -> Vec<RemoteRecord> {
        let boards = self.boards.read().await;
        boards.get(board).map(|b| b.records.clone()).unwrap_or_default()
    }

    /// Number of open subscriptions on `board`.
    pub async fn subscriber_count(&self, board: &BoardId) -> usize {
        let boards = self.boards.read().await;
        boards.get(board).map_or(0, |b| b.feed.receiver_count())
    }

    /// End every live feed of `board`. Records are kept.
    pub async fn disconnect(&self, board: &BoardId) {
        let mut boards = self.boards.write().await;
        if let Some(log) = boards.get_mut(board) {
            let (feed, _) = watch::channel(log.records.clone());
            log.feed = feed;
            info!(%board, "memory log: feed dropped");
        }
    }

    /// Reject the next `n` appends with a retryable error.
    pub async fn fail_appends(&self, n: usize) {
        self.faults.write().await.failed_appends = n;
    }

    /// Store the next `n` appends but report them as timed out.
    pub async fn lose_acks(&self, n: usize) {
        self.faults.write().await.lost_acks = n;
    }

    /// Fail the next `n` clears.
    pub async fn fail_clears(&self, n: usize) {
        self.faults.write().await.failed_clears = n;
    }

    async fn take_fault(&self, fault: Fault) -> bool {
        let mut faults = self.faults.write().await;
        let slot = match fault {
            Fault::FailAppend => &mut faults.failed_appends,
            Fault::LoseAck => &mut faults.lost_acks,
            Fault::FailClear => &mut faults.failed_clears,
        };
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }
}

#[async_trait]
impl EventLog for MemoryLog {
    async fn append(&self, board: &BoardId, record: Record) -> Result<Ack, LogError> {
        if self.take_fault(Fault::FailAppend).await {
            return Err(LogError::Unavailable("injected append failure".into()));
        }

        let token = {
            let mut boards = self.boards.write().await;
            let log = boards.entry(board.clone()).or_insert_with(BoardLog::new);

            let existing = element::nonce_of(&record).and_then(|nonce| {
                log.records
                    .iter()
                    .find(|r| element::nonce_of(&r.record) == Some(nonce))
                    .map(|r| r.token)
            });
            match existing {
                Some(token) => {
                    debug!(%board, %token, "memory log: duplicate nonce");
                    token
                }
                None => {
                    let token = ArrivalToken(self.last_token.fetch_add(1, Ordering::SeqCst) + 1);
                    log.records.push(RemoteRecord::new(token, record));
                    log.publish();
                    token
                }
            }
        };

        if self.take_fault(Fault::LoseAck).await {
            return Err(LogError::Timeout);
        }
        Ok(Ack { token })
    }

    async fn subscribe(&self, board: &BoardId) -> Result<Subscription, LogError> {
        let mut boards = self.boards.write().await;
        let log = boards.entry(board.clone()).or_insert_with(BoardLog::new);
        let mut feed = log.feed.subscribe();
        feed.mark_changed();
        Ok(Subscription::new(board.clone(), feed))
    }

    async fn clear_all(&self, board: &BoardId) -> Result<(), LogError> {
        if self.take_fault(Fault::FailClear).await {
            return Err(LogError::Unavailable("injected clear failure".into()));
        }
        let mut boards = self.boards.write().await;
        if let Some(log) = boards.get_mut(board) {
            let count = log.records.len();
            log.records.clear();
            log.publish();
            info!(%board, count, "memory log: cleared");
        }
        Ok(())
    }
}
