//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the optional database pool and a map of live board logs. Each
//! board keeps its records in memory, ascending by token, together with the
//! snapshot queue of every subscribed connection.
//!
//! A connection's `SnapshotQueue` holds at most one unsent snapshot per board.
//! Every snapshot carries the full record list, so a newer one replaces the
//! queued one instead of waiting behind it. A slow reader skips intermediate
//! states but always ends on the current list.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, PoisonError};

use canvas::board::BoardId;
use canvas::element::RemoteRecord;
use frames::Frame;
use sqlx::PgPool;
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

use crate::config::Config;

// =============================================================================
// BOARD LOG
// =============================================================================

/// Per-board live state. With a database the records are loaded on first
/// subscribe or append and written through on every change.
#[derive(Default)]
pub struct BoardLog {
    /// Stored records, ascending by token.
    pub records: Vec<RemoteRecord>,
    /// Subscribed connections: `client_id` -> that connection's snapshot queue.
    pub clients: HashMap<Uuid, SnapshotQueue>,
    /// Whether `records` reflects the database.
    pub hydrated: bool,
}

impl BoardLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token already assigned to a record with this nonce.
    #[must_use]
    pub fn token_for_nonce(&self, nonce: &str) -> Option<canvas::element::ArrivalToken> {
        self.records
            .iter()
            .find(|r| canvas::element::nonce_of(&r.record) == Some(nonce))
            .map(|r| r.token)
    }
}

// =============================================================================
// SNAPSHOT QUEUE
// =============================================================================

/// Unsent snapshots of one connection, latest per board.
#[derive(Clone, Default)]
pub struct SnapshotQueue {
    inner: Arc<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    pending: Mutex<Vec<(BoardId, Frame)>>,
    ready: Notify,
}

impl SnapshotQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `frame` as the snapshot of `board`, replacing one not yet taken.
    pub fn push(&self, board: &BoardId, frame: Frame) {
        {
            let mut pending = self.lock();
            match pending.iter_mut().find(|(b, _)| b == board) {
                Some(slot) => slot.1 = frame,
                None => pending.push((board.clone(), frame)),
            }
        }
        self.inner.ready.notify_one();
    }

    /// Remove and return every queued snapshot, oldest board first.
    #[must_use]
    pub fn take(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.lock())
            .into_iter()
            .map(|(_, frame)| frame)
            .collect()
    }

    /// Wait until something may have been pushed since the last wake-up.
    pub async fn ready(&self) {
        self.inner.ready.notified().await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(BoardId, Frame)>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; every field is
/// Arc-wrapped or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: Option<PgPool>,
    pub boards: Arc<RwLock<HashMap<BoardId, BoardLog>>>,
    /// Last token handed out when running without a database.
    pub last_token: Arc<AtomicU64>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: Option<PgPool>, config: Config) -> Self {
        Self {
            pool,
            boards: Arc::new(RwLock::new(HashMap::new())),
            last_token: Arc::new(AtomicU64::new(0)),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// Memory-only state with default config.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(None, Config::default())
    }

    #[must_use]
    pub fn test_app_state_with(config: Config) -> AppState {
        AppState::new(None, config)
    }

    #[must_use]
    pub fn board(id: &str) -> BoardId {
        BoardId::new(id).expect("valid board id")
    }
}
