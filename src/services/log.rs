//! Log service: append, subscribe, clear, and snapshot fan-out.
//!
//! DESIGN
//! ======
//! Each board is an append-only list of records in `AppState::boards`. Every
//! change pushes the full current list, as one `board:snapshot` frame, to
//! every subscribed connection, including the author. The push happens
//! before the handler returns, so the author's snapshot is queued ahead of
//! its reply. Pushes never block and never drop: each connection's queue
//! keeps the latest snapshot per board.
//!
//! With a database, records are written through before they become visible
//! and the board is loaded on first use. Database calls run without the
//! board lock held; the lock is taken afterwards to update memory and push.
//! Without a database, tokens come from an in-process counter.
//!
//! ERROR HANDLING
//! ==============
//! Records are validated with the same decoder clients render with; a record
//! clients would skip is rejected with `E_MALFORMED_ELEMENT` instead of being
//! stored. Database failures are retryable.

#[cfg(test)]
#[path = "log_test.rs"]
mod log_test;

use std::sync::atomic::Ordering;

use canvas::board::BoardId;
use canvas::element::{self, ArrivalToken, MalformedElement, Record, RemoteRecord};
use frames::Frame;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::persistence;
use crate::state::{AppState, BoardLog, SnapshotQueue};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LogServiceError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("malformed element: {0}")]
    Malformed(#[from] MalformedElement),
    #[error("record is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("invalid board id: {0}")]
    BadBoardId(#[from] canvas::board::BoardIdError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl frames::ErrorCode for LogServiceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) | Self::TooLarge { .. } => "E_BAD_REQUEST",
            Self::Malformed(_) => "E_MALFORMED_ELEMENT",
            Self::BadBoardId(_) => "E_BAD_BOARD_ID",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Validate and store one record, then push the new snapshot.
///
/// # Errors
///
/// Returns a validation error for oversized or malformed records and a
/// database error if write-through fails.
pub async fn append(state: &AppState, board: &BoardId, record: Record) -> Result<ArrivalToken, LogServiceError> {
    let size = serde_json::to_vec(&record).map_or(usize::MAX, |b| b.len());
    let limit = state.config.max_record_bytes;
    if size > limit {
        return Err(LogServiceError::TooLarge { size, limit });
    }
    let element = element::deserialize(&record)?;

    hydrate(state, board).await?;

    let nonce = element::nonce_of(&record).map(str::to_owned);

    // Write-through happens outside the board lock. A retried nonce gets the
    // stored token back from the database.
    let stored = match &state.pool {
        Some(pool) => Some(persistence::insert_record(pool, board, nonce.as_deref(), &record).await?),
        None => None,
    };

    let mut boards = state.boards.write().await;
    let log = boards.entry(board.clone()).or_insert_with(BoardLog::new);

    let token = match stored {
        Some(token) => token,
        None => {
            if let Some(token) = nonce.as_deref().and_then(|n| log.token_for_nonce(n)) {
                debug!(%board, %token, "log: duplicate nonce");
                return Ok(token);
            }
            ArrivalToken(state.last_token.fetch_add(1, Ordering::SeqCst) + 1)
        }
    };

    // Already present after a retried nonce or a concurrent hydrate.
    if log.records.iter().any(|r| r.token == token) {
        debug!(%board, %token, "log: record already held");
        return Ok(token);
    }
    log.records.push(RemoteRecord::new(token, record));
    log.records.sort_by_key(|r| r.token);
    info!(%board, %token, kind = element.kind(), "log: appended");
    broadcast_snapshot(board, log);
    Ok(token)
}

/// Register `client_id` for snapshots of `board` and push the current
/// snapshot to it.
///
/// # Errors
///
/// Returns a database error if the board cannot be loaded.
pub async fn subscribe(
    state: &AppState,
    board: &BoardId,
    client_id: Uuid,
    queue: SnapshotQueue,
) -> Result<(), LogServiceError> {
    hydrate(state, board).await?;

    let mut boards = state.boards.write().await;
    let log = boards.entry(board.clone()).or_insert_with(BoardLog::new);
    queue.push(board, snapshot_frame(board, &log.records));
    log.clients.insert(client_id, queue);
    info!(%board, %client_id, subscribers = log.clients.len(), "log: subscribed");
    Ok(())
}

/// Stop sending snapshots of `board` to `client_id`. A database-backed board
/// with no subscribers left is evicted from memory.
pub async fn unsubscribe(state: &AppState, board: &BoardId, client_id: Uuid) {
    let mut boards = state.boards.write().await;
    let Some(log) = boards.get_mut(board) else {
        return;
    };
    if log.clients.remove(&client_id).is_none() {
        return;
    }
    debug!(%board, %client_id, "log: unsubscribed");

    if log.clients.is_empty() && state.pool.is_some() {
        boards.remove(board);
        info!(%board, "log: evicted idle board");
    }
}

/// Delete every record of `board` and push the empty snapshot.
///
/// # Errors
///
/// Returns a database error if the delete fails; the board is unchanged.
pub async fn clear_all(state: &AppState, board: &BoardId) -> Result<(), LogServiceError> {
    if let Some(pool) = &state.pool {
        persistence::delete_records(pool, board).await?;
    }
    let mut boards = state.boards.write().await;
    let log = boards.entry(board.clone()).or_insert_with(BoardLog::new);
    let count = log.records.len();
    log.records.clear();
    log.hydrated = true;
    info!(%board, count, "log: cleared");
    broadcast_snapshot(board, log);
    Ok(())
}

/// Current records of `board` as held in memory.
pub async fn records(state: &AppState, board: &BoardId) -> Vec<RemoteRecord> {
    let boards = state.boards.read().await;
    boards.get(board).map(|l| l.records.clone()).unwrap_or_default()
}

// =============================================================================
// HELPERS
// =============================================================================

/// Load the board from the database once.
async fn hydrate(state: &AppState, board: &BoardId) -> Result<(), LogServiceError> {
    let Some(pool) = &state.pool else {
        return Ok(());
    };
    {
        let boards = state.boards.read().await;
        if boards.get(board).is_some_and(|l| l.hydrated) {
            return Ok(());
        }
    }

    let loaded = persistence::load_records(pool, board).await?;

    let mut boards = state.boards.write().await;
    let log = boards.entry(board.clone()).or_insert_with(BoardLog::new);
    if !log.hydrated {
        info!(%board, count = loaded.len(), "log: hydrated");
        log.records = loaded;
        log.hydrated = true;
    }
    Ok(())
}

/// Snapshot push for `board`. Not a reply, so it carries no `parent_id`.
#[must_use]
pub fn snapshot_frame(board: &BoardId, records: &[RemoteRecord]) -> Frame {
    let records = serde_json::to_value(records).unwrap_or_else(|e| {
        warn!(%board, error = %e, "log: snapshot encode failed");
        serde_json::Value::Array(Vec::new())
    });
    Frame::request(frames::BOARD_SNAPSHOT)
        .with_board_id(board.as_str())
        .with_data(frames::FRAME_RECORDS, records)
}

fn broadcast_snapshot(board: &BoardId, log: &BoardLog) {
    let frame = snapshot_frame(board, &log.records);
    for queue in log.clients.values() {
        queue.push(board, frame.clone());
    }
}
