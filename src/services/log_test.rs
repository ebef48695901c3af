use frames::ErrorCode;
use serde_json::{Value, json};

use super::*;
use crate::config::Config;
use crate::state::test_helpers::{board, test_app_state, test_app_state_with};

fn stroke() -> Record {
    json!({"type": "line", "tool": "pen", "points": [0, 0, 10, 10, 20, 5], "color": "#ff0000", "width": 5})
        .as_object()
        .cloned()
        .unwrap()
}

fn with_nonce(mut record: Record, nonce: &str) -> Record {
    record.insert("nonce".into(), json!(nonce));
    record
}

/// The one snapshot queued for a single-board subscriber.
fn queued_snapshot(queue: &SnapshotQueue) -> Vec<RemoteRecord> {
    let mut queued = queue.take();
    assert_eq!(queued.len(), 1, "expected one queued snapshot");
    let frame = queued.remove(0);
    assert_eq!(frame.syscall, frames::BOARD_SNAPSHOT);
    assert!(frame.parent_id.is_none());
    serde_json::from_value(frame.field(frames::FRAME_RECORDS).cloned().unwrap_or(Value::Null)).unwrap()
}

#[tokio::test]
async fn append_assigns_increasing_tokens() {
    let state = test_app_state();
    let b = board("room");
    let first = append(&state, &b, stroke()).await.unwrap();
    let second = append(&state, &b, stroke()).await.unwrap();
    assert!(second > first);
    assert_eq!(records(&state, &b).await.len(), 2);
}

#[tokio::test]
async fn subscribe_pushes_current_snapshot() {
    let state = test_app_state();
    let b = board("room");
    append(&state, &b, stroke()).await.unwrap();

    let queue = SnapshotQueue::new();
    subscribe(&state, &b, Uuid::new_v4(), queue.clone()).await.unwrap();
    assert_eq!(queued_snapshot(&queue).len(), 1);
}

#[tokio::test]
async fn append_pushes_full_snapshot_to_every_subscriber() {
    let state = test_app_state();
    let b = board("room");
    let queue_a = SnapshotQueue::new();
    let queue_b = SnapshotQueue::new();
    subscribe(&state, &b, Uuid::new_v4(), queue_a.clone()).await.unwrap();
    subscribe(&state, &b, Uuid::new_v4(), queue_b.clone()).await.unwrap();
    queued_snapshot(&queue_a);
    queued_snapshot(&queue_b);

    append(&state, &b, stroke()).await.unwrap();
    assert_eq!(queued_snapshot(&queue_a).len(), 1);
    append(&state, &b, stroke()).await.unwrap();

    let latest = queued_snapshot(&queue_a);
    assert_eq!(latest.len(), 2);
    assert!(latest[0].token < latest[1].token);
    assert_eq!(queued_snapshot(&queue_b), latest);
}

#[tokio::test]
async fn unread_subscriber_ends_on_latest_snapshot() {
    let state = test_app_state();
    let b = board("room");
    let queue = SnapshotQueue::new();
    subscribe(&state, &b, Uuid::new_v4(), queue.clone()).await.unwrap();

    let mut last = ArrivalToken(0);
    for _ in 0..50 {
        last = append(&state, &b, stroke()).await.unwrap();
    }

    let seen = queued_snapshot(&queue);
    assert_eq!(seen.len(), 50);
    assert_eq!(seen.last().map(|r| r.token), Some(last));
    assert_eq!(seen, records(&state, &b).await);
}

#[tokio::test]
async fn snapshots_of_other_boards_queue_separately() {
    let state = test_app_state();
    let queue = SnapshotQueue::new();
    subscribe(&state, &board("one"), Uuid::new_v4(), queue.clone()).await.unwrap();
    subscribe(&state, &board("two"), Uuid::new_v4(), queue.clone()).await.unwrap();
    append(&state, &board("one"), stroke()).await.unwrap();
    append(&state, &board("two"), stroke()).await.unwrap();

    let boards: Vec<_> = queue.take().into_iter().filter_map(|f| f.board_id).collect();
    assert_eq!(boards, vec!["one".to_owned(), "two".to_owned()]);
}

#[tokio::test]
async fn duplicate_nonce_is_stored_once() {
    let state = test_app_state();
    let b = board("room");
    let first = append(&state, &b, with_nonce(stroke(), "n1")).await.unwrap();
    let again = append(&state, &b, with_nonce(stroke(), "n1")).await.unwrap();
    assert_eq!(first, again);
    assert_eq!(records(&state, &b).await.len(), 1);
}

#[tokio::test]
async fn malformed_record_is_rejected() {
    let state = test_app_state();
    let b = board("room");
    let record = json!({"type": "circle", "r": 3}).as_object().cloned().unwrap();

    let err = append(&state, &b, record).await.unwrap_err();
    assert_eq!(err.error_code(), "E_MALFORMED_ELEMENT");
    assert!(!err.retryable());
    assert!(records(&state, &b).await.is_empty());
}

#[tokio::test]
async fn oversized_record_is_rejected() {
    let state = test_app_state_with(Config { max_record_bytes: 64, ..Config::default() });
    let b = board("room");
    let points: Vec<u32> = (0..200).collect();
    let mut record = stroke();
    record.insert("points".into(), json!(points));

    let err = append(&state, &b, record).await.unwrap_err();
    assert_eq!(err.error_code(), "E_BAD_REQUEST");
}

#[tokio::test]
async fn clear_all_empties_board_and_notifies() {
    let state = test_app_state();
    let b = board("room");
    for _ in 0..10 {
        append(&state, &b, stroke()).await.unwrap();
    }
    let queue = SnapshotQueue::new();
    subscribe(&state, &b, Uuid::new_v4(), queue.clone()).await.unwrap();
    assert_eq!(queued_snapshot(&queue).len(), 10);

    clear_all(&state, &b).await.unwrap();
    assert!(queued_snapshot(&queue).is_empty());

    let after = append(&state, &b, stroke()).await.unwrap();
    assert_eq!(after, ArrivalToken(11), "tokens are not reused after a clear");
}

#[tokio::test]
async fn unsubscribed_client_gets_no_more_snapshots() {
    let state = test_app_state();
    let b = board("room");
    let client = Uuid::new_v4();
    let queue = SnapshotQueue::new();
    subscribe(&state, &b, client, queue.clone()).await.unwrap();
    queued_snapshot(&queue);

    unsubscribe(&state, &b, client).await;
    append(&state, &b, stroke()).await.unwrap();
    assert!(queue.take().is_empty());
}

#[tokio::test]
async fn memory_only_board_survives_last_unsubscribe() {
    let state = test_app_state();
    let b = board("room");
    let client = Uuid::new_v4();
    append(&state, &b, stroke()).await.unwrap();
    subscribe(&state, &b, client, SnapshotQueue::new()).await.unwrap();
    unsubscribe(&state, &b, client).await;
    assert_eq!(records(&state, &b).await.len(), 1);
}

#[test]
fn error_codes() {
    assert_eq!(LogServiceError::BadRequest("x".into()).error_code(), "E_BAD_REQUEST");
    let db = LogServiceError::Database(sqlx::Error::PoolTimedOut);
    assert_eq!(db.error_code(), "E_DATABASE");
    assert!(db.retryable());
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live_db {
    use tokio::time::{Duration, sleep, timeout};

    use super::*;
    use crate::state::AppState;

    async fn live_state() -> AppState {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required for live-db-tests");
        let pool = crate::db::init_pool(&url, 2).await.expect("pool");
        AppState::new(Some(pool), Config::default())
    }

    fn fresh_board() -> BoardId {
        BoardId::new(format!("test-{}", Uuid::new_v4())).unwrap()
    }

    #[tokio::test]
    async fn insert_runs_while_boards_are_locked() {
        let state = live_state().await;
        let pool = state.pool.clone().unwrap();
        let b = fresh_board();
        subscribe(&state, &b, Uuid::new_v4(), SnapshotQueue::new()).await.unwrap();

        let guard = state.boards.read().await;
        let task = tokio::spawn({
            let state = state.clone();
            let b = b.clone();
            async move { append(&state, &b, stroke()).await }
        });

        timeout(Duration::from_secs(5), async {
            while persistence::load_records(&pool, &b).await.unwrap().is_empty() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("insert waited for the board lock");
        assert!(!task.is_finished());

        drop(guard);
        let token = task.await.unwrap().unwrap();
        assert_eq!(records(&state, &b).await.last().map(|r| r.token), Some(token));
    }

    #[tokio::test]
    async fn delete_runs_while_boards_are_locked() {
        let state = live_state().await;
        let pool = state.pool.clone().unwrap();
        let b = fresh_board();
        append(&state, &b, stroke()).await.unwrap();

        let guard = state.boards.read().await;
        let task = tokio::spawn({
            let state = state.clone();
            let b = b.clone();
            async move { clear_all(&state, &b).await }
        });

        timeout(Duration::from_secs(5), async {
            while !persistence::load_records(&pool, &b).await.unwrap().is_empty() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("delete waited for the board lock");

        drop(guard);
        task.await.unwrap().unwrap();
        assert!(records(&state, &b).await.is_empty());
    }
}
