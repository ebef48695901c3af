//! Persistence service: write-through storage of board records in Postgres.
//!
//! DESIGN
//! ======
//! The `board_records.seq` sequence is the arrival token, so tokens stay
//! monotonic across restarts and are never reused after a clear. The
//! `(board_id, nonce)` unique index makes a retried append idempotent even
//! when two relays race on it.
//!
//! ERROR HANDLING
//! ==============
//! Rows whose JSON is not an object or whose `seq` does not fit a token are
//! skipped with a warning rather than failing the whole board load.

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "persistence_test.rs"]
mod persistence_test;

use canvas::board::BoardId;
use canvas::element::{ArrivalToken, Record, RemoteRecord};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::warn;

/// Load every record of `board`, ascending by token.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn load_records(pool: &PgPool, board: &BoardId) -> Result<Vec<RemoteRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, Json<Value>)>(
        "SELECT seq, record FROM board_records WHERE board_id = $1 ORDER BY seq ASC",
    )
    .bind(board.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(seq, Json(record))| {
            let Ok(token) = u64::try_from(seq) else {
                warn!(%board, seq, "persistence: negative seq skipped");
                return None;
            };
            match record {
                Value::Object(record) => Some(RemoteRecord::new(ArrivalToken(token), record)),
                _ => {
                    warn!(%board, seq, "persistence: non-object record skipped");
                    None
                }
            }
        })
        .collect())
}

/// Insert one record and return its token. A record whose nonce is already
/// stored for the board is not inserted again; the stored token is returned.
///
/// # Errors
///
/// Returns a database error if the insert or lookup fails.
pub async fn insert_record(
    pool: &PgPool,
    board: &BoardId,
    nonce: Option<&str>,
    record: &Record,
) -> Result<ArrivalToken, sqlx::Error> {
    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO board_records (board_id, nonce, record)
         VALUES ($1, $2, $3)
         ON CONFLICT (board_id, nonce) WHERE nonce IS NOT NULL DO NOTHING
         RETURNING seq",
    )
    .bind(board.as_str())
    .bind(nonce)
    .bind(Json(record))
    .fetch_optional(pool)
    .await?;

    let seq = match inserted {
        Some(seq) => seq,
        None => {
            sqlx::query_scalar::<_, i64>("SELECT seq FROM board_records WHERE board_id = $1 AND nonce = $2")
                .bind(board.as_str())
                .bind(nonce)
                .fetch_one(pool)
                .await?
        }
    };

    u64::try_from(seq)
        .map(ArrivalToken)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Delete every record of `board`. Returns the number of rows removed.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_records(pool: &PgPool, board: &BoardId) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM board_records WHERE board_id = $1")
        .bind(board.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
