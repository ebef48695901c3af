//! WebSocket handler: the event log protocol.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming binary frames → decode + dispatch by syscall prefix
//! - Snapshot queue wake-ups → write the latest snapshot of each board
//!
//! Handler functions validate, call the log service, and return an
//! `Outcome`. The dispatch layer turns it into the reply frame.
//!
//! Snapshots a handler queues for this connection are written before the
//! handler's reply. A client that sees `done` for an append has therefore
//! already received a snapshot containing the record.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch flushes queued snapshots, then replies
//! 4. Close → unsubscribe from every board

use std::collections::HashSet;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use canvas::board::BoardId;
use frames::{Frame, Status};
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::services;
use crate::services::log::LogServiceError;
use crate::state::{AppState, SnapshotQueue};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. Handlers never write to the socket.
enum Outcome {
    /// Send done+data to sender.
    Reply(Value),
    /// Send empty done to sender.
    Done,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    let queue = SnapshotQueue::new();

    let welcome = Frame::request(frames::SESSION_CONNECTED).with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }
    info!(%client_id, "ws: client connected");

    let mut subscriptions: HashSet<BoardId> = HashSet::new();

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let replies = match msg {
                    Message::Binary(bytes) => {
                        process_inbound_bytes(&state, &mut subscriptions, client_id, &queue, &bytes).await
                    }
                    Message::Text(_) => vec![gateway_error("binary frames only")],
                    Message::Close(_) => break,
                    _ => continue,
                };
                if flush_queued(&mut socket, &queue).await.is_err() {
                    break;
                }
                if send_all(&mut socket, &replies).await.is_err() {
                    break;
                }
            }
            () = queue.ready() => {
                if flush_queued(&mut socket, &queue).await.is_err() {
                    break;
                }
            }
        }
    }

    for board in &subscriptions {
        services::log::unsubscribe(&state, board, client_id).await;
    }
    info!(%client_id, boards = subscriptions.len(), "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode and process one inbound frame and return frames for the sender.
async fn process_inbound_bytes(
    state: &AppState,
    subscriptions: &mut HashSet<BoardId>,
    client_id: Uuid,
    queue: &SnapshotQueue,
    bytes: &[u8],
) -> Vec<Frame> {
    let req = match frames::decode_frame(bytes) {
        Ok(frame) => frame.with_from(client_id.to_string()),
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            return vec![gateway_error(format!("invalid frame: {e}"))];
        }
    };
    info!(%client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    if req.status != Status::Request {
        return vec![req.error_from(&LogServiceError::BadRequest("expected a request frame".into()))];
    }

    let result = match req.prefix() {
        "board" => handle_board(state, subscriptions, client_id, queue, &req).await,
        "element" => handle_element(state, &req).await,
        prefix => Err(req.error_from(&LogServiceError::BadRequest(format!("unknown prefix: {prefix}")))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

fn board_of(req: &Frame) -> Result<BoardId, Frame> {
    let Some(raw) = req.board_id.as_deref() else {
        return Err(req.error_from(&LogServiceError::BadRequest("board_id required".into())));
    };
    BoardId::new(raw).map_err(|e| req.error_from(&LogServiceError::from(e)))
}

// =============================================================================
// BOARD HANDLERS
// =============================================================================

async fn handle_board(
    state: &AppState,
    subscriptions: &mut HashSet<BoardId>,
    client_id: Uuid,
    queue: &SnapshotQueue,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let board = board_of(req)?;

    match req.syscall.as_str() {
        frames::BOARD_SUBSCRIBE => {
            services::log::subscribe(state, &board, client_id, queue.clone())
                .await
                .map_err(|e| req.error_from(&e))?;
            subscriptions.insert(board);
            Ok(Outcome::Done)
        }
        frames::BOARD_UNSUBSCRIBE => {
            if subscriptions.remove(&board) {
                services::log::unsubscribe(state, &board, client_id).await;
            }
            Ok(Outcome::Done)
        }
        frames::BOARD_CLEAR => {
            services::log::clear_all(state, &board)
                .await
                .map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Done)
        }
        other => Err(req.error_from(&LogServiceError::BadRequest(format!("unknown board op: {other}")))),
    }
}

// =============================================================================
// ELEMENT HANDLERS
// =============================================================================

async fn handle_element(state: &AppState, req: &Frame) -> Result<Outcome, Frame> {
    if req.syscall != frames::ELEMENT_APPEND {
        return Err(req.error_from(&LogServiceError::BadRequest(format!("unknown element op: {}", req.syscall))));
    }
    let board = board_of(req)?;
    let Some(Value::Object(record)) = req.field(frames::FRAME_RECORD) else {
        return Err(req.error_from(&LogServiceError::BadRequest("record object required".into())));
    };

    let token = services::log::append(state, &board, record.clone())
        .await
        .map_err(|e| req.error_from(&e))?;
    let mut data = serde_json::Map::new();
    data.insert(frames::FRAME_TOKEN.into(), json!(token.0));
    Ok(Outcome::Reply(Value::Object(data)))
}

// =============================================================================
// HELPERS
// =============================================================================

fn gateway_error(message: impl Into<String>) -> Frame {
    Frame::request("gateway:error").with_data(frames::FRAME_MESSAGE, message.into())
}

/// Write every snapshot queued for this connection.
async fn flush_queued(socket: &mut WebSocket, queue: &SnapshotQueue) -> Result<(), ()> {
    send_all(socket, &queue.take()).await
}

async fn send_all(socket: &mut WebSocket, frames: &[Frame]) -> Result<(), ()> {
    for frame in frames {
        send_frame(socket, frame).await?;
    }
    Ok(())
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    if frame.status == Status::Error {
        let code = frame
            .field(frames::FRAME_CODE)
            .and_then(Value::as_str)
            .unwrap_or("-");
        let message = frame.error_message().unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Binary(frames::encode_frame(frame).into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
