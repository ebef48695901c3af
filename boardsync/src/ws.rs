//! `WsLog`: the event log served by the relay over WebSocket.
//!
//! DESIGN
//! ======
//! One connection is shared by every call. A writer task drains an outbound
//! `mpsc` queue into the socket; a reader task routes inbound frames:
//! - terminal replies (`done` / `error`) resolve the pending request with the
//!   matching `parent_id` through a `oneshot`;
//! - `board:snapshot` pushes replace the value of that board's `watch`
//!   channel, which every local `Subscription` of the board reads.
//!
//! When the socket ends, pending requests fail with `Closed` and every feed
//! drops. The next call reconnects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use canvas::board::BoardId;
use canvas::element::{Record, RemoteRecord};
use frames::{Frame, Status};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::LogError;
use crate::log::{Ack, EventLog, Subscription};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const OUTBOUND_CAPACITY: usize = 256;

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Frame>>>>;
type Feeds = Arc<Mutex<HashMap<String, watch::Sender<Vec<RemoteRecord>>>>>;

/// Lock a map, recovering the data if a holder panicked.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Connection {
    outbound: mpsc::Sender<Frame>,
    pending: Pending,
    feeds: Feeds,
    alive: Arc<AtomicBool>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }
}

/// Event log client for the relay server.
pub struct WsLog {
    url: String,
    request_timeout: Duration,
    conn: tokio::sync::Mutex<Option<Arc<Connection>>>,
}

impl WsLog {
    /// Client for the relay at `url` (e.g. `ws://127.0.0.1:3000/ws`). No
    /// connection is made until the first call.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), request_timeout: DEFAULT_REQUEST_TIMEOUT, conn: tokio::sync::Mutex::new(None) }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Drop the current connection. Pending calls fail and feeds end.
    pub async fn disconnect(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.alive.store(false, Ordering::SeqCst);
            lock(&conn.pending).clear();
            lock(&conn.feeds).clear();
            info!(url = %self.url, "ws log: disconnected");
        }
    }

    async fn connection(&self) -> Result<Arc<Connection>, LogError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref().filter(|c| c.is_alive()) {
            return Ok(conn.clone());
        }
        let conn = Arc::new(connect(&self.url).await?);
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Send a request and wait for its terminal reply.
    async fn call(&self, conn: &Connection, req: Frame) -> Result<Frame, LogError> {
        let (tx, rx) = oneshot::channel();
        let id = req.id.clone();
        lock(&conn.pending).insert(id.clone(), tx);

        if conn.outbound.send(req).await.is_err() {
            lock(&conn.pending).remove(&id);
            return Err(LogError::Closed);
        }

        let reply = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(LogError::Closed),
            Err(_) => {
                lock(&conn.pending).remove(&id);
                return Err(LogError::Timeout);
            }
        };

        match reply.status {
            Status::Error => Err(remote_error(&reply)),
            _ => Ok(reply),
        }
    }
}

fn remote_error(frame: &Frame) -> LogError {
    LogError::Remote {
        code: frame
            .field(frames::FRAME_CODE)
            .and_then(Value::as_str)
            .unwrap_or("E_UNKNOWN")
            .to_owned(),
        message: frame.error_message().unwrap_or("error").to_owned(),
        retryable: frame.is_retryable(),
    }
}

#[async_trait]
impl EventLog for WsLog {
    async fn append(&self, board: &BoardId, record: Record) -> Result<Ack, LogError> {
        let conn = self.connection().await?;
        let req = Frame::request(frames::ELEMENT_APPEND)
            .with_board_id(board.as_str())
            .with_data(frames::FRAME_RECORD, Value::Object(record));
        let reply = self.call(&conn, req).await?;
        let token = reply
            .field(frames::FRAME_TOKEN)
            .and_then(Value::as_u64)
            .ok_or_else(|| LogError::Protocol("append reply has no token".into()))?;
        Ok(Ack { token: canvas::element::ArrivalToken(token) })
    }

    async fn subscribe(&self, board: &BoardId) -> Result<Subscription, LogError> {
        let conn = self.connection().await?;

        // The feed must exist before the request: the first snapshot can
        // arrive ahead of the reply.
        let feed = {
            let mut feeds = lock(&conn.feeds);
            match feeds.get(board.as_str()) {
                Some(tx) => {
                    let mut rx = tx.subscribe();
                    rx.mark_changed();
                    rx
                }
                None => {
                    let (tx, rx) = watch::channel(Vec::new());
                    feeds.insert(board.as_str().to_owned(), tx);
                    rx
                }
            }
        };

        let req = Frame::request(frames::BOARD_SUBSCRIBE).with_board_id(board.as_str());
        if let Err(e) = self.call(&conn, req).await {
            let mut feeds = lock(&conn.feeds);
            if feeds.get(board.as_str()).is_some_and(|tx| tx.receiver_count() <= 1) {
                feeds.remove(board.as_str());
            }
            return Err(e);
        }
        debug!(%board, "ws log: subscribed");

        let outbound = conn.outbound.clone();
        let feeds = conn.feeds.clone();
        let board_key = board.as_str().to_owned();
        Ok(Subscription::new(board.clone(), feed).on_release(move || release(&feeds, &outbound, &board_key)))
    }

    async fn clear_all(&self, board: &BoardId) -> Result<(), LogError> {
        let conn = self.connection().await?;
        let req = Frame::request(frames::BOARD_CLEAR).with_board_id(board.as_str());
        self.call(&conn, req).await?;
        Ok(())
    }
}

/// Unsubscribe from the relay once the last local subscription of a board
/// is released.
fn release(feeds: &Feeds, outbound: &mpsc::Sender<Frame>, board: &str) {
    let mut feeds = lock(feeds);
    // The releasing receiver is still alive here.
    let last = feeds.get(board).is_some_and(|tx| tx.receiver_count() <= 1);
    if !last {
        return;
    }
    feeds.remove(board);
    let req = Frame::request(frames::BOARD_UNSUBSCRIBE).with_board_id(board);
    if outbound.try_send(req).is_err() {
        debug!(board, "ws log: unsubscribe not sent, connection gone");
    }
}

// =============================================================================
// CONNECTION TASKS
// =============================================================================

async fn connect(url: &str) -> Result<Connection, LogError> {
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| LogError::Connect(e.to_string()))?;
    let (mut sink, mut source) = stream.split();

    let (outbound, mut outbound_rx) = mpsc::channel::<Frame>(OUTBOUND_CAPACITY);
    let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
    let feeds: Feeds = Arc::new(Mutex::new(HashMap::new()));
    let alive = Arc::new(AtomicBool::new(true));

    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = sink.send(Message::Binary(frames::encode_frame(&frame).into())).await {
                warn!(error = %e, "ws log: send failed");
                break;
            }
        }
        if let Err(e) = sink.close().await {
            debug!(error = %e, "ws log: close failed");
        }
    });

    {
        let pending = pending.clone();
        let feeds = feeds.clone();
        let alive = alive.clone();
        tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(Message::Binary(bytes)) => match frames::decode_frame(&bytes) {
                        Ok(frame) => route(&pending, &feeds, frame),
                        Err(e) => warn!(error = %e, "ws log: undecodable frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "ws log: receive failed");
                        break;
                    }
                }
            }
            alive.store(false, Ordering::SeqCst);
            lock(&pending).clear();
            lock(&feeds).clear();
            info!("ws log: connection closed");
        });
    }

    info!(url, "ws log: connected");
    Ok(Connection { outbound, pending, feeds, alive })
}

fn route(pending: &Pending, feeds: &Feeds, frame: Frame) {
    if frame.syscall == frames::BOARD_SNAPSHOT && frame.parent_id.is_none() {
        let Some(board) = frame.board_id.as_deref() else {
            warn!("ws log: snapshot without board id");
            return;
        };
        let records = frame
            .field(frames::FRAME_RECORDS)
            .cloned()
            .map(serde_json::from_value::<Vec<RemoteRecord>>);
        match records {
            Some(Ok(records)) => {
                if let Some(tx) = lock(feeds).get(board) {
                    tx.send_replace(records);
                }
            }
            Some(Err(e)) => warn!(board, error = %e, "ws log: bad snapshot"),
            None => warn!(board, "ws log: snapshot without records"),
        }
        return;
    }

    if !frame.status.is_terminal() {
        return;
    }
    let Some(parent) = frame.parent_id.clone() else {
        return;
    };
    if let Some(tx) = lock(pending).remove(&parent) {
        if tx.send(frame).is_err() {
            debug!(%parent, "ws log: caller gone before reply");
        }
    }
}
