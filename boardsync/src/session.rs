//! Board session: runs one [`EngineCore`] against an [`EventLog`].
//!
//! DESIGN
//! ======
//! The engine is synchronous and returns `Action`s. The session takes the
//! ones that need the log (`Commit`, `ClearBoard`) and runs them as tasks in a
//! `JoinSet`; everything else goes back to the host. [`BoardSession::next_event`]
//! waits on the live feed and on task completions at once and folds each
//! result back into the engine before reporting it.
//!
//! ERROR HANDLING
//! ==============
//! An append is retried while the error is retryable and attempts remain,
//! each attempt bounded by `append_timeout`. The record keeps its nonce across
//! attempts, so a lost acknowledgement never stores the element twice. When
//! retries run out the commit is marked failed and stays on screen.
//!
//! A dropped feed is reported once as [`SessionEvent::FeedLost`]; the next
//! call resubscribes with backoff. The first snapshot of the new feed is
//! applied before `Notice::Reconnected` is reported in its place.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use canvas::board::BoardId;
use canvas::element::{ArrivalToken, Record};
use canvas::engine::{Action, EngineCore, Notice};
use canvas::outbox::CommitId;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{LogError, SyncError};
use crate::log::{Ack, EventLog, Subscription};

/// What [`BoardSession::next_event`] observed. The engine has already been
/// updated; the host should re-render.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A snapshot replaced the confirmed list.
    Snapshot { records: usize },
    /// The log stored a commit.
    Committed { id: CommitId, token: ArrivalToken },
    /// A board clear went through.
    Cleared,
    Notice(Notice),
    /// The live feed ended. The next call resubscribes.
    FeedLost,
    /// A resubscribe attempt failed. The next call tries again.
    ResubscribeFailed(LogError),
}

enum TaskOutcome {
    Commit { id: CommitId, result: Result<Ack, SyncError> },
    Clear(Result<(), LogError>),
}

pub struct BoardSession {
    log: Arc<dyn EventLog>,
    board: BoardId,
    config: SyncConfig,
    engine: EngineCore,
    feed: Option<Subscription>,
    tasks: JoinSet<TaskOutcome>,
    resubscribe_attempts: u32,
    /// Resubscribed, fresh snapshot not yet applied.
    reconnecting: bool,
}

impl BoardSession {
    /// Subscribe to `board` and start with an empty engine. The first
    /// [`next_event`](Self::next_event) delivers the current snapshot.
    ///
    /// # Errors
    ///
    /// [`SyncError::Subscribe`] if the log refuses the subscription.
    pub async fn open(log: Arc<dyn EventLog>, board: BoardId, config: SyncConfig) -> Result<Self, SyncError> {
        let feed = log.subscribe(&board).await.map_err(SyncError::Subscribe)?;
        info!(%board, "session: opened");
        Ok(Self {
            log,
            board,
            config,
            engine: EngineCore::new(),
            feed: Some(feed),
            tasks: JoinSet::new(),
            resubscribe_attempts: 0,
            reconnecting: false,
        })
    }

    #[must_use]
    pub fn board(&self) -> &BoardId {
        &self.board
    }

    #[must_use]
    pub fn engine(&self) -> &EngineCore {
        &self.engine
    }

    /// Mutable engine access for input handlers. Pass the returned actions
    /// to [`handle`](Self::handle).
    pub fn engine_mut(&mut self) -> &mut EngineCore {
        &mut self.engine
    }

    /// Whether the live feed is currently up.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.feed.is_some()
    }

    /// Appends and clears still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Start the log work among `actions` and return the rest for the host.
    pub fn handle(&mut self, actions: Vec<Action>) -> Vec<Action> {
        let mut rest = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                Action::Commit { id, record } => self.spawn_commit(id, record),
                Action::ClearBoard => self.spawn_clear(),
                other => rest.push(other),
            }
        }
        rest
    }

    /// Resubmit a failed commit.
    pub fn retry_failed(&mut self, id: CommitId) -> Vec<Action> {
        let actions = self.engine.retry_failed(id);
        self.handle(actions)
    }

    pub fn discard_failed(&mut self, id: CommitId) -> Vec<Action> {
        self.engine.discard_failed(id)
    }

    /// Run the whole clear flow inline: request, confirm and wait for the
    /// log. Returns `Ok(false)` if the user declined or a clear is already
    /// underway.
    ///
    /// # Errors
    ///
    /// [`SyncError::ClearFailed`] if the log rejects the clear or it times
    /// out. The board is unchanged.
    pub async fn clear_board(&mut self, confirmed: bool) -> Result<bool, SyncError> {
        if self.engine.request_clear().is_empty() {
            return Ok(false);
        }
        if !self.engine.confirm_clear(confirmed).contains(&Action::ClearBoard) {
            return Ok(false);
        }
        let result = clear_with_timeout(self.log.as_ref(), &self.board, self.config).await;
        self.engine.clear_finished(result.clone().map_err(|e| e.to_string()));
        result.map(|()| true).map_err(SyncError::ClearFailed)
    }

    /// Wait for the next snapshot or finished task and apply it to the
    /// engine.
    pub async fn next_event(&mut self) -> SessionEvent {
        loop {
            let Some(feed) = self.feed.as_mut() else {
                if let Err(e) = self.resubscribe().await {
                    return SessionEvent::ResubscribeFailed(e);
                }
                continue;
            };

            tokio::select! {
                snapshot = feed.next() => match snapshot {
                    Some(records) => {
                        let count = records.len();
                        self.engine.apply_snapshot(records);
                        if std::mem::take(&mut self.reconnecting) {
                            info!(board = %self.board, records = count, "session: reconnected");
                            return SessionEvent::Notice(Notice::Reconnected);
                        }
                        return SessionEvent::Snapshot { records: count };
                    }
                    None => {
                        warn!(board = %self.board, "session: feed lost");
                        self.feed = None;
                        self.reconnecting = false;
                        return SessionEvent::FeedLost;
                    }
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Some(event) = self.finish_task(joined) {
                        return event;
                    }
                }
            }
        }
    }

    /// Wait for in-flight work, then release the subscription.
    pub async fn close(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            self.finish_task(joined);
        }
        if let Some(feed) = self.feed.take() {
            feed.close();
        }
        info!(board = %self.board, "session: closed");
    }

    // =========================================================================
    // TASKS
    // =========================================================================

    fn spawn_commit(&mut self, id: CommitId, record: Record) {
        let log = self.log.clone();
        let board = self.board.clone();
        let config = self.config;
        debug!(%board, %id, "session: committing");
        self.tasks.spawn(async move {
            let result = append_with_retry(log.as_ref(), &board, id, record, config).await;
            TaskOutcome::Commit { id, result }
        });
    }

    fn spawn_clear(&mut self) {
        let log = self.log.clone();
        let board = self.board.clone();
        let config = self.config;
        self.tasks.spawn(async move { TaskOutcome::Clear(clear_with_timeout(log.as_ref(), &board, config).await) });
    }

    fn finish_task(&mut self, joined: Result<TaskOutcome, JoinError>) -> Option<SessionEvent> {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(board = %self.board, error = %e, "session: task did not finish");
                return None;
            }
        };

        match outcome {
            TaskOutcome::Commit { id, result: Ok(ack) } => {
                self.engine.commit_acknowledged(id, ack.token);
                Some(SessionEvent::Committed { id, token: ack.token })
            }
            TaskOutcome::Commit { id, result: Err(e) } => {
                warn!(board = %self.board, error = %e, "session: commit failed");
                notice(self.engine.commit_failed(id, &e.to_string()))
            }
            TaskOutcome::Clear(Ok(())) => {
                self.engine.clear_finished(Ok(()));
                info!(board = %self.board, "session: board cleared");
                Some(SessionEvent::Cleared)
            }
            TaskOutcome::Clear(Err(e)) => notice(self.engine.clear_finished(Err(e.to_string()))),
        }
    }

    async fn resubscribe(&mut self) -> Result<(), LogError> {
        self.resubscribe_attempts = self.resubscribe_attempts.saturating_add(1);
        tokio::time::sleep(self.config.backoff(self.resubscribe_attempts)).await;

        match self.log.subscribe(&self.board).await {
            Ok(feed) => {
                info!(board = %self.board, attempts = self.resubscribe_attempts, "session: resubscribed");
                self.feed = Some(feed);
                self.resubscribe_attempts = 0;
                self.reconnecting = true;
                Ok(())
            }
            Err(e) => {
                warn!(board = %self.board, error = %e, "session: resubscribe failed");
                Err(e)
            }
        }
    }
}

fn notice(actions: Vec<Action>) -> Option<SessionEvent> {
    actions.into_iter().find_map(|a| match a {
        Action::Notify(n) => Some(SessionEvent::Notice(n)),
        _ => None,
    })
}

async fn append_with_retry(
    log: &dyn EventLog,
    board: &BoardId,
    id: CommitId,
    record: Record,
    config: SyncConfig,
) -> Result<Ack, SyncError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = tokio::time::timeout(config.append_timeout, log.append(board, record.clone()))
            .await
            .unwrap_or(Err(LogError::Timeout));

        match result {
            Ok(ack) => return Ok(ack),
            Err(e) if e.retryable() && attempt < config.max_attempts => {
                let delay = config.backoff(attempt);
                debug!(%board, %id, attempt, error = %e, ?delay, "session: append retry");
                tokio::time::sleep(delay).await;
            }
            Err(source) => return Err(SyncError::CommitFailed { id, attempts: attempt, source }),
        }
    }
}

async fn clear_with_timeout(log: &dyn EventLog, board: &BoardId, config: SyncConfig) -> Result<(), LogError> {
    tokio::time::timeout(config.append_timeout, log.clear_all(board))
        .await
        .unwrap_or(Err(LogError::Timeout))
}
