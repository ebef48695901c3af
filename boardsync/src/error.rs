//! Error types for the event log and the sync session.
//!
//! ERROR HANDLING
//! ==============
//! `LogError` is what one call to an [`crate::EventLog`] returns. Each
//! variant knows whether a retry can help. `SyncError` is what the session
//! reports once its own retry policy is exhausted.

use canvas::outbox::CommitId;

/// Failure of a single event log call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connection closed")]
    Closed,
    #[error("request timed out")]
    Timeout,
    #[error("log unavailable: {0}")]
    Unavailable(String),
    #[error("{code}: {message}")]
    Remote { code: String, message: String, retryable: bool },
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl LogError {
    /// Whether the same call may succeed if repeated.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Closed | Self::Timeout | Self::Unavailable(_) => true,
            Self::Remote { retryable, .. } => *retryable,
            Self::Protocol(_) => false,
        }
    }
}

/// Failure surfaced by a [`crate::BoardSession`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("subscribe failed: {0}")]
    Subscribe(#[source] LogError),
    #[error("commit {id} failed after {attempts} attempt(s): {source}")]
    CommitFailed { id: CommitId, attempts: u32, source: LogError },
    #[error("clear failed: {0}")]
    ClearFailed(#[source] LogError),
    #[error("live feed dropped")]
    SubscriptionDropped,
}

impl SyncError {
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Subscribe(e) | Self::ClearFailed(e) | Self::CommitFailed { source: e, .. } => e.retryable(),
            Self::SubscriptionDropped => true,
        }
    }
}
