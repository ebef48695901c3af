//! Outbox: committed elements the event log has not acknowledged yet.
//!
//! Every completed gesture becomes a [`PendingCommit`] tagged with a fresh
//! nonce. A commit leaves the outbox once a snapshot shows it: either the
//! snapshot contains its nonce, or the log acknowledged it before the
//! snapshot was taken. Until then it is drawn as unsynced so the stroke does
//! not flicker between pointer-up and the next snapshot.
//!
//! ```text
//! Pending ──ack──▶ Acknowledged ──snapshot──▶ (removed)
//!    │  ▲
//!  fail retry
//!    ▼  │
//!   Failed ──discard──▶ (removed)
//! ```

#[cfg(test)]
#[path = "outbox_test.rs"]
mod outbox_test;

use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use crate::element::{self, ArrivalToken, Element, NONCE_FIELD, Record};

/// Local handle of one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(u64);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Where a commit stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitState {
    /// Handed to the host for appending.
    Pending,
    /// The log stored it; waiting for a snapshot that includes it.
    Acknowledged { token: ArrivalToken },
    /// The host gave up; the element never reached the log.
    Failed { reason: String },
}

/// One element on its way to the event log.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommit {
    pub id: CommitId,
    /// Client commit identity sent with the record.
    pub nonce: String,
    pub element: Element,
    pub state: CommitState,
}

impl PendingCommit {
    /// Wire record for this commit, including its nonce.
    #[must_use]
    pub fn record(&self) -> Record {
        let mut record = element::serialize(&self.element);
        record.insert(NONCE_FIELD.into(), Value::from(self.nonce.clone()));
        record
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state, CommitState::Failed { .. })
    }
}

/// Commits awaiting acknowledgement, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    next_id: u64,
    commits: Vec<PendingCommit>,
}

impl Outbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completed element and return its commit.
    pub fn enqueue(&mut self, element: Element) -> &PendingCommit {
        self.next_id += 1;
        let commit = PendingCommit {
            id: CommitId(self.next_id),
            nonce: Uuid::new_v4().to_string(),
            element,
            state: CommitState::Pending,
        };
        self.commits.push(commit);
        &self.commits[self.commits.len() - 1]
    }

    #[must_use]
    pub fn get(&self, id: CommitId) -> Option<&PendingCommit> {
        self.commits.iter().find(|c| c.id == id)
    }

    /// Record that the log stored a commit. Returns `false` if the commit is
    /// no longer queued (a snapshot already settled it).
    pub fn acknowledge(&mut self, id: CommitId, token: ArrivalToken) -> bool {
        let Some(commit) = self.commits.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        commit.state = CommitState::Acknowledged { token };
        true
    }

    /// Apply a fresh snapshot: drop acknowledged commits and every commit
    /// whose nonce `confirmed` reports as present. Returns how many were
    /// removed.
    pub fn settle(&mut self, confirmed: impl Fn(&str) -> bool) -> usize {
        let before = self.commits.len();
        self.commits
            .retain(|c| !matches!(c.state, CommitState::Acknowledged { .. }) && !confirmed(&c.nonce));
        before - self.commits.len()
    }

    /// Mark a pending commit as failed. Returns `false` if it is unknown or
    /// already acknowledged.
    pub fn mark_failed(&mut self, id: CommitId, reason: impl Into<String>) -> bool {
        let Some(commit) = self
            .commits
            .iter_mut()
            .find(|c| c.id == id && c.state == CommitState::Pending)
        else {
            return false;
        };
        commit.state = CommitState::Failed { reason: reason.into() };
        true
    }

    /// Move a failed commit back to pending and return its record for
    /// resubmission. The nonce is kept so a late success is not duplicated.
    pub fn retry(&mut self, id: CommitId) -> Option<Record> {
        let commit = self.commits.iter_mut().find(|c| c.id == id && c.is_failed())?;
        commit.state = CommitState::Pending;
        Some(commit.record())
    }

    /// Give up on a failed commit for good.
    pub fn discard(&mut self, id: CommitId) -> Option<PendingCommit> {
        let idx = self.commits.iter().position(|c| c.id == id && c.is_failed())?;
        Some(self.commits.remove(idx))
    }

    /// All queued commits, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingCommit> {
        self.commits.iter()
    }

    /// Commits the host gave up on.
    pub fn failed(&self) -> impl Iterator<Item = &PendingCommit> {
        self.commits.iter().filter(|c| c.is_failed())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}
