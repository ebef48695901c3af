//! Board identifiers.
//!
//! A board is nothing but an identifier plus the records stored under it.
//! Identifiers are supplied by the caller (a room id, a per-user scratch id)
//! and are never generated by the log.

#[cfg(test)]
#[path = "board_test.rs"]
mod board_test;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::MAX_BOARD_ID_LEN;

/// Rejected board identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardIdError {
    #[error("board id is empty")]
    Empty,
    #[error("board id is {0} bytes, max {MAX_BOARD_ID_LEN}")]
    TooLong(usize),
    #[error("board id contains control characters")]
    ControlCharacter,
}

/// Validated board identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardId(String);

impl BoardId {
    /// Validate and wrap a board identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BoardIdError`] for empty, oversized, or control-character ids.
    pub fn new(id: impl Into<String>) -> Result<Self, BoardIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(BoardIdError::Empty);
        }
        if id.len() > MAX_BOARD_ID_LEN {
            return Err(BoardIdError::TooLong(id.len()));
        }
        if id.chars().any(char::is_control) {
            return Err(BoardIdError::ControlCharacter);
        }
        Ok(Self(id))
    }

    /// Per-user private scratch board.
    ///
    /// # Errors
    ///
    /// Returns [`BoardIdError`] if the user id makes the board id invalid.
    pub fn scratch(user_id: &str) -> Result<Self, BoardIdError> {
        Self::new(format!("scratch:{user_id}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BoardId {
    type Error = BoardIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BoardId> for String {
    fn from(id: BoardId) -> Self {
        id.0
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
