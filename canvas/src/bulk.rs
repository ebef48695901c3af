//! Bulk operations: the board clear flow and export naming.
//!
//! Clearing is destructive and board-wide, so it is gated by a confirmation
//! and never applied optimistically: the board only empties when the next
//! snapshot from the log says so.

#[cfg(test)]
#[path = "bulk_test.rs"]
mod bulk_test;

/// File name offered for exported images.
pub const EXPORT_FILE_NAME: &str = "whiteboard-drawing.png";

/// MIME type of exported images.
pub const EXPORT_MIME: &str = "image/png";

/// Question shown before a clear.
pub const CLEAR_PROMPT: &str = "Clear the whole board?";

/// Progress of a board clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearFlow {
    /// Nothing in progress.
    #[default]
    Idle,
    /// The user has been asked to confirm.
    AwaitingConfirmation,
    /// `clear_all` has been issued and not yet answered.
    Clearing,
}

impl ClearFlow {
    /// Ask for confirmation. Returns `false` if a clear is already underway.
    pub fn request(&mut self) -> bool {
        if *self != Self::Idle {
            return false;
        }
        *self = Self::AwaitingConfirmation;
        true
    }

    /// Record the user's answer. Returns `true` when the clear should be
    /// issued now.
    pub fn confirm(&mut self, confirmed: bool) -> bool {
        if *self != Self::AwaitingConfirmation {
            return false;
        }
        *self = if confirmed { Self::Clearing } else { Self::Idle };
        confirmed
    }

    /// The log answered the clear. Returns `false` if none was in flight.
    pub fn finish(&mut self) -> bool {
        if *self != Self::Clearing {
            return false;
        }
        *self = Self::Idle;
        true
    }

    #[must_use]
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}
