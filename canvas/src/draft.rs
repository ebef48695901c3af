//! Local draft buffer: the single uncommitted element of the active gesture.
//!
//! The buffer is owned by the input state machine and is never shared. It
//! holds zero or one draft at a time:
//!
//! ```text
//! Idle ──begin_stroke──▶ DraftingStroke ──extend──▶ DraftingStroke
//!   ▲                          │
//!   └────────── end ───────────┘   (commits when ≥ 2 points)
//!
//! Idle ──begin_label──▶ DraftingLabel ──submit / cancel──▶ Idle
//! ```
//!
//! A partially drawn stroke is only ever rendered locally; the buffer hands
//! out an element for commit exactly once, when the gesture completes.

#[cfg(test)]
#[path = "draft_test.rs"]
mod draft_test;

use crate::consts::MIN_STROKE_POINTS;
use crate::element::{Element, Label, Point, Rgb, Stroke, StrokeTool};

/// An open text caret awaiting keyboard input.
#[derive(Debug, Clone, PartialEq)]
pub struct Caret {
    /// Canvas position of the label's top-left corner.
    pub at: Point,
    /// Text typed so far.
    pub text: String,
    /// Font size captured when the caret opened.
    pub font_size: f64,
    /// Colour captured when the caret opened.
    pub color: Rgb,
}

/// The draft of the gesture in progress, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DraftBuffer {
    /// No draft.
    #[default]
    Idle,
    /// Accumulating points while the pointer is held.
    DraftingStroke(Stroke),
    /// A text caret is open at a fixed position.
    DraftingLabel(Caret),
}

impl DraftBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::Idle
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    #[must_use]
    pub fn is_drafting_stroke(&self) -> bool {
        matches!(self, Self::DraftingStroke(_))
    }

    /// The open caret, if the buffer is in `DraftingLabel`.
    #[must_use]
    pub fn caret(&self) -> Option<&Caret> {
        match self {
            Self::DraftingLabel(caret) => Some(caret),
            _ => None,
        }
    }

    // --- Strokes ---

    /// Start a stroke at `at`. Only valid from `Idle`; returns `false` and
    /// leaves the buffer untouched otherwise.
    pub fn begin_stroke(&mut self, tool: StrokeTool, at: Point, color: Rgb, width: f64) -> bool {
        if !self.is_idle() {
            return false;
        }
        *self = Self::DraftingStroke(Stroke { tool, points: vec![at], color, width });
        true
    }

    /// Append a point to the stroke in progress. A point equal to the last
    /// one is dropped, so a click without movement stays a single point.
    /// Returns `true` when the draft changed.
    pub fn extend(&mut self, at: Point) -> bool {
        let Self::DraftingStroke(stroke) = self else {
            return false;
        };
        if stroke.points.last() == Some(&at) {
            return false;
        }
        stroke.points.push(at);
        true
    }

    /// Finish the stroke in progress and return to `Idle`. Returns the stroke
    /// for commit only when it has enough points to be a real mark.
    pub fn end(&mut self) -> Option<Element> {
        if !self.is_drafting_stroke() {
            return None;
        }
        let Self::DraftingStroke(stroke) = std::mem::take(self) else {
            return None;
        };
        if stroke.points.len() < MIN_STROKE_POINTS {
            log::debug!("draft: dropped stroke with {} point(s)", stroke.points.len());
            return None;
        }
        Some(Element::Stroke(stroke))
    }

    // --- Labels ---

    /// Open a caret at `at`. If a caret is already open it is submitted
    /// first and its label (if any) is returned for commit. Does nothing
    /// while a stroke is being drawn.
    pub fn begin_label(&mut self, at: Point, font_size: f64, color: Rgb) -> Option<Element> {
        if self.is_drafting_stroke() {
            return None;
        }
        let prior = self.submit();
        *self = Self::DraftingLabel(Caret { at, text: String::new(), font_size, color });
        prior
    }

    /// Replace the caret's text. Returns `false` when no caret is open.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let Self::DraftingLabel(caret) = self else {
            return false;
        };
        caret.text = text.into();
        true
    }

    /// Close the caret and return to `Idle`. Returns a label for commit only
    /// when the trimmed text is non-empty.
    pub fn submit(&mut self) -> Option<Element> {
        if self.caret().is_none() {
            return None;
        }
        let Self::DraftingLabel(caret) = std::mem::take(self) else {
            return None;
        };
        if caret.text.trim().is_empty() {
            return None;
        }
        Some(Element::Label(Label {
            text: caret.text,
            x: caret.at.x,
            y: caret.at.y,
            font_size: caret.font_size,
            color: caret.color,
        }))
    }

    /// Discard any draft without committing.
    pub fn cancel(&mut self) {
        *self = Self::Idle;
    }

    // --- Rendering ---

    /// The element to draw after the confirmed list. Only strokes are
    /// previewed on the canvas; an open caret is shown by the host's text
    /// overlay.
    #[must_use]
    pub fn preview(&self) -> Option<Element> {
        match self {
            Self::DraftingStroke(stroke) => Some(Element::Stroke(stroke.clone())),
            Self::Idle | Self::DraftingLabel(_) => None,
        }
    }
}
