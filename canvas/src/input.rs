//! Input model: tools, tool settings, modifier keys and mouse buttons.
//!
//! `Tool` and `ToolSettings` capture what the user has selected in the
//! toolbar. They are ambient configuration: the engine reads them once, when
//! a gesture starts, and the gesture keeps those values until it ends.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::consts::{
    DEFAULT_FONT_SIZE, DEFAULT_STROKE_WIDTH, FONT_SIZE_STEP, MAX_FONT_SIZE, MAX_STROKE_WIDTH, MIN_FONT_SIZE,
    MIN_STROKE_WIDTH, STROKE_WIDTH_STEP,
};
use crate::element::{Rgb, StrokeTool};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Freehand pen (default).
    #[default]
    Pen,
    /// Freehand eraser; draws a stroke that removes pixels beneath it.
    Eraser,
    /// Places a text label.
    Text,
}

impl Tool {
    /// The stroke tool this tool draws with, if it draws strokes.
    #[must_use]
    pub fn stroke_tool(self) -> Option<StrokeTool> {
        match self {
            Self::Pen => Some(StrokeTool::Pen),
            Self::Eraser => Some(StrokeTool::Eraser),
            Self::Text => None,
        }
    }

    /// CSS cursor shown over the canvas while this tool is active.
    #[must_use]
    pub fn cursor(self) -> &'static str {
        match self {
            Self::Pen => "crosshair",
            Self::Eraser => "cell",
            Self::Text => "text",
        }
    }
}

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

impl Modifiers {
    /// Whether any modifier is held.
    #[must_use]
    pub fn any(self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// A keyboard key as reported by the browser (e.g. `"Enter"`, `"Escape"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn is_enter(&self) -> bool {
        self.0 == "Enter"
    }

    #[must_use]
    pub fn is_escape(&self) -> bool {
        self.0 == "Escape"
    }
}

/// Toolbar state read at gesture start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolSettings {
    pub tool: Tool,
    pub color: Rgb,
    pub stroke_width: f64,
    pub font_size: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: Tool::default(),
            color: Rgb::BLACK,
            stroke_width: DEFAULT_STROKE_WIDTH,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl ToolSettings {
    /// Step the size control of the active tool: font size for the text
    /// tool, stroke width otherwise. Values are clamped to their ranges.
    pub fn step_size(&mut self, increase: bool) {
        let sign = if increase { 1.0 } else { -1.0 };
        if self.tool == Tool::Text {
            self.font_size = (self.font_size + sign * FONT_SIZE_STEP).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        } else {
            self.stroke_width = (self.stroke_width + sign * STROKE_WIDTH_STEP).clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
        }
    }

    /// The value the size control currently shows.
    #[must_use]
    pub fn active_size(&self) -> f64 {
        if self.tool == Tool::Text { self.font_size } else { self.stroke_width }
    }
}
