//! Shared defaults and limits for the canvas crate.

// ── Tool settings ───────────────────────────────────────────────

/// Default stroke width for the pen and eraser.
pub const DEFAULT_STROKE_WIDTH: f64 = 5.0;

/// Stroke width stepper bounds and increment.
pub const MIN_STROKE_WIDTH: f64 = 1.0;
pub const MAX_STROKE_WIDTH: f64 = 50.0;
pub const STROKE_WIDTH_STEP: f64 = 1.0;

/// Default label font size in canvas pixels.
pub const DEFAULT_FONT_SIZE: f64 = 20.0;

/// Font size stepper bounds and increment.
pub const MIN_FONT_SIZE: f64 = 10.0;
pub const MAX_FONT_SIZE: f64 = 100.0;
pub const FONT_SIZE_STEP: f64 = 2.0;

// ── Elements ────────────────────────────────────────────────────

/// A committed stroke needs at least this many points.
pub const MIN_STROKE_POINTS: usize = 2;

// ── Rendering ───────────────────────────────────────────────────

/// Curve tension used to smooth freehand strokes (0 = polyline).
pub const STROKE_TENSION: f64 = 0.5;

/// Paint colour of eraser strokes. `destination-out` only reads its alpha.
pub const ERASER_PAINT: &str = "#ffffff";

/// Font family for labels.
pub const LABEL_FONT_FAMILY: &str = "Inter, sans-serif";

/// Opacity of commits the event log has not accepted.
pub const UNSYNCED_ALPHA: f64 = 0.35;

// ── Board ids ───────────────────────────────────────────────────

/// Maximum length of a board identifier in bytes.
pub const MAX_BOARD_ID_LEN: usize = 128;
