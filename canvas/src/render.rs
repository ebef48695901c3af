//! Rendering: draws the render list to a 2D context.
//!
//! This module is the only place that touches [`web_sys::CanvasRenderingContext2d`].
//! It receives a read-only [`RenderList`] plus the unsynced overlay and
//! produces pixels; it does not mutate any application state.
//!
//! Draw order is the render list (confirmed elements, then the draft) with
//! the unsynced overlay between the two tiers, so a stroke the log has not
//! confirmed yet never covers the one being drawn. Eraser strokes are drawn
//! with `destination-out` and remove whatever lies beneath them.
//!
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`.
//! The top-level caller ([`crate::engine::Engine::render`]) handles the result.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use crate::consts::{ERASER_PAINT, LABEL_FONT_FAMILY, STROKE_TENSION, UNSYNCED_ALPHA};
use crate::element::{Element, Label, Point, Stroke, StrokeTool};
use crate::reconcile::RenderList;

/// Draw the full scene.
///
/// `viewport_w` and `viewport_h` are in CSS pixels. `dpr` is the device pixel ratio.
/// `unsynced` yields commits the log has not confirmed, flagged when failed.
///
/// # Errors
///
/// Returns `Err` if any `Canvas2D` call fails (e.g. invalid context state).
pub fn draw<'a>(
    ctx: &CanvasRenderingContext2d,
    list: &RenderList<'_>,
    unsynced: impl Iterator<Item = (&'a Element, bool)>,
    viewport_w: f64,
    viewport_h: f64,
    dpr: f64,
) -> Result<(), JsValue> {
    ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    ctx.clear_rect(0.0, 0.0, viewport_w, viewport_h);

    let draft = list.draft();
    let confirmed_len = list.len() - usize::from(draft.is_some());

    for element in list.iter().take(confirmed_len) {
        draw_element(ctx, element, 1.0)?;
    }

    for (element, failed) in unsynced {
        let alpha = if failed { UNSYNCED_ALPHA } else { 1.0 };
        draw_element(ctx, element, alpha)?;
    }

    if let Some(element) = draft {
        draw_element(ctx, element, 1.0)?;
    }

    Ok(())
}

fn draw_element(ctx: &CanvasRenderingContext2d, element: &Element, alpha: f64) -> Result<(), JsValue> {
    ctx.save();
    ctx.set_global_alpha(alpha);
    ctx.set_global_composite_operation(composite_op(element))?;
    let drawn = match element {
        Element::Stroke(stroke) => {
            draw_stroke(ctx, stroke);
            Ok(())
        }
        Element::Label(label) => draw_label(ctx, label),
    };
    ctx.restore();
    drawn
}

// =============================================================
// Strokes
// =============================================================

fn draw_stroke(ctx: &CanvasRenderingContext2d, stroke: &Stroke) {
    ctx.set_stroke_style_str(&stroke_paint(stroke));
    ctx.set_line_width(stroke.width);
    ctx.set_line_cap("round");
    ctx.set_line_join("round");

    ctx.begin_path();
    for seg in smooth_path(&stroke.points, STROKE_TENSION) {
        match seg {
            PathSeg::Move(p) => ctx.move_to(p.x, p.y),
            PathSeg::Line(p) => ctx.line_to(p.x, p.y),
            PathSeg::Quad(c, p) => ctx.quadratic_curve_to(c.x, c.y, p.x, p.y),
            PathSeg::Cubic(c1, c2, p) => ctx.bezier_curve_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
        }
    }
    ctx.stroke();
}

/// Paint used for a stroke: its own colour, or opaque paint for erasers.
#[must_use]
pub fn stroke_paint(stroke: &Stroke) -> String {
    if stroke.tool == StrokeTool::Eraser {
        ERASER_PAINT.to_owned()
    } else {
        stroke.color.to_string()
    }
}

/// Canvas compositing mode for an element.
#[must_use]
pub fn composite_op(element: &Element) -> &'static str {
    if element.is_eraser() { "destination-out" } else { "source-over" }
}

/// One path command of a smoothed stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSeg {
    Move(Point),
    Line(Point),
    Quad(Point, Point),
    Cubic(Point, Point, Point),
}

/// Smooth a polyline with cardinal-spline control points.
///
/// Two points (or zero tension) give straight segments. Otherwise the path is
/// a quadratic into the second point, cubics through the interior and a
/// quadratic into the last point. A single point yields a zero-length line,
/// which round caps draw as a dot.
#[must_use]
pub fn smooth_path(points: &[Point], tension: f64) -> Vec<PathSeg> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let mut path = vec![PathSeg::Move(first)];

    if points.len() == 1 {
        path.push(PathSeg::Line(first));
        return path;
    }
    if points.len() == 2 || tension <= 0.0 {
        path.extend(points[1..].iter().copied().map(PathSeg::Line));
        return path;
    }

    // (before, after) control points of every interior point.
    let controls: Vec<(Point, Point)> = points
        .windows(3)
        .map(|w| control_points(w[0], w[1], w[2], tension))
        .collect();

    let last = points.len() - 1;
    path.push(PathSeg::Quad(controls[0].0, points[1]));
    for i in 1..last - 1 {
        path.push(PathSeg::Cubic(controls[i - 1].1, controls[i].0, points[i + 1]));
    }
    path.push(PathSeg::Quad(controls[controls.len() - 1].1, points[last]));
    path
}

fn control_points(p0: Point, p1: Point, p2: Point, tension: f64) -> (Point, Point) {
    let d01 = (p1.x - p0.x).hypot(p1.y - p0.y);
    let d12 = (p2.x - p1.x).hypot(p2.y - p1.y);
    let total = d01 + d12;
    if total <= f64::EPSILON {
        return (p1, p1);
    }
    let fa = tension * d01 / total;
    let fb = tension * d12 / total;
    let dx = p2.x - p0.x;
    let dy = p2.y - p0.y;
    (
        Point::new(p1.x - fa * dx, p1.y - fa * dy),
        Point::new(p1.x + fb * dx, p1.y + fb * dy),
    )
}

// =============================================================
// Labels
// =============================================================

fn draw_label(ctx: &CanvasRenderingContext2d, label: &Label) -> Result<(), JsValue> {
    ctx.set_font(&font_spec(label.font_size));
    ctx.set_text_baseline("top");
    ctx.set_fill_style_str(&label.color.to_string());

    let mut y = label.y;
    for line in label.text.lines() {
        ctx.fill_text(line, label.x, y)?;
        y += label.font_size;
    }
    Ok(())
}

/// CSS font shorthand for a label of the given size.
#[must_use]
pub fn font_spec(font_size: f64) -> String {
    format!("{font_size}px {LABEL_FONT_FAMILY}")
}
