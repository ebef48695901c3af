#![allow(clippy::float_cmp)]

use super::*;

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn red() -> Rgb {
    Rgb::new(255, 0, 0)
}

// =============================================================
// Strokes
// =============================================================

#[test]
fn new_buffer_is_idle() {
    let buf = DraftBuffer::new();
    assert!(buf.is_idle());
    assert_eq!(buf.preview(), None);
}

#[test]
fn stroke_accumulates_points() {
    let mut buf = DraftBuffer::new();
    assert!(buf.begin_stroke(StrokeTool::Pen, pt(0.0, 0.0), red(), 5.0));
    assert!(buf.extend(pt(5.0, 5.0)));
    assert!(buf.extend(pt(10.0, 0.0)));

    let Some(Element::Stroke(stroke)) = buf.end() else {
        panic!("expected a stroke");
    };
    assert_eq!(stroke.points, vec![pt(0.0, 0.0), pt(5.0, 5.0), pt(10.0, 0.0)]);
    assert_eq!(stroke.color, red());
    assert_eq!(stroke.width, 5.0);
    assert!(buf.is_idle());
}

#[test]
fn click_without_drag_commits_nothing() {
    let mut buf = DraftBuffer::new();
    buf.begin_stroke(StrokeTool::Pen, pt(3.0, 3.0), red(), 5.0);
    assert!(!buf.extend(pt(3.0, 3.0)));
    assert_eq!(buf.end(), None);
    assert!(buf.is_idle());
}

#[test]
fn extend_outside_stroke_is_ignored() {
    let mut buf = DraftBuffer::new();
    assert!(!buf.extend(pt(1.0, 1.0)));
    assert!(buf.is_idle());
}

#[test]
fn begin_stroke_requires_idle() {
    let mut buf = DraftBuffer::new();
    buf.begin_stroke(StrokeTool::Pen, pt(0.0, 0.0), red(), 5.0);
    assert!(!buf.begin_stroke(StrokeTool::Eraser, pt(9.0, 9.0), red(), 5.0));
    assert!(matches!(&buf, DraftBuffer::DraftingStroke(s) if s.tool == StrokeTool::Pen));
}

#[test]
fn preview_shows_stroke_in_progress() {
    let mut buf = DraftBuffer::new();
    buf.begin_stroke(StrokeTool::Eraser, pt(0.0, 0.0), red(), 8.0);
    buf.extend(pt(1.0, 1.0));
    let preview = buf.preview();
    assert!(matches!(preview, Some(ref e) if e.is_eraser()));
}

// =============================================================
// Labels
// =============================================================

#[test]
fn label_submit_with_text() {
    let mut buf = DraftBuffer::new();
    assert_eq!(buf.begin_label(pt(10.0, 20.0), 20.0, Rgb::BLACK), None);
    assert!(buf.set_text("Hello"));
    let Some(Element::Label(label)) = buf.submit() else {
        panic!("expected a label");
    };
    assert_eq!(label.text, "Hello");
    assert_eq!((label.x, label.y), (10.0, 20.0));
    assert!(buf.is_idle());
}

#[test]
fn whitespace_label_is_not_committed() {
    let mut buf = DraftBuffer::new();
    buf.begin_label(pt(0.0, 0.0), 20.0, Rgb::BLACK);
    buf.set_text("   \t ");
    assert_eq!(buf.submit(), None);
    assert!(buf.is_idle());
}

#[test]
fn opening_second_caret_submits_first() {
    let mut buf = DraftBuffer::new();
    buf.begin_label(pt(0.0, 0.0), 20.0, Rgb::BLACK);
    buf.set_text("first");
    let prior = buf.begin_label(pt(50.0, 50.0), 20.0, Rgb::BLACK);
    assert!(matches!(prior, Some(Element::Label(ref l)) if l.text == "first"));
    assert_eq!(buf.caret().map(|c| c.at), Some(pt(50.0, 50.0)));
}

#[test]
fn begin_label_during_stroke_is_ignored() {
    let mut buf = DraftBuffer::new();
    buf.begin_stroke(StrokeTool::Pen, pt(0.0, 0.0), red(), 5.0);
    assert_eq!(buf.begin_label(pt(1.0, 1.0), 20.0, Rgb::BLACK), None);
    assert!(buf.is_drafting_stroke());
}

#[test]
fn cancel_discards_caret() {
    let mut buf = DraftBuffer::new();
    buf.begin_label(pt(0.0, 0.0), 20.0, Rgb::BLACK);
    buf.set_text("gone");
    buf.cancel();
    assert!(buf.is_idle());
    assert_eq!(buf.submit(), None);
}

#[test]
fn caret_is_not_previewed() {
    let mut buf = DraftBuffer::new();
    buf.begin_label(pt(0.0, 0.0), 20.0, Rgb::BLACK);
    buf.set_text("typing");
    assert_eq!(buf.preview(), None);
}

#[test]
fn set_text_without_caret_is_ignored() {
    let mut buf = DraftBuffer::new();
    assert!(!buf.set_text("nothing"));
}
