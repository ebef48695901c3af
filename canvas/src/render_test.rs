use super::*;
use crate::element::Rgb;

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn stroke(tool: StrokeTool) -> Stroke {
    Stroke { tool, points: vec![pt(0.0, 0.0), pt(1.0, 1.0)], color: Rgb::new(255, 0, 0), width: 3.0 }
}

#[test]
fn eraser_uses_destination_out() {
    assert_eq!(composite_op(&Element::Stroke(stroke(StrokeTool::Eraser))), "destination-out");
    assert_eq!(composite_op(&Element::Stroke(stroke(StrokeTool::Pen))), "source-over");
}

#[test]
fn eraser_paint_ignores_colour() {
    assert_eq!(stroke_paint(&stroke(StrokeTool::Eraser)), ERASER_PAINT);
    assert_eq!(stroke_paint(&stroke(StrokeTool::Pen)), "#ff0000");
}

#[test]
fn font_spec_uses_label_family() {
    assert_eq!(font_spec(20.0), "20px Inter, sans-serif");
}

#[test]
fn smooth_path_empty() {
    assert!(smooth_path(&[], 0.5).is_empty());
}

#[test]
fn smooth_path_single_point_is_dot() {
    let p = pt(4.0, 4.0);
    assert_eq!(smooth_path(&[p], 0.5), vec![PathSeg::Move(p), PathSeg::Line(p)]);
}

#[test]
fn smooth_path_two_points_is_straight() {
    let (a, b) = (pt(0.0, 0.0), pt(10.0, 0.0));
    assert_eq!(smooth_path(&[a, b], 0.5), vec![PathSeg::Move(a), PathSeg::Line(b)]);
}

#[test]
fn smooth_path_zero_tension_is_polyline() {
    let pts = [pt(0.0, 0.0), pt(5.0, 5.0), pt(10.0, 0.0)];
    let path = smooth_path(&pts, 0.0);
    assert_eq!(path.len(), 3);
    assert!(path[1..].iter().all(|s| matches!(s, PathSeg::Line(_))));
}

#[test]
fn smooth_path_shape() {
    let pts = [pt(0.0, 0.0), pt(10.0, 10.0), pt(20.0, 0.0), pt(30.0, 10.0), pt(40.0, 0.0)];
    let path = smooth_path(&pts, 0.5);
    // move, quad, 2 cubics, quad
    assert_eq!(path.len(), 5);
    assert!(matches!(path[1], PathSeg::Quad(_, p) if p == pts[1]));
    assert!(matches!(path[2], PathSeg::Cubic(_, _, p) if p == pts[2]));
    assert!(matches!(path[3], PathSeg::Cubic(_, _, p) if p == pts[3]));
    assert!(matches!(path[4], PathSeg::Quad(_, p) if p == pts[4]));
}

#[test]
fn control_points_are_symmetric_for_even_spacing() {
    let (before, after) = control_points(pt(0.0, 0.0), pt(10.0, 0.0), pt(20.0, 0.0), 0.5);
    assert_eq!(before, pt(5.0, 0.0));
    assert_eq!(after, pt(15.0, 0.0));
}

#[test]
fn control_points_for_repeated_point() {
    let p = pt(3.0, 3.0);
    assert_eq!(control_points(p, p, p, 0.5), (p, p));
}
