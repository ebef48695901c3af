#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn record(value: serde_json::Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn pen_stroke() -> Element {
    Element::Stroke(Stroke {
        tool: StrokeTool::Pen,
        points: vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0), Point::new(20.0, 5.0)],
        color: Rgb::new(255, 0, 0),
        width: 5.0,
    })
}

// =============================================================
// Rgb
// =============================================================

#[test]
fn rgb_parses_long_form() {
    assert_eq!(Rgb::parse("#ff8000"), Some(Rgb::new(255, 128, 0)));
}

#[test]
fn rgb_parses_short_form() {
    assert_eq!(Rgb::parse("#f80"), Some(Rgb::new(255, 136, 0)));
}

#[test]
fn rgb_parse_is_case_insensitive() {
    assert_eq!(Rgb::parse("#FF00aa"), Rgb::parse("#ff00AA"));
}

#[test]
fn rgb_rejects_garbage() {
    for bad in ["", "ff0000", "#ff00", "#gg0000", "#+f0000", "red", "#ff00001"] {
        assert_eq!(Rgb::parse(bad), None, "{bad}");
    }
}

#[test]
fn rgb_displays_lowercase_hex() {
    assert_eq!(Rgb::new(171, 205, 239).to_string(), "#abcdef");
    assert_eq!(Rgb::BLACK.to_string(), "#000000");
}

// =============================================================
// Serialize
// =============================================================

#[test]
fn serialize_stroke_flattens_points() {
    let rec = serialize(&pen_stroke());
    assert_eq!(rec["type"], "line");
    assert_eq!(rec["tool"], "pen");
    assert_eq!(rec["points"], json!([0.0, 0.0, 10.0, 10.0, 20.0, 5.0]));
    assert_eq!(rec["color"], "#ff0000");
    assert_eq!(rec["width"], 5.0);
}

#[test]
fn serialize_label_writes_fill() {
    let label = Element::Label(Label {
        text: "Hello".into(),
        x: 10.0,
        y: 20.0,
        font_size: 20.0,
        color: Rgb::BLACK,
    });
    let rec = serialize(&label);
    assert_eq!(rec["type"], "text");
    assert_eq!(rec["text"], "Hello");
    assert_eq!(rec["fontSize"], 20.0);
    assert_eq!(rec["fill"], "#000000");
    assert!(!rec.contains_key("color"));
}

#[test]
fn serialize_then_deserialize_preserves_element() {
    let element = pen_stroke();
    assert_eq!(deserialize(&serialize(&element)), Ok(element));
}

// =============================================================
// Deserialize
// =============================================================

#[test]
fn deserialize_eraser_stroke() {
    let rec = record(json!({
        "type": "line", "tool": "eraser", "points": [1, 2, 3, 4], "color": "#000", "width": 12
    }));
    let element = deserialize(&rec);
    assert!(matches!(&element, Ok(e) if e.is_eraser()));
}

#[test]
fn deserialize_label_accepts_color_key() {
    let rec = record(json!({
        "type": "text", "text": "hi", "x": 1, "y": 2, "fontSize": 16, "color": "#00ff00"
    }));
    let Ok(Element::Label(label)) = deserialize(&rec) else {
        panic!("expected label");
    };
    assert_eq!(label.color, Rgb::new(0, 255, 0));
    assert_eq!(label.font_size, 16.0);
}

#[test]
fn deserialize_ignores_unknown_fields() {
    let rec = record(json!({
        "type": "line", "tool": "pen", "points": [0, 0, 1, 1], "color": "#123456", "width": 2,
        "nonce": "abc", "extra": {"nested": true}
    }));
    assert!(deserialize(&rec).is_ok());
}

#[test]
fn deserialize_missing_type() {
    let rec = record(json!({"tool": "pen"}));
    assert_eq!(deserialize(&rec), Err(MalformedElement::MissingType));
}

#[test]
fn deserialize_unknown_type() {
    let rec = record(json!({"type": "rect"}));
    assert_eq!(deserialize(&rec), Err(MalformedElement::UnknownType("rect".into())));
}

#[test]
fn deserialize_single_point_stroke_is_rejected() {
    let rec = record(json!({
        "type": "line", "tool": "pen", "points": [5, 5], "color": "#000000", "width": 5
    }));
    assert_eq!(deserialize(&rec), Err(MalformedElement::TooFewPoints { count: 1 }));
}

#[test]
fn deserialize_odd_point_array_is_rejected() {
    let rec = record(json!({
        "type": "line", "tool": "pen", "points": [1, 2, 3], "color": "#000000", "width": 5
    }));
    assert_eq!(
        deserialize(&rec),
        Err(MalformedElement::InvalidField { kind: LINE_TYPE, field: "points" })
    );
}

#[test]
fn deserialize_non_positive_width_is_rejected() {
    let rec = record(json!({
        "type": "line", "tool": "pen", "points": [1, 2, 3, 4], "color": "#000000", "width": 0
    }));
    assert_eq!(
        deserialize(&rec),
        Err(MalformedElement::InvalidField { kind: LINE_TYPE, field: "width" })
    );
}

#[test]
fn deserialize_unknown_tool_is_rejected() {
    let rec = record(json!({
        "type": "line", "tool": "brush", "points": [1, 2, 3, 4], "color": "#000000", "width": 1
    }));
    assert_eq!(
        deserialize(&rec),
        Err(MalformedElement::InvalidField { kind: LINE_TYPE, field: "tool" })
    );
}

#[test]
fn deserialize_label_without_colour() {
    let rec = record(json!({"type": "text", "text": "x", "x": 0, "y": 0, "fontSize": 20}));
    assert_eq!(
        deserialize(&rec),
        Err(MalformedElement::MissingField { kind: TEXT_TYPE, field: "fill" })
    );
}

#[test]
fn deserialize_label_bad_colour() {
    let rec = record(json!({"type": "text", "text": "x", "x": 0, "y": 0, "fontSize": 20, "fill": "blue"}));
    assert_eq!(
        deserialize(&rec),
        Err(MalformedElement::InvalidField { kind: TEXT_TYPE, field: "fill" })
    );
}

// =============================================================
// Remote records
// =============================================================

#[test]
fn nonce_of_reads_string_nonce() {
    let rec = record(json!({"type": "line", "nonce": "n-1"}));
    assert_eq!(nonce_of(&rec), Some("n-1"));
    assert_eq!(nonce_of(&record(json!({"nonce": 5}))), None);
}

#[test]
fn arrival_tokens_order_numerically() {
    assert!(ArrivalToken(2) < ArrivalToken(10));
}

#[test]
fn remote_record_serde_shape() {
    let remote = RemoteRecord::new(ArrivalToken(7), serialize(&pen_stroke()));
    let value = serde_json::to_value(&remote).unwrap();
    assert_eq!(value["token"], 7);
    assert_eq!(value["record"]["type"], "line");
    let back: RemoteRecord = serde_json::from_value(value).unwrap();
    assert_eq!(back, remote);
}
