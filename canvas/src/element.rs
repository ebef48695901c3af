//! Element model: the two drawable primitives and their wire records.
//!
//! An [`Element`] is the unit of replication. It is immutable once committed;
//! boards only ever grow by appending elements or shrink by being cleared.
//!
//! On the wire (and in the event log) an element is a flat JSON object tagged
//! by a `type` discriminator:
//!
//! ```text
//! {"type":"line","tool":"pen","points":[x0,y0,x1,y1,…],"color":"#ff0000","width":5}
//! {"type":"text","text":"Hello","x":10,"y":20,"fontSize":20,"fill":"#000000"}
//! ```
//!
//! Records coming back from the log additionally carry a server-assigned
//! [`ArrivalToken`] (see [`RemoteRecord`]) and may carry a client `nonce`
//! used only for idempotent retries. Unknown fields are ignored.

#[cfg(test)]
#[path = "element_test.rs"]
mod element_test;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::consts::MIN_STROKE_POINTS;

/// Discriminator key of every record.
pub const TYPE_FIELD: &str = "type";
/// Discriminator value for strokes.
pub const LINE_TYPE: &str = "line";
/// Discriminator value for labels.
pub const TEXT_TYPE: &str = "text";
/// Optional client commit identity, used by the log to de-duplicate retries.
pub const NONCE_FIELD: &str = "nonce";

/// A flat wire record as stored in the event log.
pub type Record = Map<String, Value>;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A point in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An opaque RGB colour, written as `#rrggbb` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb` or `#rrggbb` (case-insensitive). Returns `None` for
    /// anything else.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|d| d * 17);
                match (digit(0), digit(1), digit(2)) {
                    (Ok(r), Ok(g), Ok(b)) => Some(Self::new(r, g, b)),
                    _ => None,
                }
            }
            6 => {
                let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
                match (byte(0), byte(2), byte(4)) {
                    (Ok(r), Ok(g), Ok(b)) => Some(Self::new(r, g, b)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Which tool drew a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeTool {
    Pen,
    Eraser,
}

impl StrokeTool {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pen => "pen",
            Self::Eraser => "eraser",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "pen" => Some(Self::Pen),
            "eraser" => Some(Self::Eraser),
            _ => None,
        }
    }
}

// =============================================================================
// ELEMENTS
// =============================================================================

/// A freehand stroke. Eraser strokes are ordinary elements rendered with
/// `destination-out` compositing.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub tool: StrokeTool,
    pub points: Vec<Point>,
    pub color: Rgb,
    pub width: f64,
}

/// A text label anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub color: Rgb,
}

/// A drawable, immutable board element.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Stroke(Stroke),
    Label(Label),
}

impl Element {
    /// The wire discriminator for this element.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stroke(_) => LINE_TYPE,
            Self::Label(_) => TEXT_TYPE,
        }
    }

    /// Whether this element erases what was drawn before it.
    #[must_use]
    pub fn is_eraser(&self) -> bool {
        matches!(self, Self::Stroke(Stroke { tool: StrokeTool::Eraser, .. }))
    }
}

// =============================================================================
// REMOTE RECORDS
// =============================================================================

/// Server-assigned position of a record in the board's total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrivalToken(pub u64);

impl fmt::Display for ArrivalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A record as delivered by the event log, with its arrival token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub token: ArrivalToken,
    pub record: Record,
}

impl RemoteRecord {
    #[must_use]
    pub fn new(token: ArrivalToken, record: Record) -> Self {
        Self { token, record }
    }
}

/// Client nonce attached to a record, if any.
#[must_use]
pub fn nonce_of(record: &Record) -> Option<&str> {
    record.get(NONCE_FIELD).and_then(Value::as_str)
}

// =============================================================================
// CODEC
// =============================================================================

/// Why a record could not be turned into an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedElement {
    #[error("record has no `type` discriminator")]
    MissingType,
    #[error("unknown element type `{0}`")]
    UnknownType(String),
    #[error("`{kind}` record is missing `{field}`")]
    MissingField { kind: &'static str, field: &'static str },
    #[error("`{kind}` record has an invalid `{field}`")]
    InvalidField { kind: &'static str, field: &'static str },
    #[error("stroke has {count} point(s), needs at least {MIN_STROKE_POINTS}")]
    TooFewPoints { count: usize },
}

/// Flatten an element into its tagged wire record.
#[must_use]
pub fn serialize(element: &Element) -> Record {
    let mut record = Record::new();
    record.insert(TYPE_FIELD.into(), Value::from(element.kind()));
    match element {
        Element::Stroke(stroke) => {
            let flat: Vec<Value> = stroke
                .points
                .iter()
                .flat_map(|p| [Value::from(p.x), Value::from(p.y)])
                .collect();
            record.insert("tool".into(), Value::from(stroke.tool.as_str()));
            record.insert("points".into(), Value::Array(flat));
            record.insert("color".into(), Value::from(stroke.color.to_string()));
            record.insert("width".into(), Value::from(stroke.width));
        }
        Element::Label(label) => {
            record.insert("text".into(), Value::from(label.text.clone()));
            record.insert("x".into(), Value::from(label.x));
            record.insert("y".into(), Value::from(label.y));
            record.insert("fontSize".into(), Value::from(label.font_size));
            record.insert("fill".into(), Value::from(label.color.to_string()));
        }
    }
    record
}

/// Rebuild an element from its wire record.
///
/// # Errors
///
/// Returns [`MalformedElement`] when the discriminator is missing or unknown,
/// or a required field is absent or out of range.
pub fn deserialize(record: &Record) -> Result<Element, MalformedElement> {
    let kind = record
        .get(TYPE_FIELD)
        .and_then(Value::as_str)
        .ok_or(MalformedElement::MissingType)?;

    match kind {
        LINE_TYPE => deserialize_stroke(record).map(Element::Stroke),
        TEXT_TYPE => deserialize_label(record).map(Element::Label),
        other => Err(MalformedElement::UnknownType(other.to_owned())),
    }
}

fn deserialize_stroke(record: &Record) -> Result<Stroke, MalformedElement> {
    const KIND: &str = LINE_TYPE;

    let tool = str_field(record, KIND, "tool")?;
    let tool = StrokeTool::parse(tool).ok_or(MalformedElement::InvalidField { kind: KIND, field: "tool" })?;

    let flat = record
        .get("points")
        .ok_or(MalformedElement::MissingField { kind: KIND, field: "points" })?
        .as_array()
        .ok_or(MalformedElement::InvalidField { kind: KIND, field: "points" })?;
    if flat.len() % 2 != 0 {
        return Err(MalformedElement::InvalidField { kind: KIND, field: "points" });
    }
    let mut points = Vec::with_capacity(flat.len() / 2);
    for pair in flat.chunks_exact(2) {
        let (Some(x), Some(y)) = (pair[0].as_f64(), pair[1].as_f64()) else {
            return Err(MalformedElement::InvalidField { kind: KIND, field: "points" });
        };
        let point = Point::new(x, y);
        if !point.is_finite() {
            return Err(MalformedElement::InvalidField { kind: KIND, field: "points" });
        }
        points.push(point);
    }
    if points.len() < MIN_STROKE_POINTS {
        return Err(MalformedElement::TooFewPoints { count: points.len() });
    }

    let color = color_field(record, KIND, &["color"])?;
    let width = positive_field(record, KIND, "width")?;

    Ok(Stroke { tool, points, color, width })
}

fn deserialize_label(record: &Record) -> Result<Label, MalformedElement> {
    const KIND: &str = TEXT_TYPE;

    let text = str_field(record, KIND, "text")?.to_owned();
    let x = finite_field(record, KIND, "x")?;
    let y = finite_field(record, KIND, "y")?;
    let font_size = positive_field(record, KIND, "fontSize")?;
    let color = color_field(record, KIND, &["fill", "color"])?;

    Ok(Label { text, x, y, font_size, color })
}

fn str_field<'a>(record: &'a Record, kind: &'static str, field: &'static str) -> Result<&'a str, MalformedElement> {
    record
        .get(field)
        .ok_or(MalformedElement::MissingField { kind, field })?
        .as_str()
        .ok_or(MalformedElement::InvalidField { kind, field })
}

fn finite_field(record: &Record, kind: &'static str, field: &'static str) -> Result<f64, MalformedElement> {
    let value = record
        .get(field)
        .ok_or(MalformedElement::MissingField { kind, field })?
        .as_f64()
        .ok_or(MalformedElement::InvalidField { kind, field })?;
    if !value.is_finite() {
        return Err(MalformedElement::InvalidField { kind, field });
    }
    Ok(value)
}

fn positive_field(record: &Record, kind: &'static str, field: &'static str) -> Result<f64, MalformedElement> {
    let value = finite_field(record, kind, field)?;
    if value <= 0.0 {
        return Err(MalformedElement::InvalidField { kind, field });
    }
    Ok(value)
}

/// Read a colour from the first key present in `fields`.
fn color_field(record: &Record, kind: &'static str, fields: &[&'static str]) -> Result<Rgb, MalformedElement> {
    let primary = fields.first().copied().unwrap_or("color");
    let Some((field, value)) = fields
        .iter()
        .find_map(|f| record.get(*f).map(|v| (*f, v)))
    else {
        return Err(MalformedElement::MissingField { kind, field: primary });
    };
    value
        .as_str()
        .and_then(Rgb::parse)
        .ok_or(MalformedElement::InvalidField { kind, field })
}
