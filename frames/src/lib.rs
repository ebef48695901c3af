//! Shared frame model and protobuf codec for the event-log relay.
//!
//! This crate owns the wire representation used by both the relay server and
//! the native `WsLog` client. Payloads stay flexible (`serde_json::Value`)
//! while encoding over protobuf for compact binary transport.
//!
//! Every exchange is `request → item* → done` or `request → error`. The
//! server additionally pushes `board:snapshot` items (no `parent_id`) to
//! every subscriber whenever a board's record set changes.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// =============================================================================
// SYSCALLS & FIELDS
// =============================================================================

/// Server → client greeting sent right after the upgrade.
pub const SESSION_CONNECTED: &str = "session:connected";
/// Start receiving full-snapshot pushes for a board.
pub const BOARD_SUBSCRIBE: &str = "board:subscribe";
/// Stop receiving pushes for a board.
pub const BOARD_UNSUBSCRIBE: &str = "board:unsubscribe";
/// Full current record set of a board, pushed on every change.
pub const BOARD_SNAPSHOT: &str = "board:snapshot";
/// Delete every record of a board.
pub const BOARD_CLEAR: &str = "board:clear";
/// Append one element record to a board.
pub const ELEMENT_APPEND: &str = "element:append";

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";
/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";
/// Frame data key for the retryable flag on error frames.
pub const FRAME_RETRYABLE: &str = "retryable";
/// Frame data key for a single element record.
pub const FRAME_RECORD: &str = "record";
/// Frame data key for a snapshot's `[{token, record}]` list.
pub const FRAME_RECORDS: &str = "records";
/// Frame data key for a server-assigned arrival token.
pub const FRAME_TOKEN: &str = "token";

// =============================================================================
// TYPES
// =============================================================================

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The `status` integer on the wire does not map to a known [`Status`] variant.
    #[error("invalid frame status: {0}")]
    InvalidStatus(i32),
}

/// Lifecycle status of a frame in a request/response exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Initial request frame sent by the client.
    Request,
    /// Intermediate streaming item (non-terminal).
    Item,
    /// Successful terminal response.
    Done,
    /// Error terminal response.
    Error,
}

impl Status {
    /// Terminal statuses end a response stream.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Convert status into wire enum integer value.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Request => WireFrameStatus::Request as i32,
            Self::Item => WireFrameStatus::Item as i32,
            Self::Done => WireFrameStatus::Done as i32,
            Self::Error => WireFrameStatus::Error as i32,
        }
    }

    /// Parse a status from wire enum integer value.
    fn from_i32(value: i32) -> Result<Self, CodecError> {
        match WireFrameStatus::try_from(value) {
            Ok(WireFrameStatus::Request) => Ok(Self::Request),
            Ok(WireFrameStatus::Item) => Ok(Self::Item),
            Ok(WireFrameStatus::Done) => Ok(Self::Done),
            Ok(WireFrameStatus::Error) => Ok(Self::Error),
            Err(_) => Err(CodecError::InvalidStatus(value)),
        }
    }
}

/// A single message on the realtime wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// ID of the request frame this is responding to, if any.
    pub parent_id: Option<String>,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    /// Board the frame is scoped to. Board ids are caller-supplied strings.
    pub board_id: Option<String>,
    /// Sender identifier (client id or system label).
    pub from: Option<String>,
    /// Namespaced operation name, e.g. `"element:append"`.
    pub syscall: String,
    /// Lifecycle position of the frame.
    pub status: Status,
    /// JSON object payload.
    pub data: Value,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// Create a request frame with an empty object payload.
    pub fn request(syscall: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            ts: now_ms(),
            board_id: None,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data: Value::Object(Map::new()),
        }
    }

    /// Create an empty done response. Terminal.
    #[must_use]
    pub fn done(&self) -> Self {
        self.reply(Status::Done, Value::Object(Map::new()))
    }

    /// Create a done response carrying a payload. Terminal.
    #[must_use]
    pub fn done_with(&self, data: Value) -> Self {
        self.reply(Status::Done, data)
    }

    /// Create an error response from a plain string. Terminal.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert(FRAME_MESSAGE.into(), Value::String(message.into()));
        self.reply(Status::Error, Value::Object(data))
    }

    /// Create a structured error response from a typed error. Terminal.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Map::new();
        data.insert(FRAME_CODE.into(), Value::String(err.error_code().to_owned()));
        data.insert(FRAME_MESSAGE.into(), Value::String(err.to_string()));
        data.insert(FRAME_RETRYABLE.into(), Value::Bool(err.retryable()));
        self.reply(Status::Error, Value::Object(data))
    }

    /// Build a reply frame. Inherits `board_id` and `syscall`.
    fn reply(&self, status: Status, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: Some(self.id.clone()),
            ts: now_ms(),
            board_id: self.board_id.clone(),
            from: None,
            syscall: self.syscall.clone(),
            status,
            data,
        }
    }
}

// =============================================================================
// BUILDERS & ACCESSORS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn with_board_id(mut self, board_id: impl Into<String>) -> Self {
        self.board_id = Some(board_id.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Insert one key into the object payload. A non-object payload is
    /// replaced by an object first.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if !self.data.is_object() {
            self.data = Value::Object(Map::new());
        }
        if let Some(map) = self.data.as_object_mut() {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Look up one key of the object payload.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Extract the syscall prefix (everything before the first ':').
    #[must_use]
    pub fn prefix(&self) -> &str {
        let Some((prefix, _)) = self.syscall.split_once(':') else {
            return &self.syscall;
        };
        prefix
    }

    /// Error message carried by an error frame, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.field(FRAME_MESSAGE).and_then(Value::as_str)
    }

    /// Whether an error frame marks its failure as retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.field(FRAME_RETRYABLE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = frame_to_wire(frame);

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot hit `BufferTooSmall`.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes and
/// [`CodecError::InvalidStatus`] for out-of-range status values.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    wire_to_frame(wire)
}

fn frame_to_wire(frame: &Frame) -> WireFrame {
    WireFrame {
        id: frame.id.clone(),
        parent_id: frame.parent_id.clone(),
        ts: frame.ts,
        board_id: frame.board_id.clone(),
        from: frame.from.clone(),
        syscall: frame.syscall.clone(),
        status: frame.status.as_i32(),
        data: Some(json_to_proto_value(&frame.data)),
    }
}

fn wire_to_frame(wire: WireFrame) -> Result<Frame, CodecError> {
    Ok(Frame {
        id: wire.id,
        parent_id: wire.parent_id,
        ts: wire.ts,
        board_id: wire.board_id,
        from: wire.from,
        syscall: wire.syscall,
        status: Status::from_i32(wire.status)?,
        data: wire
            .data
            .map_or(Value::Object(Map::new()), |v| proto_to_json_value(&v)),
    })
}

fn json_to_proto_value(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => prost_types::value::Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(v) => prost_types::value::Kind::BoolValue(*v),
        Value::Number(v) => prost_types::value::Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => prost_types::value::Kind::StringValue(v.clone()),
        Value::Array(v) => prost_types::value::Kind::ListValue(prost_types::ListValue {
            values: v.iter().map(json_to_proto_value).collect(),
        }),
        Value::Object(v) => prost_types::value::Kind::StructValue(prost_types::Struct {
            fields: v
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

fn proto_to_json_value(value: &prost_types::Value) -> Value {
    let Some(kind) = &value.kind else {
        return Value::Null;
    };

    match kind {
        prost_types::value::Kind::NullValue(_) => Value::Null,
        prost_types::value::Kind::NumberValue(v) => number_value(*v),
        prost_types::value::Kind::StringValue(v) => Value::String(v.clone()),
        prost_types::value::Kind::BoolValue(v) => Value::Bool(*v),
        prost_types::value::Kind::StructValue(v) => Value::Object(
            v.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json_value(v)))
                .collect(),
        ),
        prost_types::value::Kind::ListValue(v) => Value::Array(v.values.iter().map(proto_to_json_value).collect()),
    }
}

/// Protobuf carries every number as `f64`. Integral values come back as
/// JSON integers so arrival tokens survive the trip as `u64`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn number_value(v: f64) -> Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if v.fract() == 0.0 && (0.0..=MAX_EXACT).contains(&v) {
        return Value::from(v as u64);
    }
    if v.fract() == 0.0 && (-MAX_EXACT..0.0).contains(&v) {
        return Value::from(v as i64);
    }
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(string, optional, tag = "2")]
    parent_id: Option<String>,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(string, optional, tag = "4")]
    board_id: Option<String>,
    #[prost(string, optional, tag = "5")]
    from: Option<String>,
    #[prost(string, tag = "6")]
    syscall: String,
    #[prost(enumeration = "WireFrameStatus", tag = "7")]
    status: i32,
    #[prost(message, optional, tag = "8")]
    data: Option<prost_types::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum WireFrameStatus {
    Request = 0,
    Done = 1,
    Error = 2,
    Item = 4,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
