//! Drawing synchronization engine for the shared whiteboard.
//!
//! This crate is sans-IO: it owns the element model, the local draft of the
//! gesture in progress, the reconciliation of remote snapshots with that
//! draft, and the input state machine. Everything that touches the network
//! is expressed as [`engine::Action`]s for the host to carry out (the
//! `boardsync` crate does this natively; a browser host does it over its own
//! transport). The only browser-bound pieces are [`render`] and the
//! [`engine::Engine`] wrapper around an `HtmlCanvasElement`.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`element`] | Stroke/Label element model and the wire record codec |
//! | [`board`] | Board identifiers |
//! | [`draft`] | Local draft buffer for the gesture in progress |
//! | [`reconcile`] | Confirmed element list and render-list merge |
//! | [`outbox`] | Commits awaiting acknowledgement from the event log |
//! | [`input`] | Tools, tool settings, keys and modifiers |
//! | [`bulk`] | Board clear confirmation flow and export naming |
//! | [`engine`] | Event routing ([`engine::EngineCore`]) and the browser engine |
//! | [`render`] | Canvas 2D drawing of the render list |
//! | [`consts`] | Shared defaults and limits |

pub mod board;
pub mod bulk;
pub mod consts;
pub mod draft;
pub mod element;
pub mod engine;
pub mod input;
pub mod outbox;
pub mod reconcile;
pub mod render;
