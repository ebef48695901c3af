//! Async side of the whiteboard: the remote event log and the session that
//! drives a [`canvas::engine::EngineCore`] against it.
//!
//! The canvas engine is sans-IO and emits `Action`s. [`session::BoardSession`]
//! carries those out against any [`log::EventLog`]: commits are appended with
//! timeout and retry, clears are issued after confirmation, and a dropped
//! live feed is re-established with backoff.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`log`] | `EventLog` contract, `Ack`, `Subscription` |
//! | [`memory`] | In-process `MemoryLog` |
//! | [`ws`] | `WsLog` client for the relay server |
//! | [`session`] | `BoardSession` open/close, commit retry, resubscribe |
//! | [`config`] | `SyncConfig` timeouts and backoff |
//! | [`error`] | `LogError`, `SyncError` |

pub mod config;
pub mod error;
pub mod log;
pub mod memory;
pub mod session;
pub mod ws;

pub use config::SyncConfig;
pub use error::{LogError, SyncError};
pub use log::{Ack, EventLog, Subscription};
pub use memory::MemoryLog;
pub use session::{BoardSession, SessionEvent};
pub use ws::WsLog;
