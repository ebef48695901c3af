//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the event log and its persistence so the route
//! handler stays focused on frame translation.

pub mod log;
pub mod persistence;
