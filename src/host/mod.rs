//! The native host side of cross-surface messaging.
//!
//! Surfaces never talk to each other directly. Each one hands `(name, payload)`
//! to the host, which re-escapes the payload for script evaluation and calls
//! the inbound hook of every other registered surface.

mod relay;
#[cfg(feature = "tauri-host")]
pub mod tauri_bridge;

pub use relay::{escape_for_script, HostBridge, HostRelay};
