//! Event system for cross-surface communication.
//!
//! The event bus provides:
//! - Publish-subscribe between components of one surface
//! - Relay of settings events to every other surface through the native host
//! - Recovery of payloads the host re-escaped on the way
//!
//! # Architecture
//!
//! Events flow surface → TransportAdapter → host → TransportAdapter → EventBus:
//! - `EventBus`: listener registry, local `emit`, outbound `trigger_to_other_webview`
//! - `TransportAdapter`: the single native bridge call and the inbound hook
//! - `DecodeLadder`: JSON, unescaped JSON, quoted string, raw text, in that order
//! - `SurfaceEvent`: the event catalogue as a tagged union

pub mod decode;
mod event_bus;
pub mod event_types;
pub mod transport;

#[cfg(test)]
mod tests;

pub use decode::{DecodeLadder, DecodeStrategy, Decoded};
pub use event_bus::{EventBus, Listener, ListenerId, Subscription, DEFAULT_PENDING_CAPACITY};
pub use event_types::{EventKind, OpaquePayload, SurfaceEvent};
pub use transport::{NativeBridge, TransportAdapter, TransportError};
