//! The single point of contact with the native bridge.
//!
//! Outbound, a surface hands `(name, payload_text)` to the bridge, which the
//! host relays to every other surface. Inbound, the host invokes one callback
//! per surface; the adapter routes it into the local [`EventBus`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::EventBus;

/// Errors from the native bridge. These never escape the bus.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("target surface not found: {0}")]
    UnknownSurface(String),
    #[error("bridge call failed: {0}")]
    Bridge(String),
}

/// The native relay call: ship one named payload to every other surface.
#[async_trait]
pub trait NativeBridge: Send + Sync {
    async fn send(&self, event_name: &str, payload: &str) -> Result<(), TransportError>;
}

#[derive(Clone)]
pub struct TransportAdapter {
    bridge: Option<Arc<dyn NativeBridge>>,
}

impl fmt::Debug for TransportAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportAdapter")
            .field("attached", &self.bridge.is_some())
            .finish()
    }
}

impl TransportAdapter {
    pub fn new(bridge: Arc<dyn NativeBridge>) -> Self {
        Self {
            bridge: Some(bridge),
        }
    }

    /// An adapter with no bridge behind it, as when running outside the host.
    pub fn detached() -> Self {
        Self { bridge: None }
    }

    pub fn is_available(&self) -> bool {
        self.bridge.is_some()
    }

    /// Fire-and-forget send. The outcome is logged, never returned.
    pub async fn send(&self, event_name: &str, payload: &str) {
        let Some(bridge) = &self.bridge else {
            tracing::warn!("native bridge not available, dropping {event_name}");
            return;
        };

        match bridge.send(event_name, payload).await {
            Ok(()) => tracing::debug!(len = payload.len(), "relayed {event_name}"),
            Err(e) => tracing::warn!("failed to relay {event_name}: {e}"),
        }
    }

    /// Inbound hook: the host delivered `(name, raw)` to this surface.
    pub fn deliver(bus: &EventBus, event_name: &str, raw: &str) {
        bus.handle_native_event(event_name, raw);
    }
}
