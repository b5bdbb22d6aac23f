//! Relay through a running Tauri app instead of the in-process [`HostRelay`].
//!
//! [`HostRelay`]: super::HostRelay

use std::sync::Weak;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tauri::{AppHandle, EventTarget, Listener};

use super::escape_for_script;
use crate::bus::{EventBus, NativeBridge, TransportAdapter, TransportError};

/// Tauri event carrying every relayed surface event.
pub const RELAY_EVENT: &str = "byoa://relay";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMessage {
    pub from: String,
    pub name: String,
    pub payload: String,
}

pub struct TauriBridge {
    app: AppHandle,
    label: String,
}

impl TauriBridge {
    pub fn new(app: AppHandle, label: impl Into<String>) -> Self {
        Self {
            app,
            label: label.into(),
        }
    }
}

#[async_trait]
impl NativeBridge for TauriBridge {
    async fn send(&self, event_name: &str, payload: &str) -> Result<(), TransportError> {
        use tauri::Emitter;

        let message = RelayMessage {
            from: self.label.clone(),
            name: event_name.to_string(),
            payload: escape_for_script(payload),
        };
        let sender = self.label.as_str();
        self.app
            .emit_filter(RELAY_EVENT, message, |target| match target {
                EventTarget::Window { label }
                | EventTarget::Webview { label }
                | EventTarget::WebviewWindow { label }
                | EventTarget::AnyLabel { label } => label != sender,
                EventTarget::Any | EventTarget::App => true,
                _ => false,
            })
            .map_err(|e| TransportError::Bridge(e.to_string()))
    }
}

/// Route relayed events addressed to others into `bus`. Messages sent by
/// `label` itself are skipped.
pub fn attach_inbound(app: &AppHandle, label: impl Into<String>, bus: Weak<EventBus>) -> tauri::EventId {
    let label = label.into();
    app.listen_any(RELAY_EVENT, move |event| {
        let message: RelayMessage = match serde_json::from_str(event.payload()) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("malformed relay message for {label}: {e}");
                return;
            }
        };
        if message.from == label {
            return;
        }
        match bus.upgrade() {
            Some(bus) => TransportAdapter::deliver(&bus, &message.name, &message.payload),
            None => tracing::debug!("surface {label} dropped, ignoring {}", message.name),
        }
    })
}
