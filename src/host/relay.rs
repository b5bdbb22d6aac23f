use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::bus::{EventBus, NativeBridge, TransportAdapter, TransportError};

/// Escape text the way the host does before splicing it into a script call.
pub fn escape_for_script(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '"' | '\'' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// In-process message bus between surfaces, keyed by surface label.
///
/// Surfaces are held weakly: a surface that has been dropped is pruned on the
/// next relay.
#[derive(Default)]
pub struct HostRelay {
    surfaces: DashMap<String, Weak<EventBus>>,
}

impl HostRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, label: impl Into<String>, bus: &Arc<EventBus>) {
        let label = label.into();
        if self
            .surfaces
            .insert(label.clone(), Arc::downgrade(bus))
            .is_some()
        {
            tracing::warn!("surface {label} re-registered, replacing previous bus");
        } else {
            tracing::info!("surface {label} registered with host relay");
        }
    }

    pub fn unregister(&self, label: &str) -> bool {
        self.surfaces.remove(label).is_some()
    }

    pub fn is_registered(&self, label: &str) -> bool {
        self.surfaces.contains_key(label)
    }

    /// Registered labels, sorted.
    pub fn surfaces(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.surfaces.iter().map(|e| e.key().clone()).collect();
        labels.sort();
        labels
    }

    /// A bridge that sends on behalf of `label`.
    pub fn bridge_for(self: &Arc<Self>, label: impl Into<String>) -> HostBridge {
        HostBridge {
            relay: self.clone(),
            label: label.into(),
        }
    }

    /// Forward one event from `from` to every other live surface.
    /// Returns the number of surfaces it was delivered to.
    pub fn relay(&self, from: &str, event_name: &str, payload: &str) -> Result<usize, TransportError> {
        if !self.surfaces.contains_key(from) {
            return Err(TransportError::UnknownSurface(from.to_string()));
        }

        // Collect targets first; no map guard may be held while listeners run.
        let mut targets = Vec::new();
        let mut dead = Vec::new();
        for entry in self.surfaces.iter() {
            if entry.key() == from {
                continue;
            }
            match entry.value().upgrade() {
                Some(bus) => targets.push((entry.key().clone(), bus)),
                None => dead.push(entry.key().clone()),
            }
        }
        for label in dead {
            tracing::debug!("pruning dropped surface {label}");
            self.surfaces.remove(&label);
        }

        let escaped = escape_for_script(payload);
        for (label, bus) in &targets {
            tracing::debug!("relaying {event_name} from {from} to {label}");
            TransportAdapter::deliver(bus, event_name, &escaped);
        }
        Ok(targets.len())
    }
}

/// [`NativeBridge`] bound to one surface label of a [`HostRelay`].
pub struct HostBridge {
    relay: Arc<HostRelay>,
    label: String,
}

impl HostBridge {
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[async_trait]
impl NativeBridge for HostBridge {
    async fn send(&self, event_name: &str, payload: &str) -> Result<(), TransportError> {
        let delivered = self.relay.relay(&self.label, event_name, payload)?;
        if delivered == 0 {
            tracing::debug!("no other surface to receive {event_name}");
        }
        Ok(())
    }
}
