use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;

use super::decode::{DecodeLadder, Decoded};
use super::event_types::{OpaquePayload, SurfaceEvent};
use super::transport::TransportAdapter;

/// Native events accepted before `initialize()`; older ones are dropped first.
pub const DEFAULT_PENDING_CAPACITY: usize = 64;

pub type Listener = Arc<dyn Fn(&SurfaceEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Registered {
    id: ListenerId,
    listener: Listener,
}

/// Listener sets keyed by event name, each in registration order.
#[derive(Default)]
struct Registry {
    slots: DashMap<String, Vec<Registered>>,
}

impl Registry {
    fn insert(&self, name: &str, id: ListenerId, listener: Listener) {
        self.slots
            .entry(name.to_string())
            .or_default()
            .push(Registered { id, listener });
    }

    fn remove(&self, name: &str, id: ListenerId) -> bool {
        let removed = match self.slots.get_mut(name) {
            Some(mut slot) => {
                let before = slot.len();
                slot.retain(|entry| entry.id != id);
                before != slot.len()
            }
            None => false,
        };
        self.slots.remove_if(name, |_, slot| slot.is_empty());
        removed
    }

    fn snapshot(&self, name: &str) -> Vec<Listener> {
        self.slots
            .get(name)
            .map(|slot| slot.iter().map(|entry| entry.listener.clone()).collect())
            .unwrap_or_default()
    }
}

/// Handle for one registration. Dropping it keeps the listener registered;
/// call [`Subscription::unsubscribe`] to remove it. Unsubscribing twice is safe.
pub struct Subscription {
    registry: Weak<Registry>,
    name: String,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn event_name(&self) -> &str {
        &self.name
    }

    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(&self.name, self.id),
            None => false,
        }
    }
}

/// Process-local pub/sub for one surface, plus the relay to other surfaces.
pub struct EventBus {
    registry: Arc<Registry>,
    next_id: AtomicU64,
    initialized: AtomicBool,
    pending: Mutex<VecDeque<(String, String)>>,
    pending_capacity: usize,
    transport: TransportAdapter,
    ladder: DecodeLadder,
}

impl EventBus {
    pub fn new(transport: TransportAdapter) -> Self {
        Self::with_options(transport, DecodeLadder::standard(), DEFAULT_PENDING_CAPACITY)
    }

    pub fn with_options(
        transport: TransportAdapter,
        ladder: DecodeLadder,
        pending_capacity: usize,
    ) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            next_id: AtomicU64::new(1),
            initialized: AtomicBool::new(false),
            pending: Mutex::new(VecDeque::new()),
            pending_capacity,
            transport,
            ladder,
        }
    }

    /// Mark the bus ready and replay native events that arrived early.
    /// Returns `false` if the bus was already initialized.
    pub fn initialize(&self) -> bool {
        let queued = {
            let mut pending = self.pending.lock().expect("event bus pending mutex poisoned");
            if self.initialized.swap(true, Ordering::SeqCst) {
                return false;
            }
            std::mem::take(&mut *pending)
        };

        tracing::info!(replayed = queued.len(), "event bus initialized");
        for (name, raw) in queued {
            self.dispatch_native(&name, &raw);
        }
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Back to the uninitialized state with no listeners and nothing queued.
    pub fn reset(&self) {
        let mut pending = self.pending.lock().expect("event bus pending mutex poisoned");
        pending.clear();
        self.initialized.store(false, Ordering::SeqCst);
        self.registry.slots.clear();
    }

    pub fn on<F>(&self, name: impl AsRef<str>, listener: F) -> Subscription
    where
        F: Fn(&SurfaceEvent) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        let name = name.as_ref().to_string();
        self.registry.insert(&name, id, Arc::new(listener));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            name,
            id,
        }
    }

    /// Listen for the next event only. The listener runs at most once even if
    /// it triggers another emit of the same name while running.
    pub fn once<F>(&self, name: impl AsRef<str>, listener: F) -> Subscription
    where
        F: FnOnce(&SurfaceEvent) + Send + 'static,
    {
        let id = self.allocate_id();
        let name = name.as_ref().to_string();
        let registry = Arc::downgrade(&self.registry);
        let slot = Mutex::new(Some(listener));
        let event_name = name.clone();

        let wrapper = move |event: &SurfaceEvent| {
            let taken = slot.lock().expect("once listener mutex poisoned").take();
            let Some(listener) = taken else {
                return;
            };
            if let Some(registry) = registry.upgrade() {
                registry.remove(&event_name, id);
            }
            listener(event);
        };

        self.registry.insert(&name, id, Arc::new(wrapper));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            name,
            id,
        }
    }

    pub fn off(&self, name: impl AsRef<str>, id: ListenerId) -> bool {
        self.registry.remove(name.as_ref(), id)
    }

    /// Invoke every current listener for the event's name, in registration
    /// order. A panicking listener is logged and skipped. Returns how many
    /// listeners were invoked.
    pub fn emit(&self, event: &SurfaceEvent) -> usize {
        let name = event.name();
        let listeners = self.registry.snapshot(name);
        tracing::debug!("emitting {name} to {} listeners", listeners.len());

        for (index, listener) in listeners.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener(event)));
            if let Err(panic) = outcome {
                tracing::error!(
                    "listener {}/{} for {name} panicked: {}",
                    index + 1,
                    listeners.len(),
                    panic_message(&*panic)
                );
            }
        }
        listeners.len()
    }

    /// Send the event to every other surface. Best effort: failures are logged.
    pub async fn trigger_to_other_webview(&self, event: &SurfaceEvent) {
        let name = event.name();
        let payload = match event.payload_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("failed to serialize {name} for relay: {e}");
                return;
            }
        };
        self.transport.send(name, &payload).await;
    }

    /// Decode a payload delivered by the native bridge and emit it locally.
    /// Events that arrive before `initialize()` are queued and replayed.
    pub fn handle_native_event(&self, name: &str, raw: &str) {
        {
            let mut pending = self.pending.lock().expect("event bus pending mutex poisoned");
            if !self.initialized.load(Ordering::SeqCst) {
                if pending.len() >= self.pending_capacity {
                    if let Some((dropped, _)) = pending.pop_front() {
                        tracing::warn!("pending native events full, dropped {dropped}");
                    }
                }
                if self.pending_capacity > 0 {
                    pending.push_back((name.to_string(), raw.to_string()));
                }
                tracing::debug!("queued {name} until event bus is initialized");
                return;
            }
        }
        self.dispatch_native(name, raw);
    }

    /// Listener counts per event name.
    pub fn active_listeners(&self) -> BTreeMap<String, usize> {
        self.registry
            .slots
            .iter()
            .map(|slot| (slot.key().clone(), slot.value().len()))
            .collect()
    }

    pub fn clear_all(&self) {
        self.registry.slots.clear();
    }

    fn dispatch_native(&self, name: &str, raw: &str) {
        tracing::debug!(len = raw.len(), "received native event {name}");
        let event = match self.ladder.decode(raw) {
            Decoded::Json(value) => SurfaceEvent::from_json(name, value),
            Decoded::Bare(value) => SurfaceEvent::opaque(name, OpaquePayload::Value(value)),
            Decoded::Raw(raw) => SurfaceEvent::opaque(name, OpaquePayload::Raw(raw)),
        };
        self.emit(&event);
    }

    fn allocate_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}
