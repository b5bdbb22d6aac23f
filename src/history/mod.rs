//! Interaction history for the popup surface.
//!
//! A LIFO stack of what the user is looking at or acting on. Each entry is
//! either at rest (`action == None`) or in progress (`action == Some(..)`).
//! Only the top entry may be in progress: `push` settles the previous top
//! before stacking the new entry.
//!
//! Every mutation schedules one coalesced change notification. With a Tokio
//! runtime, delivery happens once the burst has gone quiet for a scheduler
//! turn, on either runtime flavor; without one, call
//! [`InteractionHistory::flush_changes`].

pub mod notifier;


use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use tokio::task::yield_now;
use serde::{Deserialize, Serialize};

use notifier::CoalescingNotifier;

/// The action being applied to an entry's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: String,
    /// Free-form user input, used by the "ask" action.
    #[serde(default)]
    pub context: String,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: String::new(),
        }
    }

    pub fn with_context(id: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: context.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
}

/// One piece of clipboard-like content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ContentItem {
    Text(String),
    /// Encoded image bytes (PNG), base64 on the wire.
    Image(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text(_) => ContentKind::Text,
            Self::Image(_) => ContentKind::Image,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image(_) => None,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: Option<ActionRequest>,
    pub content: Vec<ContentItem>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn is_in_progress(&self) -> bool {
        self.action.is_some()
    }
}

/// State observed by change listeners, taken when the notification fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryChange {
    pub top: Option<HistoryEntry>,
    pub size: usize,
}

pub type ChangeListener = Arc<dyn Fn(&HistoryChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeListenerId(u64);

struct Shared {
    entries: Mutex<Vec<HistoryEntry>>,
    listeners: Mutex<Vec<(ChangeListenerId, ChangeListener)>>,
    next_listener: AtomicU64,
    notifier: CoalescingNotifier,
}

impl Shared {
    fn remove_listener(&self, id: ChangeListenerId) -> bool {
        let mut listeners = self.listeners.lock().expect("history listeners mutex poisoned");
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    fn deliver(&self) -> bool {
        if !self.notifier.take() {
            return false;
        }

        let change = {
            let entries = self.entries.lock().expect("history mutex poisoned");
            HistoryChange {
                top: entries.last().cloned(),
                size: entries.len(),
            }
        };
        let listeners: Vec<ChangeListener> = self
            .listeners
            .lock()
            .expect("history listeners mutex poisoned")
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        tracing::debug!(size = change.size, "history changed, notifying {} listeners", listeners.len());
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&change))).is_err() {
                tracing::error!("history change listener panicked");
            }
        }
        true
    }
}

/// Handle returned by [`InteractionHistory::on_change`].
pub struct ChangeSubscription {
    shared: Weak<Shared>,
    id: ChangeListenerId,
}

impl ChangeSubscription {
    pub fn id(&self) -> ChangeListenerId {
        self.id
    }

    pub fn unsubscribe(&self) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.remove_listener(self.id))
            .unwrap_or(false)
    }
}

/// Cheap-to-clone handle to one surface's history stack.
#[derive(Clone)]
pub struct InteractionHistory {
    shared: Arc<Shared>,
}

impl Default for InteractionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionHistory {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                notifier: CoalescingNotifier::new(),
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.entries_guard().len()
    }

    pub fn top(&self) -> Option<HistoryEntry> {
        self.entries_guard().last().cloned()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries_guard().clone()
    }

    /// Undo, retry and copy need a committed state to fall back to.
    pub fn can_navigate(&self) -> bool {
        self.size() >= 2
    }

    pub fn is_in_progress(&self) -> bool {
        self.entries_guard()
            .last()
            .map(HistoryEntry::is_in_progress)
            .unwrap_or(false)
    }

    /// Stack a new entry. The previous top, if it was in progress, is settled.
    pub fn push(&self, action: Option<ActionRequest>, content: Vec<ContentItem>) {
        {
            let mut entries = self.entries_guard();
            if let Some(previous) = entries.last_mut() {
                previous.action = None;
            }
            let entry = new_entry(entries.last(), action, content);
            tracing::debug!(
                in_progress = entry.is_in_progress(),
                depth = entries.len() + 1,
                "history push"
            );
            entries.push(entry);
        }
        self.schedule_change();
    }

    /// Swap the top entry for a new one without changing the depth.
    /// Returns `false` (and does nothing) on an empty stack.
    pub fn replace(&self, action: Option<ActionRequest>, content: Vec<ContentItem>) -> bool {
        {
            let mut entries = self.entries_guard();
            let Some(discarded) = entries.pop() else {
                tracing::debug!("history replace on empty stack ignored");
                return false;
            };
            let mut entry = new_entry(entries.last(), action, content);
            entry.timestamp = entry.timestamp.max(discarded.timestamp);
            tracing::debug!(in_progress = entry.is_in_progress(), "history replace");
            entries.push(entry);
        }
        self.schedule_change();
        true
    }

    /// Remove the top entry, keeping at least one. Returns the removed entry.
    pub fn pop(&self) -> Option<HistoryEntry> {
        let popped = {
            let mut entries = self.entries_guard();
            if entries.len() < 2 {
                tracing::debug!(depth = entries.len(), "history pop ignored");
                return None;
            }
            entries.pop()
        };
        self.schedule_change();
        popped
    }

    pub fn clear(&self) {
        self.entries_guard().clear();
        self.schedule_change();
    }

    pub fn on_change<F>(&self, listener: F) -> ChangeSubscription
    where
        F: Fn(&HistoryChange) + Send + Sync + 'static,
    {
        let id = ChangeListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared
            .listeners
            .lock()
            .expect("history listeners mutex poisoned")
            .push((id, Arc::new(listener)));
        ChangeSubscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    pub fn off_change(&self, id: ChangeListenerId) -> bool {
        self.shared.remove_listener(id)
    }

    /// Deliver a pending notification now. Returns whether one was pending.
    pub fn flush_changes(&self) -> bool {
        self.shared.deliver()
    }

    pub fn has_pending_change(&self) -> bool {
        self.shared.notifier.is_pending()
    }

    /// Number of notifications delivered so far.
    pub fn notifications_delivered(&self) -> u64 {
        self.shared.notifier.delivered()
    }

    fn schedule_change(&self) {
        if !self.shared.notifier.schedule() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::trace!("no runtime, history change waits for flush_changes");
            return;
        };
        let shared = Arc::downgrade(&self.shared);
        handle.spawn(async move {
            if settle(&shared).await {
                if let Some(shared) = shared.upgrade() {
                    shared.deliver();
                }
            }
        });
    }

    fn entries_guard(&self) -> std::sync::MutexGuard<'_, Vec<HistoryEntry>> {
        self.shared.entries.lock().expect("history mutex poisoned")
    }
}

/// Quiet scheduler turns required before a burst counts as finished.
const QUIET_TURNS: u32 = 3;
/// Upper bound on turns spent waiting, so a steady stream still notifies.
const MAX_SETTLE_TURNS: u32 = 64;

/// Wait until no mutation lands for [`QUIET_TURNS`] consecutive turns.
/// Returns `false` if the history was dropped meanwhile.
async fn settle(shared: &Weak<Shared>) -> bool {
    let mut quiet = 0;
    for _ in 0..MAX_SETTLE_TURNS {
        let Some(seen) = shared.upgrade().map(|s| s.notifier.generation()) else {
            return false;
        };
        yield_now().await;
        let Some(now) = shared.upgrade().map(|s| s.notifier.generation()) else {
            return false;
        };
        if now == seen {
            quiet += 1;
            if quiet >= QUIET_TURNS {
                return true;
            }
        } else {
            quiet = 0;
        }
    }
    tracing::trace!("history still changing, notifying mid-stream");
    true
}

fn new_entry(
    below: Option<&HistoryEntry>,
    action: Option<ActionRequest>,
    content: Vec<ContentItem>,
) -> HistoryEntry {
    let now = Utc::now();
    let timestamp = below.map(|entry| entry.timestamp.max(now)).unwrap_or(now);
    HistoryEntry {
        action,
        content,
        timestamp,
    }
}
