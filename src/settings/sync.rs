//! Receiving side of settings propagation.
//!
//! Each settings event is treated as a hint: the listener ignores the payload
//! and reloads the affected key from the vault, then publishes a new
//! [`SettingsSnapshot`] on a watch channel.
//!
//! Reloads of one section hold that section's lock across the vault read and
//! the publish, so the last value published is always the last value read.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use super::{SettingsError, SettingsStore};
use crate::bus::event_types::{ActionConfig, EventKind, LlmConfig, Theme};
use crate::bus::{EventBus, Subscription};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsSnapshot {
    pub theme: Theme,
    pub llm_configs: Vec<LlmConfig>,
    pub actions: Vec<ActionConfig>,
    /// Bumped on every successful reload.
    pub revision: u64,
}

impl SettingsSnapshot {
    pub fn enabled_llms(&self) -> impl Iterator<Item = &LlmConfig> {
        self.llm_configs.iter().filter(|config| config.enabled)
    }

    pub fn enabled_actions(&self) -> impl Iterator<Item = &ActionConfig> {
        self.actions.iter().filter(|action| action.enabled)
    }

    pub fn action(&self, id: &str) -> Option<&ActionConfig> {
        self.actions.iter().find(|action| action.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Theme,
    LlmConfigs,
    Actions,
}

impl Section {
    fn for_kind(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::ThemeChanged => Some(Self::Theme),
            EventKind::LlmConfigsChanged | EventKind::LlmEnabledChanged => Some(Self::LlmConfigs),
            EventKind::ActionsChanged | EventKind::ActionEnabledChanged => Some(Self::Actions),
            EventKind::RequestRefresh | EventKind::ClipboardChanged => None,
        }
    }
}

/// One lock per [`Section`].
#[derive(Default)]
struct ReloadLocks {
    theme: Mutex<()>,
    llm_configs: Mutex<()>,
    actions: Mutex<()>,
}

impl ReloadLocks {
    fn get(&self, section: Section) -> &Mutex<()> {
        match section {
            Section::Theme => &self.theme,
            Section::LlmConfigs => &self.llm_configs,
            Section::Actions => &self.actions,
        }
    }
}

/// Shared by every reload task spawned for one surface.
struct Reloader {
    store: Arc<SettingsStore>,
    snapshot: watch::Sender<SettingsSnapshot>,
    locks: ReloadLocks,
}

pub struct SettingsSync {
    reloader: Arc<Reloader>,
    subscriptions: Vec<Subscription>,
}

impl SettingsSync {
    /// Listen for settings events on `bus`. Call [`SettingsSync::refresh_all`]
    /// to populate the first snapshot.
    pub fn attach(bus: &EventBus, store: Arc<SettingsStore>) -> Self {
        let (snapshot, _rx) = watch::channel(SettingsSnapshot::default());
        let reloader = Arc::new(Reloader {
            store,
            snapshot,
            locks: ReloadLocks::default(),
        });

        let subscriptions = EventKind::all()
            .iter()
            .filter_map(|kind| Section::for_kind(*kind).map(|section| (*kind, section)))
            .map(|(kind, section)| {
                let reloader = reloader.clone();
                // Listen by name so payloads that failed to decode still trigger a reload.
                bus.on(kind.as_str(), move |_event| {
                    spawn_reload(reloader.clone(), section);
                })
            })
            .collect();

        Self {
            reloader,
            subscriptions,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SettingsSnapshot> {
        self.reloader.snapshot.subscribe()
    }

    pub fn current(&self) -> SettingsSnapshot {
        self.reloader.snapshot.borrow().clone()
    }

    /// Reload every section and publish them as one snapshot.
    pub async fn refresh_all(&self) -> Result<(), SettingsError> {
        self.reloader.reload_all().await
    }

    pub fn detach(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

impl Drop for SettingsSync {
    fn drop(&mut self) {
        self.detach();
    }
}

fn spawn_reload(reloader: Arc<Reloader>, section: Section) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("settings change for {section:?} ignored: no async runtime");
        return;
    };
    handle.spawn(async move {
        if let Err(e) = reloader.reload(section).await {
            tracing::warn!("failed to reload {section:?} settings: {e}");
        }
    });
}

impl Reloader {
    async fn reload(&self, section: Section) -> Result<(), SettingsError> {
        let _guard = self.locks.get(section).lock().await;
        match section {
            Section::Theme => {
                let theme = self.store.load_theme().await?;
                self.snapshot.send_modify(|s| {
                    s.theme = theme;
                    s.revision += 1;
                });
            }
            Section::LlmConfigs => {
                let configs = self.store.load_llm_configs().await?;
                self.snapshot.send_modify(|s| {
                    s.llm_configs = configs;
                    s.revision += 1;
                });
            }
            Section::Actions => {
                let actions = self.store.load_actions().await?;
                self.snapshot.send_modify(|s| {
                    s.actions = actions;
                    s.revision += 1;
                });
            }
        }
        tracing::debug!("reloaded {section:?} settings from vault");
        Ok(())
    }

    async fn reload_all(&self) -> Result<(), SettingsError> {
        // Fixed lock order; single-section reloads only ever hold one.
        let _theme = self.locks.theme.lock().await;
        let _llm_configs = self.locks.llm_configs.lock().await;
        let _actions = self.locks.actions.lock().await;

        let theme = self.store.load_theme().await?;
        let llm_configs = self.store.load_llm_configs().await?;
        let actions = self.store.load_actions().await?;
        self.snapshot.send_modify(|snapshot| {
            snapshot.theme = theme;
            snapshot.llm_configs = llm_configs;
            snapshot.actions = actions;
            snapshot.revision += 1;
        });
        Ok(())
    }
}
