//! BYOA surface runtime.
//!
//! The assistant runs several isolated webview surfaces (popup, settings)
//! inside one native host. This crate is what each surface runs on:
//! - Event bus and the decode ladder for payloads relayed through the host
//! - The popup's interaction history and action workflow
//! - Settings persisted in the shared vault and kept in sync across surfaces
//!
//! # Architecture
//!
//! - `bus`: per-surface pub/sub, transport adapter, event catalogue
//! - `host`: the host-side relay between surfaces (and the Tauri bridge)
//! - `history`: LIFO interaction stack with coalesced change notifications
//! - `workflow`: start/commit/revert of actions, undo/retry/copy
//! - `settings`: vault-backed LLM configs, actions and theme
//! - `vault`, `llm`, `clipboard`: collaborators behind traits
//! - `config`, `logging`: process setup

pub mod bus;
pub mod clipboard;
pub mod config;
pub mod history;
pub mod host;
pub mod llm;
pub mod logging;
pub mod settings;
pub mod vault;
pub mod workflow;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use serde::Serialize;

use bus::{DecodeLadder, EventBus, TransportAdapter};
use clipboard::Clipboard;
use config::AppConfig;
use history::InteractionHistory;
use host::HostRelay;
use llm::{LlmClient, OpenAiCompatClient};
use settings::sync::SettingsSync;
use settings::SettingsStore;
use vault::{SqliteVault, Vault};
use workflow::WorkflowController;

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Vault(#[from] vault::VaultError),
    #[error("{0}")]
    Settings(#[from] settings::SettingsError),
    #[error("{0}")]
    Workflow(#[from] workflow::WorkflowError),
    #[error("{0}")]
    Llm(#[from] llm::LlmError),
    #[error("{0}")]
    Transport(#[from] bus::TransportError),
    #[error("{0}")]
    Other(String),
}

impl Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Collaborators shared by every surface of one host process.
pub struct App {
    pub config: AppConfig,
    pub relay: Arc<HostRelay>,
    pub vault: Arc<dyn Vault>,
    pub llm: Arc<dyn LlmClient>,
    pub clipboard: Arc<dyn Clipboard>,
}

impl App {
    /// Open the vault under the configured data directory.
    pub fn open(config: AppConfig, clipboard: Arc<dyn Clipboard>) -> Result<Self, AppError> {
        config.ensure_data_dir().map_err(AppError::Other)?;
        let vault_path = config.vault_path();
        tracing::info!("opening vault at {}", vault_path.display());
        let vault = Arc::new(SqliteVault::open(&vault_path)?);

        Ok(Self::with_parts(
            config,
            vault,
            Arc::new(OpenAiCompatClient::new()),
            clipboard,
        ))
    }

    pub fn with_parts(
        config: AppConfig,
        vault: Arc<dyn Vault>,
        llm: Arc<dyn LlmClient>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            config,
            relay: HostRelay::new(),
            vault,
            llm,
            clipboard,
        }
    }

    /// Create a surface, register it with the relay and load its settings.
    pub async fn open_surface(&self, label: &str) -> Result<Surface, AppError> {
        let transport = TransportAdapter::new(Arc::new(self.relay.bridge_for(label)));
        let bus = Arc::new(EventBus::with_options(
            transport,
            DecodeLadder::standard(),
            self.config.pending_event_capacity,
        ));
        self.relay.register(label, &bus);

        let store = Arc::new(SettingsStore::new(self.vault.clone(), bus.clone()));
        let sync = SettingsSync::attach(&bus, store.clone());
        sync.refresh_all().await?;

        let history = InteractionHistory::new();
        let workflow = WorkflowController::new(
            history.clone(),
            sync.subscribe(),
            self.llm.clone(),
            self.clipboard.clone(),
            bus.clone(),
        );

        bus.initialize();
        tracing::info!("surface {label} ready");
        Ok(Surface {
            label: label.to_string(),
            bus,
            history,
            settings: store,
            sync,
            workflow,
        })
    }

    pub fn close_surface(&self, surface: Surface) {
        self.relay.unregister(&surface.label);
        surface.bus.reset();
        tracing::info!("surface {} closed", surface.label);
    }
}

/// Everything one surface owns.
pub struct Surface {
    pub label: String,
    pub bus: Arc<EventBus>,
    pub history: InteractionHistory,
    pub settings: Arc<SettingsStore>,
    pub sync: SettingsSync,
    pub workflow: WorkflowController,
}

/// Install logging from the environment and open the app.
pub fn init(clipboard: Arc<dyn Clipboard>) -> Result<App, AppError> {
    let config = AppConfig::from_env();
    logging::init_tracing(config.log_filter.as_deref());
    App::open(config, clipboard)
}
