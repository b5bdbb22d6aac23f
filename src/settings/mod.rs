//! Shared settings: LLM configurations, quick actions and theme.
//!
//! Writes go to the vault first and are then announced to the other surfaces.
//! The announcement is advisory; receivers reload from the vault (see
//! [`sync::SettingsSync`]).

pub mod sync;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bus::event_types::{
    ActionConfig, ActionEnabledChanged, ActionsChanged, LlmConfig, LlmConfigsChanged,
    LlmEnabledChanged, Theme, ThemeChanged,
};
use crate::bus::{EventBus, SurfaceEvent};
use crate::vault::{Vault, VaultError, ACTIONS_KEY, LLM_CONFIGS_KEY, THEME_KEY};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0}")]
    Vault(#[from] VaultError),
    #[error("invalid {key} in vault: {reason}")]
    Invalid { key: String, reason: String },
    #[error("vault rejected write to {0}")]
    Rejected(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Quick actions offered until the user configures their own.
pub fn default_actions() -> Vec<ActionConfig> {
    [
        ("fix-grammar", "Fix Grammar", "Fix the grammar and spelling in the following text:"),
        ("improve-writing", "Improve Writing", "Improve the writing quality of the following text:"),
        ("summarize", "Summarize", "Summarize the following text:"),
        ("translate", "Translate", "Translate the following text to English:"),
        ("simplify", "Simplify", "Simplify the following text:"),
        ("make-longer", "Make Longer", "Expand and make the following text longer:"),
        ("make-shorter", "Make Shorter", "Make the following text more concise:"),
        ("convert-to-code", "Convert to Code", "Convert the following to code:"),
        ("explain-code", "Explain Code", "Explain what this code does:"),
    ]
    .into_iter()
    .map(|(id, label, prompt)| ActionConfig {
        id: id.to_string(),
        label: label.to_string(),
        prompt: prompt.to_string(),
        enabled: true,
    })
    .collect()
}

pub struct SettingsStore {
    vault: Arc<dyn Vault>,
    bus: Arc<EventBus>,
}

impl SettingsStore {
    pub fn new(vault: Arc<dyn Vault>, bus: Arc<EventBus>) -> Self {
        Self { vault, bus }
    }

    // -----------------------------------------------------------------------
    // LLM configurations
    // -----------------------------------------------------------------------

    pub async fn load_llm_configs(&self) -> Result<Vec<LlmConfig>, SettingsError> {
        let configs: Option<Vec<LlmConfig>> = self.read_json(LLM_CONFIGS_KEY).await?;
        let configs = configs.unwrap_or_default();
        tracing::debug!("loaded {} LLM configs from vault", configs.len());
        Ok(configs)
    }

    pub async fn has_llm_configs(&self) -> Result<bool, SettingsError> {
        Ok(self.vault.has(LLM_CONFIGS_KEY).await?)
    }

    pub async fn save_llm_configs(&self, configs: Vec<LlmConfig>) -> Result<(), SettingsError> {
        self.write_json(LLM_CONFIGS_KEY, &configs).await?;
        self.announce(SurfaceEvent::LlmConfigsChanged(LlmConfigsChanged { configs }))
            .await;
        Ok(())
    }

    pub async fn delete_llm_configs(&self) -> Result<bool, SettingsError> {
        let deleted = self.vault.delete(LLM_CONFIGS_KEY).await?;
        if deleted {
            self.announce(SurfaceEvent::LlmConfigsChanged(LlmConfigsChanged {
                configs: Vec::new(),
            }))
            .await;
        }
        Ok(deleted)
    }

    /// Store `configs` only if the vault has none yet. Returns whether it wrote.
    pub async fn seed_llm_configs(&self, configs: Vec<LlmConfig>) -> Result<bool, SettingsError> {
        if configs.is_empty() || self.has_llm_configs().await? {
            return Ok(false);
        }
        tracing::info!("seeding {} LLM configs into vault", configs.len());
        self.save_llm_configs(configs).await?;
        Ok(true)
    }

    pub async fn set_llm_enabled(&self, llm_id: &str, enabled: bool) -> Result<(), SettingsError> {
        let mut configs = self.load_llm_configs().await?;
        let config = configs
            .iter_mut()
            .find(|config| config.id == llm_id)
            .ok_or_else(|| SettingsError::NotFound(format!("LLM config {llm_id}")))?;
        config.enabled = enabled;

        self.write_json(LLM_CONFIGS_KEY, &configs).await?;
        self.announce(SurfaceEvent::LlmEnabledChanged(LlmEnabledChanged {
            llm_id: llm_id.to_string(),
            enabled,
        }))
        .await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Configured actions, or the defaults (persisted on first load).
    pub async fn load_actions(&self) -> Result<Vec<ActionConfig>, SettingsError> {
        if let Some(actions) = self.read_json::<Vec<ActionConfig>>(ACTIONS_KEY).await? {
            return Ok(actions);
        }

        let defaults = default_actions();
        tracing::info!("no actions in vault, saving {} defaults", defaults.len());
        self.write_json(ACTIONS_KEY, &defaults).await?;
        Ok(defaults)
    }

    pub async fn save_actions(&self, actions: Vec<ActionConfig>) -> Result<(), SettingsError> {
        self.write_json(ACTIONS_KEY, &actions).await?;
        self.announce(SurfaceEvent::ActionsChanged(ActionsChanged { actions }))
            .await;
        Ok(())
    }

    pub async fn set_action_enabled(
        &self,
        action_id: &str,
        enabled: bool,
    ) -> Result<(), SettingsError> {
        let mut actions = self.load_actions().await?;
        let action = actions
            .iter_mut()
            .find(|action| action.id == action_id)
            .ok_or_else(|| SettingsError::NotFound(format!("action {action_id}")))?;
        action.enabled = enabled;

        self.write_json(ACTIONS_KEY, &actions).await?;
        self.announce(SurfaceEvent::ActionEnabledChanged(ActionEnabledChanged {
            action_id: action_id.to_string(),
            enabled,
        }))
        .await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Theme
    // -----------------------------------------------------------------------

    pub async fn load_theme(&self) -> Result<Theme, SettingsError> {
        Ok(self.read_json(THEME_KEY).await?.unwrap_or_default())
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), SettingsError> {
        self.write_json(THEME_KEY, &theme).await?;
        self.announce(SurfaceEvent::ThemeChanged(ThemeChanged { theme }))
            .await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SettingsError> {
        let Some(raw) = self.vault.get(key).await? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SettingsError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), SettingsError> {
        let raw = serde_json::to_string(value).map_err(|e| SettingsError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        if !self.vault.set(key, &raw).await? {
            return Err(SettingsError::Rejected(key.to_string()));
        }
        tracing::debug!("saved {key} to vault");
        Ok(())
    }

    async fn announce(&self, event: SurfaceEvent) {
        self.bus.trigger_to_other_webview(&event).await;
    }
}
