//! The popup's action workflow over the interaction history.
//!
//! An action moves the top entry into progress, invokes the configured LLMs
//! and either commits the answer as a new entry or reverts the top to rest.
//! Undo, retry and copy are only offered while at rest with something to go
//! back to.


use std::sync::{Arc, Mutex};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::bus::event_types::{ClipboardChanged, LlmConfig};
use crate::bus::{EventBus, SurfaceEvent};
use crate::clipboard::Clipboard;
use crate::history::{
    ActionRequest, ChangeSubscription, ContentItem, HistoryChange, HistoryEntry, InteractionHistory,
};
use crate::llm::{LlmClient, LlmError};
use crate::settings::sync::SettingsSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("no content to act on")]
    NothingToActOn,
    #[error("an action is already in progress")]
    Busy,
    #[error("no enabled LLM configured")]
    NoEnabledLlm,
    #[error("LLM {llm_id} failed: {source}")]
    Llm {
        llm_id: String,
        #[source]
        source: LlmError,
    },
    #[error("clipboard write failed")]
    ClipboardWrite,
}

/// Which configured LLMs an action is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmSelection {
    /// The first enabled configuration.
    #[default]
    Auto,
    /// Every enabled configuration, answers side by side.
    All,
    /// A specific configuration, falling back to the first enabled one.
    #[serde(untagged)]
    Id(String),
}

impl From<&str> for LlmSelection {
    fn from(value: &str) -> Self {
        match value {
            "auto" => Self::Auto,
            "all" => Self::All,
            id => Self::Id(id.to_string()),
        }
    }
}

impl LlmSelection {
    pub fn pick<'a>(&self, configs: &'a [LlmConfig]) -> Vec<&'a LlmConfig> {
        let mut enabled = configs.iter().filter(|config| config.enabled);
        match self {
            Self::All => enabled.collect(),
            Self::Auto => enabled.next().into_iter().collect(),
            Self::Id(id) => {
                let enabled: Vec<&LlmConfig> = enabled.collect();
                let chosen = enabled
                    .iter()
                    .find(|config| &config.id == id)
                    .or_else(|| enabled.first())
                    .copied();
                chosen.into_iter().collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmAnswer {
    pub llm_id: String,
    pub llm_name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The answers were stacked as a new at-rest entry.
    Committed(Vec<LlmAnswer>),
    /// The history moved on while the LLM was working; the answers were dropped.
    Discarded,
}

/// What the popup should show for the current top of the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowView {
    Empty,
    /// Content at rest. Undo, retry and copy are offered when `can_navigate`.
    Preview {
        content: Vec<ContentItem>,
        can_navigate: bool,
    },
    InProgress {
        action: ActionRequest,
        content: Vec<ContentItem>,
    },
}

impl WorkflowView {
    pub fn from_change(change: &HistoryChange) -> Self {
        let Some(top) = &change.top else {
            return Self::Empty;
        };
        if top.content.is_empty() {
            return Self::Empty;
        }
        match &top.action {
            Some(action) => Self::InProgress {
                action: action.clone(),
                content: top.content.clone(),
            },
            None => Self::Preview {
                content: top.content.clone(),
                can_navigate: change.size >= 2,
            },
        }
    }
}

pub struct WorkflowController {
    history: InteractionHistory,
    settings: watch::Receiver<SettingsSnapshot>,
    llm: Arc<dyn LlmClient>,
    clipboard: Arc<dyn Clipboard>,
    bus: Arc<EventBus>,
    selection: Mutex<LlmSelection>,
}

impl WorkflowController {
    pub fn new(
        history: InteractionHistory,
        settings: watch::Receiver<SettingsSnapshot>,
        llm: Arc<dyn LlmClient>,
        clipboard: Arc<dyn Clipboard>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            history,
            settings,
            llm,
            clipboard,
            bus,
            selection: Mutex::new(LlmSelection::default()),
        }
    }

    pub fn history(&self) -> &InteractionHistory {
        &self.history
    }

    pub fn selection(&self) -> LlmSelection {
        self.selection.lock().expect("selection mutex poisoned").clone()
    }

    pub fn set_selection(&self, selection: LlmSelection) {
        tracing::debug!(?selection, "LLM selection changed");
        *self.selection.lock().expect("selection mutex poisoned") = selection;
    }

    /// Follow the history and report the view it implies, once per burst of
    /// changes.
    pub fn on_view_change<F>(&self, listener: F) -> ChangeSubscription
    where
        F: Fn(&WorkflowView) + Send + Sync + 'static,
    {
        self.history
            .on_change(move |change| listener(&WorkflowView::from_change(change)))
    }

    /// Start over from the clipboard. Returns whether anything was read.
    pub async fn on_surface_shown(&self) -> bool {
        self.history.clear();
        match self.clipboard.read().await {
            Some(content) => {
                self.history.push(None, content);
                true
            }
            None => {
                tracing::debug!("surface shown with empty clipboard");
                false
            }
        }
    }

    pub fn on_surface_hidden(&self) {
        self.history.clear();
    }

    /// Put the top entry into progress for `action`. Returns the entry as it
    /// now sits on top.
    pub fn start_action(&self, action: ActionRequest) -> Result<HistoryEntry, WorkflowError> {
        let top = self.history.top().ok_or(WorkflowError::NothingToActOn)?;
        if top.is_in_progress() {
            return Err(WorkflowError::Busy);
        }
        if top.content.is_empty() {
            return Err(WorkflowError::NothingToActOn);
        }

        tracing::info!(action = %action.id, "starting action");
        self.history.replace(Some(action), top.content);
        self.history.top().ok_or(WorkflowError::NothingToActOn)
    }

    pub async fn run_action(&self, action: ActionRequest) -> Result<RunOutcome, WorkflowError> {
        let started = self.start_action(action)?;
        let Some(action) = started.action.clone() else {
            return Err(WorkflowError::NothingToActOn);
        };

        let (prompt, targets) = {
            let snapshot = self.settings.borrow();
            let prompt = build_prompt(&action, &text_of(&started.content), &snapshot);
            let targets: Vec<LlmConfig> = self
                .selection()
                .pick(&snapshot.llm_configs)
                .into_iter()
                .cloned()
                .collect();
            (prompt, targets)
        };

        if targets.is_empty() {
            self.revert(&started);
            return Err(WorkflowError::NoEnabledLlm);
        }

        let llm = &self.llm;
        let prompt = prompt.as_str();
        let calls = targets.iter().map(|config| async move {
            let result = llm
                .invoke(&config.base_url, &config.model_name, &config.api_key, prompt)
                .await;
            (config, result)
        });
        let results = join_all(calls).await;

        let mut answers = Vec::new();
        let mut first_error = None;
        for (config, result) in results {
            match result {
                Ok(text) => answers.push(LlmAnswer {
                    llm_id: config.id.clone(),
                    llm_name: config.name.clone(),
                    text,
                }),
                Err(source) => {
                    tracing::warn!(llm = %config.id, "LLM call failed: {source}");
                    if first_error.is_none() {
                        first_error = Some(WorkflowError::Llm {
                            llm_id: config.id.clone(),
                            source,
                        });
                    }
                }
            }
        }

        if !self.still_current(&started) {
            tracing::info!(action = %action.id, "history moved on, discarding result");
            return Ok(RunOutcome::Discarded);
        }

        if answers.is_empty() {
            self.revert(&started);
            return Err(first_error.unwrap_or(WorkflowError::NoEnabledLlm));
        }

        let content = answers
            .iter()
            .map(|answer| ContentItem::text(answer.text.clone()))
            .collect();
        self.history.push(None, content);
        tracing::info!(action = %action.id, answers = answers.len(), "action committed");
        Ok(RunOutcome::Committed(answers))
    }

    /// Go back one step. Ignored while busy or with nothing to go back to.
    pub fn undo(&self) -> bool {
        if !self.navigable() {
            return false;
        }
        self.history.pop();
        match self.history.top() {
            Some(top) => self.history.replace(None, top.content),
            None => false,
        }
    }

    /// Drop the latest answer so the action can be run again.
    pub fn retry(&self) -> bool {
        if !self.navigable() {
            return false;
        }
        self.history.pop().is_some()
    }

    /// Write the top entry's content to the clipboard.
    pub async fn copy(&self) -> Result<bool, WorkflowError> {
        if !self.navigable() {
            return Ok(false);
        }
        let Some(top) = self.history.top() else {
            return Ok(false);
        };
        if !self.clipboard.write(&top.content).await {
            return Err(WorkflowError::ClipboardWrite);
        }
        Ok(true)
    }

    /// Tell the other surfaces the clipboard now holds `content`.
    pub async fn publish_clipboard(&self, content: impl Into<String>) {
        let event = SurfaceEvent::ClipboardChanged(ClipboardChanged {
            content: content.into(),
        });
        self.bus.trigger_to_other_webview(&event).await;
    }

    fn navigable(&self) -> bool {
        self.history.can_navigate() && !self.history.is_in_progress()
    }

    fn still_current(&self, started: &HistoryEntry) -> bool {
        self.history.top().is_some_and(|top| {
            top.is_in_progress() && top.action == started.action && top.timestamp == started.timestamp
        })
    }

    fn revert(&self, started: &HistoryEntry) {
        if self.still_current(started) {
            self.history.replace(None, started.content.clone());
        }
    }
}

fn text_of(content: &[ContentItem]) -> String {
    content
        .iter()
        .filter_map(ContentItem::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for `action` applied to `text`: the configured action prompt, else
/// the free-form context, else `"<id>: <text>"`.
pub fn build_prompt(action: &ActionRequest, text: &str, settings: &SettingsSnapshot) -> String {
    if let Some(configured) = settings.action(&action.id) {
        return format!("{}\n\n{text}", configured.prompt);
    }
    if !action.context.trim().is_empty() {
        return format!("{}\n\n{text}", action.context.trim());
    }
    format!("{}: {text}", action.id.to_lowercase())
}
