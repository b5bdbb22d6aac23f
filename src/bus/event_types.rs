//! Event names and typed payloads exchanged between surfaces.
//!
//! Single source of truth for the event catalogue. The payload shape is
//! determined by the event name alone; anything the catalogue does not know
//! (or cannot type) travels as [`SurfaceEvent::Opaque`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub const EVENT_THEME_CHANGED: &str = "settings:theme-changed";
pub const EVENT_LLM_CONFIGS_CHANGED: &str = "settings:llm-configs-changed";
pub const EVENT_ACTIONS_CHANGED: &str = "settings:actions-changed";
pub const EVENT_LLM_ENABLED_CHANGED: &str = "settings:llm-enabled-changed";
pub const EVENT_ACTION_ENABLED_CHANGED: &str = "settings:action-enabled-changed";
pub const EVENT_REQUEST_REFRESH: &str = "assistant:request-refresh";
pub const EVENT_CLIPBOARD_CHANGED: &str = "assistant:clipboard-changed";

/// Closed set of event kinds the surfaces agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ThemeChanged,
    LlmConfigsChanged,
    ActionsChanged,
    LlmEnabledChanged,
    ActionEnabledChanged,
    RequestRefresh,
    ClipboardChanged,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ThemeChanged => EVENT_THEME_CHANGED,
            Self::LlmConfigsChanged => EVENT_LLM_CONFIGS_CHANGED,
            Self::ActionsChanged => EVENT_ACTIONS_CHANGED,
            Self::LlmEnabledChanged => EVENT_LLM_ENABLED_CHANGED,
            Self::ActionEnabledChanged => EVENT_ACTION_ENABLED_CHANGED,
            Self::RequestRefresh => EVENT_REQUEST_REFRESH,
            Self::ClipboardChanged => EVENT_CLIPBOARD_CHANGED,
        }
    }

    pub const fn all() -> &'static [EventKind] {
        &[
            EventKind::ThemeChanged,
            EventKind::LlmConfigsChanged,
            EventKind::ActionsChanged,
            EventKind::LlmEnabledChanged,
            EventKind::ActionEnabledChanged,
            EventKind::RequestRefresh,
            EventKind::ClipboardChanged,
        ]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.as_str() == name)
    }
}

impl AsRef<str> for EventKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Shared settings shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
    Orange,
    Skyblue,
    Lightgreen,
    HighContrastLight,
    HighContrastDark,
}

impl Theme {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Orange => "orange",
            Self::Skyblue => "skyblue",
            Self::Lightgreen => "lightgreen",
            Self::HighContrastLight => "high-contrast-light",
            Self::HighContrastDark => "high-contrast-dark",
        }
    }
}

/// One configured LLM endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    pub id: String,
    pub name: String,
    pub model_name: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub api_key: String,
    pub enabled: bool,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("api_key", &crate::logging::redact(&self.api_key))
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// One configured quick action shown on the popup surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    pub id: String,
    pub label: String,
    pub prompt: String,
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeChanged {
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfigsChanged {
    pub configs: Vec<LlmConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionsChanged {
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmEnabledChanged {
    pub llm_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEnabledChanged {
    pub action_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRefresh {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardChanged {
    pub content: String,
}

/// Payload that could not be typed against the catalogue.
#[derive(Debug, Clone, PartialEq)]
pub enum OpaquePayload {
    /// Valid JSON that does not match the named event's shape (or an unknown name).
    Json(Value),
    /// The transport delivered a quoted string; this is its unquoted content.
    Value(String),
    /// Nothing could be decoded; the raw text as received.
    Raw(String),
}

impl OpaquePayload {
    /// Wire form, mirroring how the surfaces wrap undecodable payloads.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Value(value) => serde_json::json!({ "value": value }),
            Self::Raw(raw) => serde_json::json!({ "rawData": raw }),
        }
    }
}

/// An event as seen by local subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    ThemeChanged(ThemeChanged),
    LlmConfigsChanged(LlmConfigsChanged),
    ActionsChanged(ActionsChanged),
    LlmEnabledChanged(LlmEnabledChanged),
    ActionEnabledChanged(ActionEnabledChanged),
    RequestRefresh(RequestRefresh),
    ClipboardChanged(ClipboardChanged),
    Opaque { name: String, payload: OpaquePayload },
}

impl SurfaceEvent {
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::ThemeChanged(_) => Some(EventKind::ThemeChanged),
            Self::LlmConfigsChanged(_) => Some(EventKind::LlmConfigsChanged),
            Self::ActionsChanged(_) => Some(EventKind::ActionsChanged),
            Self::LlmEnabledChanged(_) => Some(EventKind::LlmEnabledChanged),
            Self::ActionEnabledChanged(_) => Some(EventKind::ActionEnabledChanged),
            Self::RequestRefresh(_) => Some(EventKind::RequestRefresh),
            Self::ClipboardChanged(_) => Some(EventKind::ClipboardChanged),
            Self::Opaque { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Opaque { name, .. } => name,
            other => other.kind().map(|kind| kind.as_str()).unwrap_or_default(),
        }
    }

    /// Serialize only the payload; the name travels alongside it.
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::ThemeChanged(p) => serde_json::to_string(p),
            Self::LlmConfigsChanged(p) => serde_json::to_string(p),
            Self::ActionsChanged(p) => serde_json::to_string(p),
            Self::LlmEnabledChanged(p) => serde_json::to_string(p),
            Self::ActionEnabledChanged(p) => serde_json::to_string(p),
            Self::RequestRefresh(p) => serde_json::to_string(p),
            Self::ClipboardChanged(p) => serde_json::to_string(p),
            Self::Opaque { payload, .. } => serde_json::to_string(&payload.to_json()),
        }
    }

    /// Type a decoded JSON value against the catalogue entry for `name`.
    ///
    /// Unknown names, and values that do not fit the named payload, become
    /// [`SurfaceEvent::Opaque`] so they still reach subscribers.
    pub fn from_json(name: &str, value: Value) -> Self {
        let Some(kind) = EventKind::from_name(name) else {
            return Self::opaque(name, OpaquePayload::Json(value));
        };

        let typed = match kind {
            EventKind::ThemeChanged => serde_json::from_value(value.clone()).map(Self::ThemeChanged),
            EventKind::LlmConfigsChanged => {
                serde_json::from_value(value.clone()).map(Self::LlmConfigsChanged)
            }
            EventKind::ActionsChanged => {
                serde_json::from_value(value.clone()).map(Self::ActionsChanged)
            }
            EventKind::LlmEnabledChanged => {
                serde_json::from_value(value.clone()).map(Self::LlmEnabledChanged)
            }
            EventKind::ActionEnabledChanged => {
                serde_json::from_value(value.clone()).map(Self::ActionEnabledChanged)
            }
            EventKind::RequestRefresh => {
                serde_json::from_value(value.clone()).map(Self::RequestRefresh)
            }
            EventKind::ClipboardChanged => {
                serde_json::from_value(value.clone()).map(Self::ClipboardChanged)
            }
        };

        match typed {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!("payload for {name} does not match its schema: {e}");
                Self::opaque(name, OpaquePayload::Json(value))
            }
        }
    }

    pub fn opaque(name: impl Into<String>, payload: OpaquePayload) -> Self {
        Self::Opaque {
            name: name.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn catalogue_names_round_trip() {
        for kind in EventKind::all() {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(*kind));
        }
        assert_eq!(EventKind::from_name("settings:unknown"), None);
    }

    #[test]
    fn enabled_payloads_use_camel_case_on_the_wire() {
        let event = SurfaceEvent::LlmEnabledChanged(LlmEnabledChanged {
            llm_id: "gpt".to_string(),
            enabled: false,
        });
        assert_eq!(
            event.payload_json().unwrap(),
            r#"{"llmId":"gpt","enabled":false}"#
        );
    }

    #[test]
    fn llm_config_keeps_surface_field_names() {
        let value = json!({
            "id": "local",
            "name": "Local",
            "modelName": "llama3",
            "baseURL": "http://localhost:11434/v1",
            "apiKey": "sk-test",
            "enabled": true
        });
        let config: LlmConfig = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(serde_json::to_value(&config).unwrap(), value);
    }

    #[test]
    fn llm_config_debug_hides_api_key() {
        let config = LlmConfig {
            id: "a".to_string(),
            name: "A".to_string(),
            model_name: "m".to_string(),
            base_url: "http://x".to_string(),
            api_key: "sk-secret-value".to_string(),
            enabled: true,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret-value"));
        assert!(rendered.contains("****"));
    }

    #[test]
    fn mismatched_payload_becomes_opaque_json() {
        let event = SurfaceEvent::from_json(EVENT_THEME_CHANGED, json!({ "theme": 42 }));
        assert_eq!(
            event,
            SurfaceEvent::opaque(EVENT_THEME_CHANGED, OpaquePayload::Json(json!({ "theme": 42 })))
        );
        assert_eq!(event.name(), EVENT_THEME_CHANGED);
    }

    #[test]
    fn theme_names_match_surface_values() {
        let theme: Theme = serde_json::from_value(json!("high-contrast-dark")).unwrap();
        assert_eq!(theme, Theme::HighContrastDark);
        assert_eq!(theme.as_str(), "high-contrast-dark");
    }
}
