//! Process configuration resolved from the environment.

use std::path::PathBuf;

use crate::bus::DEFAULT_PENDING_CAPACITY;

const DATA_DIR_ENV: &str = "BYOA_DATA_DIR";
const LOG_ENV: &str = "BYOA_LOG";
const PENDING_CAPACITY_ENV: &str = "BYOA_PENDING_EVENT_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_filter: Option<String>,
    pub pending_event_capacity: usize,
}

impl AppConfig {
    /// Load `.env` if present, then read `BYOA_*` variables.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("failed to load .env: {e}");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = non_empty(lookup(DATA_DIR_ENV))
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&lookup));

        let pending_event_capacity = match non_empty(lookup(PENDING_CAPACITY_ENV)) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("invalid {PENDING_CAPACITY_ENV}={raw}: {e}");
                DEFAULT_PENDING_CAPACITY
            }),
            None => DEFAULT_PENDING_CAPACITY,
        };

        Self {
            data_dir,
            log_filter: non_empty(lookup(LOG_ENV)),
            pending_event_capacity,
        }
    }

    /// The vault file shared by every surface.
    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join("vault.db")
    }

    pub fn ensure_data_dir(&self) -> Result<(), String> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            format!(
                "failed to create app data directory {}: {e}",
                self.data_dir.display()
            )
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_data_dir(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(app_data) = non_empty(lookup("APPDATA")) {
            return PathBuf::from(app_data).join("BYOA");
        }
    }

    if let Some(home) = non_empty(lookup("HOME")) {
        return PathBuf::from(home).join(".byoa");
    }

    if let Some(home) = non_empty(lookup("USERPROFILE")) {
        return PathBuf::from(home).join(".byoa");
    }

    PathBuf::from(".byoa")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_data_dir_wins() {
        let config = AppConfig::from_lookup(lookup(&[
            ("BYOA_DATA_DIR", "/tmp/byoa-data"),
            ("HOME", "/home/someone"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/byoa-data"));
        assert_eq!(config.vault_path(), PathBuf::from("/tmp/byoa-data/vault.db"));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn falls_back_to_home() {
        let config = AppConfig::from_lookup(lookup(&[("HOME", "/home/someone")]));
        assert_eq!(config.data_dir, PathBuf::from("/home/someone/.byoa"));
        assert_eq!(config.log_filter, None);
    }

    #[test]
    fn bad_capacity_uses_default() {
        let config = AppConfig::from_lookup(lookup(&[
            ("BYOA_PENDING_EVENT_CAPACITY", "lots"),
            ("BYOA_LOG", "byoa=trace"),
        ]));
        assert_eq!(config.pending_event_capacity, DEFAULT_PENDING_CAPACITY);
        assert_eq!(config.log_filter.as_deref(), Some("byoa=trace"));
    }
}
