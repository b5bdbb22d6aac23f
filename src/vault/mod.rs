//! Shared key/value persistence used to make relayed events authoritative.
//!
//! Every surface reads the same vault; a received settings event is a hint to
//! re-read the matching key, never the data itself.

mod sqlite;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

pub use sqlite::SqliteVault;

pub const LLM_CONFIGS_KEY: &str = "llm_configs";
pub const ACTIONS_KEY: &str = "actions";
pub const THEME_KEY: &str = "theme";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("schema upgrade failed: {0}")]
    Migration(String),
}

/// The persistence collaborator. Single-key operations only; each one is
/// atomic on its own and there are no cross-key transactions.
#[async_trait]
pub trait Vault: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultError>;
    async fn set(&self, key: &str, value: &str) -> Result<bool, VaultError>;
    async fn has(&self, key: &str) -> Result<bool, VaultError>;
    async fn delete(&self, key: &str) -> Result<bool, VaultError>;
}

/// In-process vault for tests and for running without a data directory.
#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().expect("memory vault mutex poisoned")
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool, VaultError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn has(&self, key: &str) -> Result<bool, VaultError> {
        Ok(self.entries().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, VaultError> {
        Ok(self.entries().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_vault_round_trip() {
        let vault = MemoryVault::new();
        assert_eq!(vault.get("k").await.unwrap(), None);
        assert!(!vault.has("k").await.unwrap());

        assert!(vault.set("k", "v1").await.unwrap());
        assert!(vault.set("k", "v2").await.unwrap());
        assert_eq!(vault.get("k").await.unwrap().as_deref(), Some("v2"));

        assert!(vault.delete("k").await.unwrap());
        assert!(!vault.delete("k").await.unwrap());
        assert!(!vault.has("k").await.unwrap());
    }
}
