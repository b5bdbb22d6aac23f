use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{Vault, VaultError};

/// Schema version recorded in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS vault_entries (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
"#;

/// Vault backed by a SQLite file shared by every surface.
pub struct SqliteVault {
    conn: Mutex<Connection>,
}

impl SqliteVault {
    /// Open (or create) a vault file at `path`, enable WAL mode, and bring the
    /// schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory vault.
    pub fn open_in_memory() -> Result<Self, VaultError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, VaultError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(VaultError::Migration(format!(
                "vault schema v{version} is newer than supported v{SCHEMA_VERSION}"
            )));
        }
        if version < SCHEMA_VERSION {
            tracing::info!("upgrading vault schema v{version} -> v{SCHEMA_VERSION}");
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(SCHEMA)
                .map_err(|e| VaultError::Migration(format!("v{SCHEMA_VERSION}: {e}")))?;
            tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tx.commit()?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("vault mutex poisoned")
    }

    fn read(&self, key: &str) -> Result<Option<String>, VaultError> {
        let conn = self.conn();
        let value = conn
            .query_row(
                "SELECT value FROM vault_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<bool, VaultError> {
        let conn = self.conn();
        let changed = conn.execute(
            "INSERT INTO vault_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    fn remove(&self, key: &str) -> Result<bool, VaultError> {
        let conn = self.conn();
        let changed = conn.execute("DELETE FROM vault_entries WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }
}

#[async_trait]
impl Vault for SqliteVault {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultError> {
        self.read(key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool, VaultError> {
        self.write(key, value)
    }

    async fn has(&self, key: &str) -> Result<bool, VaultError> {
        Ok(self.read(key)?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, VaultError> {
        self.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_vault_round_trip() {
        let vault = SqliteVault::open_in_memory().expect("in-memory vault");
        assert_eq!(vault.get("llm_configs").await.unwrap(), None);

        assert!(vault.set("llm_configs", "[]").await.unwrap());
        assert!(vault.set("llm_configs", "[{}]").await.unwrap());
        assert_eq!(vault.get("llm_configs").await.unwrap().as_deref(), Some("[{}]"));
        assert!(vault.has("llm_configs").await.unwrap());

        assert!(vault.delete("llm_configs").await.unwrap());
        assert!(!vault.delete("llm_configs").await.unwrap());
    }

    #[tokio::test]
    async fn two_handles_share_one_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vault.db");

        let settings_side = SqliteVault::open(&path).expect("open vault");
        let popup_side = SqliteVault::open(&path).expect("reopen vault");

        settings_side.set("theme", "\"dark\"").await.unwrap();
        assert_eq!(popup_side.get("theme").await.unwrap().as_deref(), Some("\"dark\""));
    }

    #[tokio::test]
    async fn reopen_keeps_schema_version_and_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vault.db");

        SqliteVault::open(&path)
            .expect("open vault")
            .set("theme", "\"light\"")
            .await
            .unwrap();

        let reopened = SqliteVault::open(&path).expect("reopen vault");
        let version: i64 = reopened
            .conn()
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        assert_eq!(reopened.get("theme").await.unwrap().as_deref(), Some("\"light\""));
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vault.db");
        Connection::open(&path)
            .unwrap()
            .pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();

        assert!(matches!(
            SqliteVault::open(&path),
            Err(VaultError::Migration(_))
        ));
    }
}
