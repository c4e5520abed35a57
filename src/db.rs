use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Debug, Clone)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// Flat key-value table backing the progress and settings stores.
pub struct KvStore {
    conn: Connection,
}

impl KvStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    pub fn list_prefix(&self, prefix: &str) -> Result<Vec<KvEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value, updated_at FROM kv_store WHERE key LIKE ?1 || '%' ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(params![prefix], |row| {
            Ok(KvEntry {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_overwrites_existing_value() {
        let store = KvStore::open_in_memory().expect("open store");
        store.put("currentEpisode-abc", "first").expect("put");
        store.put("currentEpisode-abc", "second").expect("put again");
        assert_eq!(
            store.get("currentEpisode-abc").expect("get"),
            Some("second".to_string())
        );
    }

    #[test]
    fn get_returns_none_for_missing_key() {
        let store = KvStore::open_in_memory().expect("open store");
        assert_eq!(store.get("currentEpisode-missing").expect("get"), None);
    }

    #[test]
    fn list_prefix_filters_other_namespaces() {
        let store = KvStore::open_in_memory().expect("open store");
        store.put("currentEpisode-a", "{}").expect("put");
        store.put("currentEpisode-b", "{}").expect("put");
        store.put("skipDelay-a", "30").expect("put");

        let entries = store.list_prefix("currentEpisode-").expect("list");
        assert_eq!(entries.len(), 2);
        assert!(
            entries
                .iter()
                .all(|entry| entry.key.starts_with("currentEpisode-"))
        );
    }

    #[test]
    fn remove_reports_whether_a_row_existed() {
        let store = KvStore::open_in_memory().expect("open store");
        store.put("currentEpisode-a", "{}").expect("put");
        assert!(store.remove("currentEpisode-a").expect("remove"));
        assert!(!store.remove("currentEpisode-a").expect("remove again"));
    }
}
