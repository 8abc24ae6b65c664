// Key/value access to the app_state table present in every namespace
// Keys are dotted ("settings.url_debounce_ms"); the prefix groups related keys

use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

use super::database::{DatabaseManager, StorageResult};

const UPSERT_STATE: &str = r#"
    INSERT INTO app_state (key, value, updated_at)
    VALUES (?1, ?2, datetime('now'))
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = datetime('now')
"#;

impl DatabaseManager {
    pub fn get_state(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row("SELECT value FROM app_state WHERE key = ?1", params![key], |row| row.get(0))
                .optional()
        })
    }

    pub fn set_state(&self, key: &str, value: &str) -> StorageResult<()> {
        self.set_states(&[(key, value.to_string())])
    }

    /// Upsert several keys in one transaction
    pub fn set_states(&self, entries: &[(&str, String)]) -> StorageResult<()> {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(UPSERT_STATE)?;
                for (key, value) in entries {
                    stmt.execute(params![key, value])?;
                }
            }
            tx.commit()
        })
    }

    /// Insert only the keys not yet present; returns how many were written
    pub fn set_states_if_absent(&self, entries: &[(&str, String)]) -> StorageResult<usize> {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO app_state (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
                )?;
                for (key, value) in entries {
                    written += stmt.execute(params![key, value])?;
                }
            }
            tx.commit()?;
            Ok(written)
        })
    }

    /// Every key starting with `prefix`, with its value
    pub fn get_states_with_prefix(&self, prefix: &str) -> StorageResult<HashMap<String, String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM app_state WHERE substr(key, 1, length(?1)) = ?1")?;
            let rows = stmt
                .query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<HashMap<String, String>>>()?;
            Ok(rows)
        })
    }

    /// Returns the number of keys removed
    pub fn delete_states_with_prefix(&self, prefix: &str) -> StorageResult<usize> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM app_state WHERE substr(key, 1, length(?1)) = ?1",
                params![prefix],
            )
        })
    }
}
