// Per-tool history log
// Append-only entries with bounded retention (per tool and global)

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::database::{DatabaseManager, StorageResult};
use super::now_millis;

/// One recorded input/output event for a tool. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub tool_id: String,
    pub tool_name: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Input for recording a new history entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    pub tool_id: String,
    pub tool_name: String,
    pub input: String,
    pub output: Option<String>,
    pub metadata: Option<Value>,
    /// Defaults to now
    pub timestamp: Option<i64>,
}

/// Retention caps applied after every insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLimits {
    pub per_tool: usize,
    pub global: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self { per_tool: 50, global: 500 }
    }
}

impl HistoryLimits {
    /// Both caps raised to at least 1 so a fresh insert always survives its own prune
    pub fn normalized(self) -> Self {
        Self {
            per_tool: self.per_tool.max(1),
            global: self.global.max(1),
        }
    }
}

/// SQLite reads a negative OFFSET as 0, so counts saturate instead of wrapping
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

const ENTRY_COLUMNS: &str = "id, tool_id, tool_name, timestamp, input, output, metadata";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let metadata: Option<String> = row.get(6)?;
    Ok(HistoryEntry {
        id: row.get(0)?,
        tool_id: row.get(1)?,
        tool_name: row.get(2)?,
        timestamp: row.get(3)?,
        input: row.get(4)?,
        output: row.get(5)?,
        // Unreadable metadata is dropped rather than failing the whole read
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
    })
}

/// History service over the history namespace
#[derive(Clone)]
pub struct HistoryStore {
    db: Arc<DatabaseManager>,
    limits: HistoryLimits,
}

impl HistoryStore {
    pub fn new(db: Arc<DatabaseManager>, limits: HistoryLimits) -> Self {
        Self {
            db,
            limits: limits.normalized(),
        }
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: HistoryLimits) {
        self.limits = limits.normalized();
    }

    pub fn database(&self) -> &Arc<DatabaseManager> {
        &self.db
    }

    /// Record an entry, then prune per-tool and global overflow.
    ///
    /// Insert and each prune pass commit separately; a failing prune is
    /// logged and leaves the insert in place.
    pub fn add_entry(&self, entry: NewHistoryEntry) -> StorageResult<HistoryEntry> {
        let timestamp = entry.timestamp.unwrap_or_else(now_millis);
        let metadata = entry.metadata.as_ref().map(serde_json::to_string).transpose()?;

        let id = self.db.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO history (tool_id, tool_name, timestamp, input, output, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &entry.tool_id,
                    &entry.tool_name,
                    timestamp,
                    &entry.input,
                    &entry.output,
                    &metadata,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })?;

        match self.prune_tool(&entry.tool_id, self.limits.per_tool) {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(tool_id = %entry.tool_id, removed, "pruned tool history"),
            Err(e) => tracing::warn!(tool_id = %entry.tool_id, error = %e, "tool history prune failed"),
        }
        match self.prune_global(self.limits.global) {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "pruned global history"),
            Err(e) => tracing::warn!(error = %e, "global history prune failed"),
        }

        Ok(HistoryEntry {
            id,
            tool_id: entry.tool_id,
            tool_name: entry.tool_name,
            timestamp,
            input: entry.input,
            output: entry.output,
            metadata: entry.metadata,
        })
    }

    /// Keep the newest `keep` entries for a tool; returns rows deleted
    pub fn prune_tool(&self, tool_id: &str, keep: usize) -> StorageResult<usize> {
        self.db.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            let stale: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM history WHERE tool_id = ?1
                     ORDER BY timestamp DESC, id DESC LIMIT -1 OFFSET ?2",
                )?;
                let ids = stmt
                    .query_map(params![tool_id, sql_count(keep)], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<i64>>>()?;
                ids
            };
            let removed = delete_ids(&tx, &stale)?;
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Keep the newest `keep` entries overall; returns rows deleted
    pub fn prune_global(&self, keep: usize) -> StorageResult<usize> {
        self.db.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            let stale: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM history ORDER BY timestamp DESC, id DESC LIMIT -1 OFFSET ?1",
                )?;
                let ids = stmt
                    .query_map(params![sql_count(keep)], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<i64>>>()?;
                ids
            };
            let removed = delete_ids(&tx, &stale)?;
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Entries for one tool, newest first
    pub fn get_by_tool(&self, tool_id: &str, limit: usize) -> StorageResult<Vec<HistoryEntry>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM history WHERE tool_id = ?1
                 ORDER BY timestamp DESC, id DESC LIMIT ?2"
            ))?;
            let entries = stmt
                .query_map(params![tool_id, sql_count(limit)], entry_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    /// Entries across all tools, newest first
    pub fn get_recent(&self, limit: usize) -> StorageResult<Vec<HistoryEntry>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM history ORDER BY timestamp DESC, id DESC LIMIT ?1"
            ))?;
            let entries = stmt
                .query_map(params![sql_count(limit)], entry_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    /// The newest entry of each tool, newest first
    pub fn latest_per_tool(&self, limit: usize) -> StorageResult<Vec<HistoryEntry>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM history h
                 WHERE h.id = (
                     SELECT id FROM history WHERE tool_id = h.tool_id
                     ORDER BY timestamp DESC, id DESC LIMIT 1
                 )
                 ORDER BY timestamp DESC, id DESC LIMIT ?1"
            ))?;
            let entries = stmt
                .query_map(params![sql_count(limit)], entry_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    /// Substring search over tool name, input and output
    pub fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<HistoryEntry>> {
        let pattern = format!("%{}%", escape_like(query));
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM history
                 WHERE tool_name LIKE ?1 ESCAPE '\\'
                    OR input LIKE ?1 ESCAPE '\\'
                    OR output LIKE ?1 ESCAPE '\\'
                 ORDER BY timestamp DESC, id DESC LIMIT ?2"
            ))?;
            let entries = stmt
                .query_map(params![pattern, sql_count(limit)], entry_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    pub fn get_entry(&self, id: i64) -> StorageResult<Option<HistoryEntry>> {
        self.db.with_connection(|conn| {
            conn.query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM history WHERE id = ?1"),
                params![id],
                entry_from_row,
            )
            .optional()
        })
    }

    pub fn delete_entry(&self, id: i64) -> StorageResult<bool> {
        self.db.with_connection(|conn| {
            let rows = conn.execute("DELETE FROM history WHERE id = ?1", params![id])?;
            Ok(rows > 0)
        })
    }

    /// Remove every entry for a tool; returns rows deleted
    pub fn clear_by_tool(&self, tool_id: &str) -> StorageResult<usize> {
        self.db.with_connection(|conn| {
            conn.execute("DELETE FROM history WHERE tool_id = ?1", params![tool_id])
        })
    }

    pub fn clear_all(&self) -> StorageResult<usize> {
        self.db.with_connection(|conn| conn.execute("DELETE FROM history", []))
    }

    pub fn count(&self) -> StorageResult<usize> {
        self.db.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
        })
    }

    pub fn count_by_tool(&self, tool_id: &str) -> StorageResult<usize> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM history WHERE tool_id = ?1",
                params![tool_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
        })
    }
}

fn delete_ids(conn: &rusqlite::Connection, ids: &[i64]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare("DELETE FROM history WHERE id = ?1")?;
    let mut removed = 0;
    for id in ids {
        removed += stmt.execute(params![id])?;
    }
    Ok(removed)
}

fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
