// Snippet storage
// Free-standing reusable text blobs, optionally tagged with an origin tool

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::database::{DatabaseManager, StorageResult};
use super::now_millis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// Input for creating a new snippet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnippetInput {
    pub name: String,
    pub content: String,
    pub tool_id: Option<String>,
}

const SNIPPET_COLUMNS: &str = "id, name, content, tool_id, created_at";

fn snippet_from_row(row: &Row<'_>) -> rusqlite::Result<Snippet> {
    Ok(Snippet {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        tool_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Snippet service over the snippets namespace
#[derive(Clone)]
pub struct SnippetStore {
    db: Arc<DatabaseManager>,
}

impl SnippetStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// All snippets, newest first
    pub fn list(&self) -> StorageResult<Vec<Snippet>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SNIPPET_COLUMNS} FROM snippets ORDER BY created_at DESC, rowid DESC"
            ))?;
            let snippets = stmt
                .query_map([], snippet_from_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(snippets)
        })
    }

    pub fn list_by_tool(&self, tool_id: &str) -> StorageResult<Vec<Snippet>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SNIPPET_COLUMNS} FROM snippets WHERE tool_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let snippets = stmt
                .query_map(params![tool_id], snippet_from_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(snippets)
        })
    }

    /// Case-insensitive match on name or content
    pub fn search(&self, query: &str) -> StorageResult<Vec<Snippet>> {
        let needle = query.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| s.name.to_lowercase().contains(&needle) || s.content.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn get(&self, id: &str) -> StorageResult<Option<Snippet>> {
        self.db.with_connection(|conn| {
            conn.query_row(
                &format!("SELECT {SNIPPET_COLUMNS} FROM snippets WHERE id = ?1"),
                params![id],
                snippet_from_row,
            )
            .optional()
        })
    }

    /// Insert or replace by id. A blank id gets a fresh one instead of
    /// sharing the empty key; a zero timestamp becomes now.
    pub fn save(&self, snippet: &Snippet) -> StorageResult<Snippet> {
        let mut snippet = snippet.clone();
        if snippet.id.trim().is_empty() {
            snippet.id = Uuid::new_v4().to_string();
        }
        if snippet.created_at == 0 {
            snippet.created_at = now_millis();
        }

        self.db.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO snippets (id, name, content, tool_id, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    content = excluded.content,
                    tool_id = excluded.tool_id,
                    created_at = excluded.created_at
                "#,
                params![
                    &snippet.id,
                    &snippet.name,
                    &snippet.content,
                    &snippet.tool_id,
                    snippet.created_at,
                ],
            )?;
            Ok(())
        })?;
        Ok(snippet)
    }

    /// Create a snippet with a fresh id and timestamp
    pub fn create(&self, input: CreateSnippetInput) -> StorageResult<Snippet> {
        let snippet = Snippet {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            content: input.content,
            tool_id: input.tool_id,
            created_at: now_millis(),
        };
        self.save(&snippet)
    }

    pub fn delete(&self, id: &str) -> StorageResult<bool> {
        self.db.with_connection(|conn| {
            let rows = conn.execute("DELETE FROM snippets WHERE id = ?1", params![id])?;
            Ok(rows > 0)
        })
    }

    /// Bulk import; every snippet is stored under a new id and timestamp
    pub fn import(&self, snippets: Vec<Snippet>) -> StorageResult<Vec<Snippet>> {
        let now = now_millis();
        let mut imported = Vec::with_capacity(snippets.len());

        self.db.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            for mut snippet in snippets {
                snippet.id = Uuid::new_v4().to_string();
                snippet.created_at = now;
                tx.execute(
                    "INSERT INTO snippets (id, name, content, tool_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        &snippet.id,
                        &snippet.name,
                        &snippet.content,
                        &snippet.tool_id,
                        snippet.created_at,
                    ],
                )?;
                imported.push(snippet);
            }
            tx.commit()
        })?;

        tracing::debug!(count = imported.len(), "imported snippets");
        Ok(imported)
    }
}
