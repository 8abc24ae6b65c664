// Workspaces: named bundles of per-tool state snapshots
// Built from presets, from history or by import; names are deduplicated by suffix

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::database::{DatabaseManager, StorageResult};
use super::history::HistoryEntry;
use super::now_millis;

const DEFAULT_WORKSPACE_NAME: &str = "Workspace";

/// A tool and its opaque state blob inside a workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceTool {
    pub tool_id: String,
    /// Owned by the originating tool; `None` means empty state
    #[serde(default)]
    pub state: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub tools: Vec<WorkspaceTool>,
}

/// A built-in starting point for a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspacePreset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tool_ids: &'static [&'static str],
}

/// Presets that ship with the application
pub fn builtin_presets() -> Vec<WorkspacePreset> {
    vec![
        WorkspacePreset {
            id: "web-debugging",
            name: "Web Debugging",
            description: "Inspect tokens, URLs and payloads from a request",
            tool_ids: &["jwt-decoder", "url-encoder", "json-formatter", "http-status"],
        },
        WorkspacePreset {
            id: "data-wrangling",
            name: "Data Wrangling",
            description: "Reshape structured data between formats",
            tool_ids: &["json-formatter", "yaml-json", "csv-json", "xml-formatter"],
        },
        WorkspacePreset {
            id: "security",
            name: "Security",
            description: "Hashing, secrets and certificate inspection",
            tool_ids: &["hash-generator", "password-generator", "pem-decoder", "base64"],
        },
        WorkspacePreset {
            id: "frontend",
            name: "Frontend",
            description: "Styling and markup helpers",
            tool_ids: &["color-converter", "css-formatter", "html-entities", "markdown-preview"],
        },
    ]
}

/// Pick `base`, or `base N` with the smallest N >= 2 not already taken
pub fn unique_name(base: &str, existing: &[Workspace]) -> String {
    let base = match base.trim() {
        "" => DEFAULT_WORKSPACE_NAME,
        trimmed => trimmed,
    };
    let taken: HashSet<&str> = existing.iter().map(|w| w.name.as_str()).collect();

    if !taken.contains(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base} {n}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// Bundle the latest entry of each tool. Ties on timestamp go to the higher id.
pub fn build_from_history(name: &str, entries: &[HistoryEntry]) -> Workspace {
    let mut sorted: Vec<&HistoryEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

    let mut seen = HashSet::new();
    let tools = sorted
        .into_iter()
        .filter(|entry| seen.insert(entry.tool_id.as_str()))
        .map(|entry| WorkspaceTool {
            tool_id: entry.tool_id.clone(),
            state: Some(Value::String(entry.input.clone())),
        })
        .collect();

    new_workspace(name, tools)
}

/// Bundle the given tools with empty state (duplicates collapsed)
pub fn build_from_tool_list<S: AsRef<str>>(name: &str, tool_ids: &[S]) -> Workspace {
    let mut seen = HashSet::new();
    let tools = tool_ids
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| seen.insert(*id))
        .map(|id| WorkspaceTool {
            tool_id: id.to_string(),
            state: None,
        })
        .collect();

    new_workspace(name, tools)
}

pub fn build_from_preset(preset: &WorkspacePreset) -> Workspace {
    build_from_tool_list(preset.name, preset.tool_ids)
}

fn new_workspace(name: &str, tools: Vec<WorkspaceTool>) -> Workspace {
    Workspace {
        id: Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        created_at: now_millis(),
        tools,
    }
}

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    let tools_json: String = row.get(3)?;
    let tools = serde_json::from_str(&tools_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Workspace {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        tools,
    })
}

/// Workspace service over the workspaces namespace
#[derive(Clone)]
pub struct WorkspaceStore {
    db: Arc<DatabaseManager>,
}

impl WorkspaceStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// All workspaces, newest first. Rows that fail to decode are skipped.
    pub fn list(&self) -> StorageResult<Vec<Workspace>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, created_at, tools FROM workspaces ORDER BY created_at DESC, rowid DESC",
            )?;
            let workspaces = stmt
                .query_map([], workspace_from_row)?
                .filter_map(|r| match r {
                    Ok(ws) => Some(ws),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable workspace row");
                        None
                    }
                })
                .collect();
            Ok(workspaces)
        })
    }

    pub fn get(&self, id: &str) -> StorageResult<Option<Workspace>> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT id, name, created_at, tools FROM workspaces WHERE id = ?1",
                params![id],
                workspace_from_row,
            )
            .optional()
        })
    }

    /// Insert or replace by id. A blank id gets a fresh one; a zero timestamp becomes now.
    pub fn save(&self, workspace: &Workspace) -> StorageResult<Workspace> {
        let mut workspace = workspace.clone();
        if workspace.id.trim().is_empty() {
            workspace.id = Uuid::new_v4().to_string();
        }
        if workspace.created_at == 0 {
            workspace.created_at = now_millis();
        }

        let tools = serde_json::to_string(&workspace.tools)?;
        self.db.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO workspaces (id, name, created_at, tools)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    created_at = excluded.created_at,
                    tools = excluded.tools
                "#,
                params![&workspace.id, &workspace.name, workspace.created_at, tools],
            )?;
            Ok(())
        })?;
        Ok(workspace)
    }

    pub fn delete(&self, id: &str) -> StorageResult<bool> {
        self.db.with_connection(|conn| {
            let rows_affected = conn.execute("DELETE FROM workspaces WHERE id = ?1", params![id])?;
            Ok(rows_affected > 0)
        })
    }

    /// Rename, deduplicating against the other workspaces
    pub fn rename(&self, id: &str, name: &str) -> StorageResult<Option<Workspace>> {
        let Some(mut workspace) = self.get(id)? else {
            return Ok(None);
        };
        let others: Vec<Workspace> = self.list()?.into_iter().filter(|w| w.id != id).collect();
        workspace.name = unique_name(name, &others);
        Ok(Some(self.save(&workspace)?))
    }

    /// Store a freshly built workspace under a name unique in the current list
    pub fn insert_new(&self, mut workspace: Workspace) -> StorageResult<Workspace> {
        let existing = self.list()?;
        workspace.name = unique_name(&workspace.name, &existing);
        let workspace = self.save(&workspace)?;
        tracing::debug!(id = %workspace.id, name = %workspace.name, "created workspace");
        Ok(workspace)
    }

    pub fn create_from_history(&self, name: &str, entries: &[HistoryEntry]) -> StorageResult<Workspace> {
        self.insert_new(build_from_history(name, entries))
    }

    pub fn create_from_tool_list<S: AsRef<str>>(&self, name: &str, tool_ids: &[S]) -> StorageResult<Workspace> {
        self.insert_new(build_from_tool_list(name, tool_ids))
    }

    pub fn create_from_preset(&self, preset: &WorkspacePreset) -> StorageResult<Workspace> {
        self.insert_new(build_from_preset(preset))
    }

    /// Import a workspace under a new id and timestamp; never overwrites
    pub fn import(&self, mut workspace: Workspace) -> StorageResult<Workspace> {
        workspace.id = Uuid::new_v4().to_string();
        workspace.created_at = now_millis();
        self.insert_new(workspace)
    }

    /// Parse a standalone JSON document and import it
    pub fn import_json(&self, json: &str) -> StorageResult<Workspace> {
        let workspace: Workspace = serde_json::from_str(json)?;
        self.import(workspace)
    }

    pub fn export_json(&self, workspace: &Workspace) -> StorageResult<String> {
        Ok(serde_json::to_string_pretty(workspace)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Namespace;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn create_store() -> WorkspaceStore {
        let db = DatabaseManager::open_in_memory(Namespace::Workspaces).unwrap();
        WorkspaceStore::new(Arc::new(db))
    }

    fn history(id: i64, tool: &str, input: &str, timestamp: i64) -> HistoryEntry {
        HistoryEntry {
            id,
            tool_id: tool.to_string(),
            tool_name: tool.to_string(),
            timestamp,
            input: input.to_string(),
            output: None,
            metadata: None,
        }
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let store = create_store();

        let first = store.create_from_tool_list("Demo", &["json"]).unwrap();
        let second = store.create_from_tool_list("Demo", &["xml"]).unwrap();
        let third = store.create_from_tool_list("Demo", &["yaml"]).unwrap();

        assert_eq!(first.name, "Demo");
        assert_eq!(second.name, "Demo 2");
        assert_eq!(third.name, "Demo 3");
    }

    #[test]
    fn test_unique_name_fills_gaps_and_defaults() {
        let demo = build_from_tool_list("Demo", &["a"]);
        let mut demo_3 = demo.clone();
        demo_3.name = "Demo 3".to_string();
        let existing = vec![demo, demo_3];

        assert_eq!(unique_name("Demo", &existing), "Demo 2");
        assert_eq!(unique_name("  ", &[]), "Workspace");
        assert_eq!(unique_name(" Other ", &existing), "Other");
    }

    #[test]
    fn test_build_from_history_keeps_latest_per_tool() {
        let entries = vec![
            history(1, "json", "old json", 100),
            history(2, "xml", "xml", 150),
            history(3, "json", "new json", 200),
            history(4, "json", "same time, later id", 200),
        ];

        let ws = build_from_history("From history", &entries);

        assert_eq!(
            ws.tools,
            vec![
                WorkspaceTool { tool_id: "json".into(), state: Some(json!("same time, later id")) },
                WorkspaceTool { tool_id: "xml".into(), state: Some(json!("xml")) },
            ]
        );
    }

    #[test]
    fn test_build_from_tool_list_has_empty_state() {
        let ws = build_from_tool_list("Tools", &["a", "b", "a"]);
        assert_eq!(ws.tools.len(), 2);
        assert!(ws.tools.iter().all(|t| t.state.is_none()));
    }

    #[test]
    fn test_save_is_upsert() {
        let store = create_store();
        let mut ws = build_from_tool_list("Original", &["json"]);
        store.save(&ws).unwrap();

        ws.tools[0].state = Some(json!({ "text": "{}" }));
        store.save(&ws).unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0], ws);
    }

    #[test]
    fn test_save_without_id_never_collides() {
        let store = create_store();
        let blank = |name: &str| Workspace {
            id: String::new(),
            name: name.to_string(),
            created_at: 0,
            tools: Vec::new(),
        };

        let first = store.save(&blank("A")).unwrap();
        let second = store.save(&blank("B")).unwrap();

        assert!(!first.id.is_empty());
        assert_ne!(first.id, second.id);
        assert!(first.created_at > 0);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_delete() {
        let store = create_store();
        let ws = store.create_from_tool_list("Temp", &["json"]).unwrap();

        assert!(store.delete(&ws.id).unwrap());
        assert!(!store.delete(&ws.id).unwrap());
        assert!(store.get(&ws.id).unwrap().is_none());
    }

    #[test]
    fn test_import_never_overwrites() {
        let store = create_store();
        let existing = store.create_from_tool_list("Shared", &["json"]).unwrap();

        let exported = store.export_json(&existing).unwrap();
        let imported = store.import_json(&exported).unwrap();

        assert_ne!(imported.id, existing.id);
        assert_eq!(imported.name, "Shared 2");
        assert_eq!(imported.tools, existing.tools);
        assert_eq!(store.get(&existing.id).unwrap().unwrap(), existing);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_import_rejects_bad_json() {
        let store = create_store();
        assert!(store.import_json("{\"name\": 3}").is_err());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_rename_deduplicates_against_others() {
        let store = create_store();
        store.create_from_tool_list("Alpha", &["a"]).unwrap();
        let beta = store.create_from_tool_list("Beta", &["b"]).unwrap();

        let renamed = store.rename(&beta.id, "Alpha").unwrap().unwrap();
        assert_eq!(renamed.name, "Alpha 2");

        // Renaming to its own name keeps it
        let same = store.rename(&beta.id, "Alpha 2").unwrap().unwrap();
        assert_eq!(same.name, "Alpha 2");

        assert!(store.rename("missing", "x").unwrap().is_none());
    }

    #[test]
    fn test_presets() {
        let store = create_store();
        let presets = builtin_presets();
        assert!(!presets.is_empty());

        let ws = store.create_from_preset(&presets[0]).unwrap();
        assert_eq!(ws.name, presets[0].name);
        assert_eq!(ws.tools.len(), presets[0].tool_ids.len());
    }
}
