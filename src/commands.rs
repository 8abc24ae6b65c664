// Command surface
// Every operation the UI calls, with errors flattened to strings for the bridge

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::codec::{self, link, CodecOptions, EncodedState, RoutingMode, ShareState, ShareUrl, UrlStateSync};
use crate::config::{ToolboxSettings, UpdateSettingsInput};
use crate::detect::{self, Suggestion};
use crate::export::{ExportError, JsonExporter};
use crate::storage::{
    builtin_presets, CreateSnippetInput, DatabaseManager, HistoryEntry, HistoryStore, Namespace, NewHistoryEntry,
    Snippet, SnippetStore, StorageError, StorageResult, Workspace, WorkspacePreset, WorkspaceStore,
};
use crate::worker::{self, WorkerError};

/// Services shared by all commands
pub struct AppState {
    pub history: Mutex<HistoryStore>,
    pub workspaces: WorkspaceStore,
    pub snippets: SnippetStore,
    /// Cached copy of the persisted settings
    pub settings: RwLock<ToolboxSettings>,
}

/// Convert StorageError to a string for IPC
impl From<StorageError> for String {
    fn from(err: StorageError) -> Self {
        err.to_string()
    }
}

impl From<ExportError> for String {
    fn from(err: ExportError) -> Self {
        err.to_string()
    }
}

impl From<WorkerError> for String {
    fn from(err: WorkerError) -> Self {
        err.to_string()
    }
}

impl AppState {
    /// Open (or create) the three databases under `data_dir`
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        let history = DatabaseManager::open_in_dir(data_dir, Namespace::History)?;
        let workspaces = DatabaseManager::open_in_dir(data_dir, Namespace::Workspaces)?;
        let snippets = DatabaseManager::open_in_dir(data_dir, Namespace::Snippets)?;
        Self::from_databases(history, workspaces, snippets)
    }

    pub fn in_memory() -> StorageResult<Self> {
        Self::from_databases(
            DatabaseManager::open_in_memory(Namespace::History)?,
            DatabaseManager::open_in_memory(Namespace::Workspaces)?,
            DatabaseManager::open_in_memory(Namespace::Snippets)?,
        )
    }

    /// Assemble from already opened handles. Settings live in the history database.
    pub fn from_databases(
        history: DatabaseManager,
        workspaces: DatabaseManager,
        snippets: DatabaseManager,
    ) -> StorageResult<Self> {
        history.init_default_settings()?;
        let settings = history.get_toolbox_settings()?;

        Ok(Self {
            history: Mutex::new(HistoryStore::new(Arc::new(history), settings.history_limits())),
            workspaces: WorkspaceStore::new(Arc::new(workspaces)),
            snippets: SnippetStore::new(Arc::new(snippets)),
            settings: RwLock::new(settings),
        })
    }

    fn history(&self) -> Result<MutexGuard<'_, HistoryStore>, String> {
        self.history.lock().map_err(|e| e.to_string())
    }

    fn settings(&self) -> Result<ToolboxSettings, String> {
        self.settings.read().map(|s| s.clone()).map_err(|e| e.to_string())
    }

    fn codec_options(&self) -> Result<CodecOptions, String> {
        Ok(self.settings()?.codec_options())
    }

    /// Address-bar sync for one tool, using the current codec budget and debounce
    pub fn url_sync(&self, base_url: &str, tool_id: &str, routing: RoutingMode) -> Result<UrlStateSync, String> {
        let settings = self.settings()?;
        UrlStateSync::new(
            base_url,
            tool_id,
            routing,
            settings.codec_options(),
            settings.url_debounce(),
        )
        .map_err(|e| e.to_string())
    }
}

// ============================================================================
// History Commands
// ============================================================================

/// Record a tool run; retention is applied afterwards
pub fn record_history(state: &AppState, entry: NewHistoryEntry) -> Result<HistoryEntry, String> {
    let history = state.history()?;
    Ok(history.add_entry(entry)?)
}

/// Newest-first entries for one tool
pub fn get_tool_history(state: &AppState, tool_id: String, limit: Option<usize>) -> Result<Vec<HistoryEntry>, String> {
    let history = state.history()?;
    let limit = limit.unwrap_or(history.limits().per_tool);
    Ok(history.get_by_tool(&tool_id, limit)?)
}

/// Newest-first entries across all tools
pub fn get_recent_history(state: &AppState, limit: Option<usize>) -> Result<Vec<HistoryEntry>, String> {
    let history = state.history()?;
    let limit = limit.unwrap_or(history.limits().global);
    Ok(history.get_recent(limit)?)
}

pub fn search_history(state: &AppState, query: String, limit: Option<usize>) -> Result<Vec<HistoryEntry>, String> {
    let history = state.history()?;
    let limit = limit.unwrap_or(history.limits().global);
    Ok(history.search(&query, limit)?)
}

pub fn delete_history_entry(state: &AppState, id: i64) -> Result<bool, String> {
    Ok(state.history()?.delete_entry(id)?)
}

/// Returns the number of entries removed
pub fn clear_tool_history(state: &AppState, tool_id: String) -> Result<usize, String> {
    let removed = state.history()?.clear_by_tool(&tool_id)?;
    tracing::debug!(tool_id = %tool_id, removed, "cleared tool history");
    Ok(removed)
}

pub fn clear_all_history(state: &AppState) -> Result<usize, String> {
    Ok(state.history()?.clear_all()?)
}

// ============================================================================
// Workspace Commands
// ============================================================================

pub fn get_workspaces(state: &AppState) -> Result<Vec<Workspace>, String> {
    Ok(state.workspaces.list()?)
}

pub fn get_workspace(state: &AppState, id: String) -> Result<Option<Workspace>, String> {
    Ok(state.workspaces.get(&id)?)
}

pub fn get_workspace_presets() -> Vec<WorkspacePreset> {
    builtin_presets()
}

/// Snapshot the latest history entry of every tool into a new workspace
pub fn create_workspace_from_history(state: &AppState, name: String) -> Result<Workspace, String> {
    let entries = {
        let history = state.history()?;
        history.latest_per_tool(history.limits().global)?
    };
    Ok(state.workspaces.create_from_history(&name, &entries)?)
}

/// New workspace with empty state for each listed tool
pub fn create_workspace_from_tools(state: &AppState, name: String, tool_ids: Vec<String>) -> Result<Workspace, String> {
    Ok(state.workspaces.create_from_tool_list(&name, &tool_ids)?)
}

pub fn create_workspace_from_preset(state: &AppState, preset_id: String) -> Result<Workspace, String> {
    let preset = builtin_presets()
        .into_iter()
        .find(|p| p.id == preset_id)
        .ok_or_else(|| format!("Unknown workspace preset: {}", preset_id))?;
    Ok(state.workspaces.create_from_preset(&preset)?)
}

pub fn rename_workspace(state: &AppState, id: String, name: String) -> Result<Option<Workspace>, String> {
    Ok(state.workspaces.rename(&id, &name)?)
}

pub fn delete_workspace(state: &AppState, id: String) -> Result<bool, String> {
    Ok(state.workspaces.delete(&id)?)
}

/// Import a workspace JSON document; it always gets a new id
pub fn import_workspace(state: &AppState, json: String) -> Result<Workspace, String> {
    Ok(state.workspaces.import_json(&json)?)
}

/// Pretty JSON document for a stored workspace
pub fn export_workspace(state: &AppState, id: String) -> Result<String, String> {
    let workspace = state
        .workspaces
        .get(&id)?
        .ok_or_else(|| format!("Workspace not found: {}", id))?;
    Ok(state.workspaces.export_json(&workspace)?)
}

/// Write a stored workspace to `file_path`; returns bytes written
pub fn export_workspace_to_file(state: &AppState, id: String, file_path: String) -> Result<usize, String> {
    let workspace = state
        .workspaces
        .get(&id)?
        .ok_or_else(|| format!("Workspace not found: {}", id))?;
    Ok(JsonExporter::with_default_options().export_workspace_to_file(&PathBuf::from(file_path), &workspace)?)
}

pub fn import_workspace_from_file(state: &AppState, file_path: String) -> Result<Workspace, String> {
    let workspace = JsonExporter::with_default_options().read_workspace_file(&PathBuf::from(file_path))?;
    Ok(state.workspaces.import(workspace)?)
}

// ============================================================================
// Snippet Commands
// ============================================================================

/// All snippets, or only those tagged with `tool_id`
pub fn get_snippets(state: &AppState, tool_id: Option<String>) -> Result<Vec<Snippet>, String> {
    let snippets = match tool_id {
        Some(tool_id) => state.snippets.list_by_tool(&tool_id)?,
        None => state.snippets.list()?,
    };
    tracing::debug!(count = snippets.len(), "returning snippets");
    Ok(snippets)
}

pub fn search_snippets(state: &AppState, query: String) -> Result<Vec<Snippet>, String> {
    Ok(state.snippets.search(&query)?)
}

/// Insert or replace by id; a snippet without an id is stored as new
pub fn save_snippet(state: &AppState, snippet: Snippet) -> Result<Snippet, String> {
    Ok(state.snippets.save(&snippet)?)
}

pub fn create_snippet(
    state: &AppState,
    name: String,
    content: String,
    tool_id: Option<String>,
) -> Result<Snippet, String> {
    Ok(state.snippets.create(CreateSnippetInput { name, content, tool_id })?)
}

pub fn delete_snippet(state: &AppState, id: String) -> Result<bool, String> {
    Ok(state.snippets.delete(&id)?)
}

pub fn export_snippets_to_file(state: &AppState, file_path: String) -> Result<usize, String> {
    let snippets = state.snippets.list()?;
    Ok(JsonExporter::with_default_options().export_snippets_to_file(&PathBuf::from(file_path), &snippets)?)
}

pub fn import_snippets_from_file(state: &AppState, file_path: String) -> Result<Vec<Snippet>, String> {
    let snippets = JsonExporter::with_default_options().read_snippets_file(&PathBuf::from(file_path))?;
    Ok(state.snippets.import(snippets)?)
}

// ============================================================================
// Share State Commands
// ============================================================================

pub fn encode_share_state(state: &AppState, share: ShareState) -> Result<EncodedState, String> {
    let encoded = codec::encode(&share, &state.codec_options()?);
    if encoded.oversize {
        tracing::warn!(encoded_len = encoded.encoded_len, "share state exceeds URL budget");
    }
    Ok(encoded)
}

/// `None` for any token that does not decode cleanly
pub fn decode_share_state(token: String) -> Option<ShareState> {
    codec::decode(&token)
}

pub fn build_share_url(
    state: &AppState,
    base_url: String,
    tool_id: String,
    share: ShareState,
    routing: Option<RoutingMode>,
) -> Result<ShareUrl, String> {
    let encoded = codec::encode(&share, &state.codec_options()?);
    link::share_url(&base_url, &tool_id, &encoded, routing.unwrap_or(RoutingMode::HashRouter))
        .map_err(|e| e.to_string())
}

/// Sync machine for a mounted tool; the caller drives it with `restore`, `on_change` and `poll`
pub fn create_url_sync(
    state: &AppState,
    base_url: String,
    tool_id: String,
    routing: Option<RoutingMode>,
) -> Result<UrlStateSync, String> {
    state.url_sync(&base_url, &tool_id, routing.unwrap_or(RoutingMode::HashRouter))
}

// ============================================================================
// Detection Commands
// ============================================================================

/// Ranked tool suggestions for pasted text, computed off the caller's thread
pub async fn detect_content(state: &AppState, text: String) -> Result<Vec<Suggestion>, String> {
    let settings = state.settings()?;
    let max_chars = settings.detect_max_chars;
    let suggestions = worker::run_offloaded(
        move || detect::detect_all_with_limit(&text, max_chars),
        settings.worker_timeout(),
    )
    .await?;
    Ok(suggestions)
}

// ============================================================================
// Settings Commands
// ============================================================================

pub fn get_settings(state: &AppState) -> Result<ToolboxSettings, String> {
    state.settings()
}

/// Persist the given fields and apply new history limits immediately
pub fn update_settings(state: &AppState, input: UpdateSettingsInput) -> Result<ToolboxSettings, String> {
    let mut history = state.history()?;
    let updated = history.database().update_toolbox_settings(&input)?;
    history.set_limits(updated.history_limits());
    drop(history);

    let mut cached = state.settings.write().map_err(|e| e.to_string())?;
    *cached = updated.clone();
    tracing::info!(?updated, "settings updated");
    Ok(updated)
}

pub fn reset_settings(state: &AppState) -> Result<ToolboxSettings, String> {
    let mut history = state.history()?;
    let defaults = history.database().reset_toolbox_settings()?;
    history.set_limits(defaults.history_limits());
    drop(history);

    *state.settings.write().map_err(|e| e.to_string())? = defaults.clone();
    Ok(defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ContentKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_state() -> AppState {
        AppState::in_memory().unwrap()
    }

    fn run(tool_id: &str, input: &str, timestamp: i64) -> NewHistoryEntry {
        NewHistoryEntry {
            tool_id: tool_id.to_string(),
            tool_name: tool_id.to_uppercase(),
            input: input.to_string(),
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    #[test]
    fn test_history_commands() {
        let state = create_state();
        record_history(&state, run("json", "{}", 1)).unwrap();
        record_history(&state, run("json", "[]", 2)).unwrap();
        record_history(&state, run("base64", "aGk=", 3)).unwrap();

        let json_runs = get_tool_history(&state, "json".into(), None).unwrap();
        let inputs: Vec<_> = json_runs.iter().map(|e| e.input.as_str()).collect();
        assert_eq!(inputs, vec!["[]", "{}"]);

        assert_eq!(get_recent_history(&state, Some(1)).unwrap()[0].tool_id, "base64");
        assert_eq!(clear_tool_history(&state, "json".into()).unwrap(), 2);
        assert_eq!(get_recent_history(&state, None).unwrap().len(), 1);
    }

    #[test]
    fn test_workspace_from_history_takes_latest_per_tool() {
        let state = create_state();
        record_history(&state, run("json", "old", 1)).unwrap();
        record_history(&state, run("json", "new", 5)).unwrap();
        record_history(&state, run("jwt", "token", 3)).unwrap();

        let ws = create_workspace_from_history(&state, "Demo".into()).unwrap();
        assert_eq!(ws.name, "Demo");
        let tools: Vec<_> = ws.tools.iter().map(|t| (t.tool_id.as_str(), t.state.clone())).collect();
        assert_eq!(
            tools,
            vec![("json", Some(json!("new"))), ("jwt", Some(json!("token")))]
        );

        let second = create_workspace_from_history(&state, "Demo".into()).unwrap();
        assert_eq!(second.name, "Demo 2");
    }

    #[test]
    fn test_workspace_import_export() {
        let state = create_state();
        let ws = create_workspace_from_tools(&state, "Tools".into(), vec!["json".into(), "diff".into()]).unwrap();

        let exported = export_workspace(&state, ws.id.clone()).unwrap();
        let imported = import_workspace(&state, exported).unwrap();

        assert_ne!(imported.id, ws.id);
        assert_eq!(imported.name, "Tools 2");
        assert_eq!(imported.tools, ws.tools);
        assert_eq!(get_workspaces(&state).unwrap().len(), 2);

        assert!(export_workspace(&state, "missing".into()).is_err());
        assert!(import_workspace(&state, "not json".into()).is_err());
    }

    #[test]
    fn test_workspace_file_commands() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ws.json").to_string_lossy().to_string();
        let state = create_state();

        let ws = create_workspace_from_preset(&state, "security".into()).unwrap();
        export_workspace_to_file(&state, ws.id.clone(), path.clone()).unwrap();
        let imported = import_workspace_from_file(&state, path).unwrap();

        assert_ne!(imported.id, ws.id);
        assert_eq!(imported.tools, ws.tools);
        assert!(create_workspace_from_preset(&state, "nope".into()).is_err());
    }

    #[test]
    fn test_snippet_commands() {
        let state = create_state();
        let created = create_snippet(&state, "Token".into(), "eyJ".into(), Some("jwt".into())).unwrap();
        create_snippet(&state, "Loose".into(), "text".into(), None).unwrap();

        assert_eq!(get_snippets(&state, None).unwrap().len(), 2);
        assert_eq!(get_snippets(&state, Some("jwt".into())).unwrap(), vec![created.clone()]);

        let edited = Snippet {
            content: "eyJhbGciOi".into(),
            ..created.clone()
        };
        save_snippet(&state, edited).unwrap();
        let found = search_snippets(&state, "token".into()).unwrap();
        assert_eq!(found[0].content, "eyJhbGciOi");

        assert!(delete_snippet(&state, created.id).unwrap());
        assert_eq!(get_snippets(&state, None).unwrap().len(), 1);
    }

    #[test]
    fn test_share_state_commands() {
        let state = create_state();
        let share = ShareState::Object(json!({ "input": "{\"a\":1}", "indent": 2 }));

        let encoded = encode_share_state(&state, share.clone()).unwrap();
        assert!(encoded.token.starts_with("zj:"));
        assert_eq!(decode_share_state(encoded.token), Some(share.clone()));
        assert_eq!(decode_share_state("zj:@@@".into()), None);

        let url = build_share_url(&state, "https://tools.example.dev/".into(), "json".into(), share, None).unwrap();
        assert!(url.url.contains("#/app/json?tb=zj:"));
        assert_eq!(url.warning, None);
    }

    #[test]
    fn test_settings_apply_to_services() {
        let state = create_state();
        assert_eq!(get_settings(&state).unwrap(), ToolboxSettings::default());

        let updated = update_settings(
            &state,
            UpdateSettingsInput {
                history_per_tool_limit: Some(2),
                url_state_max_bytes: Some(4),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.history_per_tool_limit, 2);

        for ts in 1..=4 {
            record_history(&state, run("json", &ts.to_string(), ts)).unwrap();
        }
        assert_eq!(get_tool_history(&state, "json".into(), Some(10)).unwrap().len(), 2);

        let encoded = encode_share_state(&state, ShareState::Text("too long".into())).unwrap();
        assert!(encoded.oversize);
        assert_eq!(encoded.token, "");

        assert_eq!(reset_settings(&state).unwrap(), ToolboxSettings::default());
        assert!(!encode_share_state(&state, ShareState::Text("too long".into())).unwrap().oversize);
    }

    #[test]
    fn test_history_limit_settings_are_bounded() {
        let state = create_state();

        let rejected = update_settings(
            &state,
            UpdateSettingsInput {
                history_per_tool_limit: Some(0),
                ..Default::default()
            },
        );
        assert!(rejected.is_err());
        assert_eq!(get_settings(&state).unwrap().history_per_tool_limit, 50);

        update_settings(
            &state,
            UpdateSettingsInput {
                history_per_tool_limit: Some(usize::MAX),
                history_global_limit: Some(usize::MAX),
                ..Default::default()
            },
        )
        .unwrap();
        for ts in 1..=3 {
            record_history(&state, run("json", "x", ts)).unwrap();
        }
        assert_eq!(get_tool_history(&state, "json".into(), Some(10)).unwrap().len(), 3);
    }

    #[test]
    fn test_save_snippet_without_id_creates_new() {
        let state = create_state();
        let parse = |json: &str| serde_json::from_str::<Snippet>(json).unwrap();

        let a = save_snippet(&state, parse(r#"{"name": "A", "content": "1"}"#)).unwrap();
        let b = save_snippet(&state, parse(r#"{"name": "B", "content": "2"}"#)).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(get_snippets(&state, None).unwrap().len(), 2);
    }

    #[test]
    fn test_url_sync_uses_configured_debounce() {
        let state = create_state();
        update_settings(
            &state,
            UpdateSettingsInput {
                url_debounce_ms: Some(50),
                ..Default::default()
            },
        )
        .unwrap();

        let mut sync = create_url_sync(&state, "https://tools.example.dev/".into(), "json".into(), None).unwrap();
        let t0 = std::time::Instant::now();
        sync.on_change(&ShareState::Text("abc".into()), t0);

        assert!(sync.poll(t0 + std::time::Duration::from_millis(40)).is_none());
        let write = sync.poll(t0 + std::time::Duration::from_millis(60)).unwrap();
        assert!(write.url.starts_with("https://tools.example.dev/#/app/json?tb=zs:"));

        assert!(create_url_sync(&state, "not a url".into(), "json".into(), None).is_err());
    }

    #[test]
    fn test_state_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let state = AppState::open(dir.path()).unwrap();
            record_history(&state, run("json", "{}", 1)).unwrap();
            update_settings(
                &state,
                UpdateSettingsInput {
                    history_global_limit: Some(7),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let state = AppState::open(dir.path()).unwrap();
        assert_eq!(get_recent_history(&state, None).unwrap().len(), 1);
        assert_eq!(get_settings(&state).unwrap().history_global_limit, 7);
    }

    #[tokio::test]
    async fn test_detect_content_offloaded() {
        let state = create_state();
        let jwt = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.sig".to_string();

        let suggestions = detect_content(&state, jwt).await.unwrap();
        assert_eq!(suggestions[0].kind, ContentKind::Jwt);

        let huge = "x".repeat(300_000);
        assert_eq!(detect_content(&state, huge).await.unwrap(), detect::fallback_suggestions());
    }
}
