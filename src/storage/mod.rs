// Local-first persistence for history, workspaces and snippets
// Each store is a service object over an injected DatabaseManager handle

pub mod database;
pub mod crud;
pub mod history;
pub mod workspaces;
pub mod snippets;

pub use database::{DatabaseManager, Namespace, StorageError, StorageResult, get_default_data_dir};
pub use history::{HistoryEntry, HistoryLimits, HistoryStore, NewHistoryEntry};
pub use workspaces::{Workspace, WorkspacePreset, WorkspaceStore, WorkspaceTool, builtin_presets};
pub use snippets::{CreateSnippetInput, Snippet, SnippetStore};

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
