// Database connection manager for local SQLite storage
// Each namespace (history, workspaces, snippets) lives in its own database file

use rusqlite::{Connection, Result as SqliteResult};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Schema version stamped into every namespace via `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to get app data directory")]
    AppDataDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
    #[error("Unsupported schema version {found} (expected {expected})")]
    SchemaVersion { found: i32, expected: i32 },
    #[error("Invalid value for {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Independently versioned local databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    History,
    Workspaces,
    Snippets,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::History, Namespace::Workspaces, Namespace::Snippets];

    /// File name of the namespace inside the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Namespace::History => "history.db",
            Namespace::Workspaces => "workspaces.db",
            Namespace::Snippets => "snippets.db",
        }
    }

    fn schema(&self) -> &'static str {
        match self {
            Namespace::History => {
                r#"
                -- Append-only tool history; id order doubles as insertion order
                CREATE TABLE IF NOT EXISTS history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tool_id TEXT NOT NULL,
                    tool_name TEXT NOT NULL,
                    timestamp INTEGER NOT NULL,
                    input TEXT NOT NULL,
                    output TEXT,
                    metadata TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp);
                CREATE INDEX IF NOT EXISTS idx_history_tool_timestamp ON history(tool_id, timestamp);
                "#
            }
            Namespace::Workspaces => {
                r#"
                -- Named bundles of per-tool state; tools is a JSON array
                CREATE TABLE IF NOT EXISTS workspaces (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    tools TEXT NOT NULL DEFAULT '[]'
                );

                CREATE INDEX IF NOT EXISTS idx_workspaces_created_at ON workspaces(created_at);
                "#
            }
            Namespace::Snippets => {
                r#"
                CREATE TABLE IF NOT EXISTS snippets (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    content TEXT NOT NULL,
                    tool_id TEXT,
                    created_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_snippets_tool_id ON snippets(tool_id);
                CREATE INDEX IF NOT EXISTS idx_snippets_created_at ON snippets(created_at);
                "#
            }
        }
    }
}

/// Database manager for one local SQLite namespace
pub struct DatabaseManager {
    connection: Mutex<Connection>,
    db_path: Option<PathBuf>,
    namespace: Namespace,
}

impl DatabaseManager {
    /// Open (or create) the database for `namespace` at the given path
    pub fn new(db_path: PathBuf, namespace: Namespace) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let connection = Connection::open(&db_path)?;
        Self::from_connection(connection, Some(db_path), namespace)
    }

    /// Open the namespace inside a data directory using its default file name
    pub fn open_in_dir(data_dir: &Path, namespace: Namespace) -> StorageResult<Self> {
        Self::new(data_dir.join(namespace.file_name()), namespace)
    }

    /// In-memory database, used for ephemeral sessions and tests
    pub fn open_in_memory(namespace: Namespace) -> StorageResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::from_connection(connection, None, namespace)
    }

    fn from_connection(
        connection: Connection,
        db_path: Option<PathBuf>,
        namespace: Namespace,
    ) -> StorageResult<Self> {
        let manager = Self {
            connection: Mutex::new(connection),
            db_path,
            namespace,
        };

        manager.init_schema()?;
        tracing::debug!(?namespace, path = ?manager.db_path, "opened local database");

        Ok(manager)
    }

    /// Get the database path (`None` for in-memory databases)
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Initialize the namespace schema and stamp its version
    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;

        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(StorageError::SchemaVersion {
                found: version,
                expected: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(
            r#"
            -- App state table: generic key/value persistence (settings live here)
            CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        conn.execute_batch(self.namespace.schema())?;

        if version < SCHEMA_VERSION {
            conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        }

        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Execute a function with database connection access
    pub fn with_connection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.lock()?;
        f(&conn).map_err(StorageError::from)
    }

    /// Execute a function with mutable database connection access
    pub fn with_connection_mut<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> SqliteResult<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn).map_err(StorageError::from)
    }
}

/// Get the default data directory for the toolbox databases
pub fn get_default_data_dir() -> StorageResult<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("dev", "devtoolbox", "devtoolbox")
        .ok_or(StorageError::AppDataDir)?;

    Ok(proj_dirs.data_dir().to_path_buf())
}
