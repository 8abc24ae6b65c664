// JSON file exporter for workspaces and snippets
// A workspace file is the bare Workspace document; snippets travel in a versioned bundle

use super::{ExportError, ExportOptions, BUNDLE_VERSION};
use crate::storage::{Snippet, Workspace};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Write};
use std::path::Path;

/// Envelope for a snippet collection on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetBundle {
    pub version: u32,
    pub exported_at: i64,
    pub snippets: Vec<Snippet>,
}

/// JSON exporter for workspace and snippet documents
pub struct JsonExporter {
    options: ExportOptions,
}

impl JsonExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    pub fn with_default_options() -> Self {
        Self::new(ExportOptions::default())
    }

    fn to_string<T: Serialize>(&self, value: &T) -> Result<String, ExportError> {
        let out = if self.options.pretty_print {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(out)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<usize, ExportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::with_capacity(64 * 1024, file);
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
        Ok(contents.len())
    }

    /// Serialize a workspace as a standalone document
    pub fn workspace_to_string(&self, workspace: &Workspace) -> Result<String, ExportError> {
        self.to_string(workspace)
    }

    /// Write a workspace document to disk; returns bytes written
    pub fn export_workspace_to_file(&self, path: &Path, workspace: &Workspace) -> Result<usize, ExportError> {
        let json = self.workspace_to_string(workspace)?;
        let written = self.write_file(path, &json)?;
        tracing::info!(path = %path.display(), id = %workspace.id, "exported workspace");
        Ok(written)
    }

    /// Read a workspace document. Ids are reassigned by the store on import.
    pub fn read_workspace_file(&self, path: &Path) -> Result<Workspace, ExportError> {
        let reader = BufReader::new(std::fs::File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn snippets_to_string(&self, snippets: &[Snippet]) -> Result<String, ExportError> {
        if snippets.is_empty() {
            return Err(ExportError::NoData);
        }
        self.to_string(&SnippetBundle {
            version: BUNDLE_VERSION,
            exported_at: crate::storage::now_millis(),
            snippets: snippets.to_vec(),
        })
    }

    pub fn export_snippets_to_file(&self, path: &Path, snippets: &[Snippet]) -> Result<usize, ExportError> {
        let json = self.snippets_to_string(snippets)?;
        let written = self.write_file(path, &json)?;
        tracing::info!(path = %path.display(), count = snippets.len(), "exported snippets");
        Ok(written)
    }

    pub fn read_snippets_file(&self, path: &Path) -> Result<Vec<Snippet>, ExportError> {
        let reader = BufReader::new(std::fs::File::open(path)?);
        let bundle: SnippetBundle = serde_json::from_reader(reader)?;
        if bundle.version > BUNDLE_VERSION {
            return Err(ExportError::UnsupportedVersion(bundle.version));
        }
        Ok(bundle.snippets)
    }
}
