// Toolbox settings
// Persisted field-by-field in the app_state table, falling back to defaults

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::codec::CodecOptions;
use crate::storage::database::{DatabaseManager, StorageError, StorageResult};
use crate::storage::history::HistoryLimits;

const KEY_HISTORY_PER_TOOL: &str = "settings.history_per_tool_limit";
const KEY_HISTORY_GLOBAL: &str = "settings.history_global_limit";
const KEY_URL_MAX_BYTES: &str = "settings.url_state_max_bytes";
const KEY_URL_COMPRESSION: &str = "settings.url_state_compression";
const KEY_URL_DEBOUNCE: &str = "settings.url_debounce_ms";
const KEY_WORKER_TIMEOUT: &str = "settings.worker_timeout_ms";
const KEY_DETECT_MAX_CHARS: &str = "settings.detect_max_chars";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolboxSettings {
    /// Most recent entries kept per tool
    pub history_per_tool_limit: usize,
    /// Most recent entries kept across all tools
    pub history_global_limit: usize,
    /// Largest share token allowed in a URL
    pub url_state_max_bytes: usize,
    pub url_state_compression: bool,
    pub url_debounce_ms: u64,
    pub worker_timeout_ms: u64,
    /// Inputs longer than this skip content detection
    pub detect_max_chars: usize,
}

impl Default for ToolboxSettings {
    fn default() -> Self {
        Self {
            history_per_tool_limit: 50,
            history_global_limit: 500,
            url_state_max_bytes: 8 * 1024,
            url_state_compression: true,
            url_debounce_ms: 500,
            worker_timeout_ms: 20_000,
            detect_max_chars: 200_000,
        }
    }
}

impl ToolboxSettings {
    pub fn history_limits(&self) -> HistoryLimits {
        HistoryLimits {
            per_tool: self.history_per_tool_limit,
            global: self.history_global_limit,
        }
    }

    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            max_bytes: self.url_state_max_bytes,
            compress: self.url_state_compression,
        }
    }

    pub fn url_debounce(&self) -> Duration {
        Duration::from_millis(self.url_debounce_ms)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }
}

/// Partial settings update; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsInput {
    pub history_per_tool_limit: Option<usize>,
    pub history_global_limit: Option<usize>,
    pub url_state_max_bytes: Option<usize>,
    pub url_state_compression: Option<bool>,
    pub url_debounce_ms: Option<u64>,
    pub worker_timeout_ms: Option<u64>,
    pub detect_max_chars: Option<usize>,
}

const SETTINGS_PREFIX: &str = "settings.";

fn parse_or<T: std::str::FromStr>(stored: &HashMap<String, String>, key: &str, default: T) -> T {
    match stored.get(key) {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparsable setting");
                default
            }
        },
    }
}

/// Largest retention cap SQLite can express as a LIMIT/OFFSET
const MAX_HISTORY_LIMIT: usize = i64::MAX as usize;

/// Retention caps must keep at least one entry and fit an SQLite integer
fn clamp_history_limit(key: &str, value: usize) -> StorageResult<usize> {
    if value == 0 {
        return Err(StorageError::InvalidSetting {
            key: key.to_string(),
            reason: "must keep at least one entry".to_string(),
        });
    }
    Ok(value.min(MAX_HISTORY_LIMIT))
}

fn history_limit_or(stored: &HashMap<String, String>, key: &str, default: usize) -> usize {
    match clamp_history_limit(key, parse_or(stored, key, default)) {
        Ok(limit) => limit,
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring stored history limit");
            default
        }
    }
}

impl ToolboxSettings {
    fn to_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_HISTORY_PER_TOOL, self.history_per_tool_limit.to_string()),
            (KEY_HISTORY_GLOBAL, self.history_global_limit.to_string()),
            (KEY_URL_MAX_BYTES, self.url_state_max_bytes.to_string()),
            (KEY_URL_COMPRESSION, self.url_state_compression.to_string()),
            (KEY_URL_DEBOUNCE, self.url_debounce_ms.to_string()),
            (KEY_WORKER_TIMEOUT, self.worker_timeout_ms.to_string()),
            (KEY_DETECT_MAX_CHARS, self.detect_max_chars.to_string()),
        ]
    }
}

impl UpdateSettingsInput {
    /// Validated key/value pairs for the fields being changed
    fn to_entries(&self) -> StorageResult<Vec<(&'static str, String)>> {
        let mut entries = Vec::new();
        if let Some(v) = self.history_per_tool_limit {
            entries.push((KEY_HISTORY_PER_TOOL, clamp_history_limit(KEY_HISTORY_PER_TOOL, v)?.to_string()));
        }
        if let Some(v) = self.history_global_limit {
            entries.push((KEY_HISTORY_GLOBAL, clamp_history_limit(KEY_HISTORY_GLOBAL, v)?.to_string()));
        }
        if let Some(v) = self.url_state_max_bytes {
            entries.push((KEY_URL_MAX_BYTES, v.to_string()));
        }
        if let Some(v) = self.url_state_compression {
            entries.push((KEY_URL_COMPRESSION, v.to_string()));
        }
        if let Some(v) = self.url_debounce_ms {
            entries.push((KEY_URL_DEBOUNCE, v.to_string()));
        }
        if let Some(v) = self.worker_timeout_ms {
            entries.push((KEY_WORKER_TIMEOUT, v.to_string()));
        }
        if let Some(v) = self.detect_max_chars {
            entries.push((KEY_DETECT_MAX_CHARS, v.to_string()));
        }
        Ok(entries)
    }
}

impl DatabaseManager {
    /// Load settings, substituting defaults for missing or invalid keys
    pub fn get_toolbox_settings(&self) -> StorageResult<ToolboxSettings> {
        let stored = self.get_states_with_prefix(SETTINGS_PREFIX)?;
        let d = ToolboxSettings::default();

        Ok(ToolboxSettings {
            history_per_tool_limit: history_limit_or(&stored, KEY_HISTORY_PER_TOOL, d.history_per_tool_limit),
            history_global_limit: history_limit_or(&stored, KEY_HISTORY_GLOBAL, d.history_global_limit),
            url_state_max_bytes: parse_or(&stored, KEY_URL_MAX_BYTES, d.url_state_max_bytes),
            url_state_compression: parse_or(&stored, KEY_URL_COMPRESSION, d.url_state_compression),
            url_debounce_ms: parse_or(&stored, KEY_URL_DEBOUNCE, d.url_debounce_ms),
            worker_timeout_ms: parse_or(&stored, KEY_WORKER_TIMEOUT, d.worker_timeout_ms),
            detect_max_chars: parse_or(&stored, KEY_DETECT_MAX_CHARS, d.detect_max_chars),
        })
    }

    /// Apply a partial update atomically and return the resulting settings.
    ///
    /// A zero history limit rejects the whole update; oversized limits are clamped.
    pub fn update_toolbox_settings(&self, input: &UpdateSettingsInput) -> StorageResult<ToolboxSettings> {
        let entries = input.to_entries()?;
        if !entries.is_empty() {
            self.set_states(&entries)?;
        }
        self.get_toolbox_settings()
    }

    /// Seed defaults for keys that don't exist yet
    pub fn init_default_settings(&self) -> StorageResult<()> {
        let written = self.set_states_if_absent(&ToolboxSettings::default().to_entries())?;
        if written > 0 {
            tracing::debug!(written, "seeded default settings");
        }
        Ok(())
    }

    /// Drop every stored setting and write the defaults back
    pub fn reset_toolbox_settings(&self) -> StorageResult<ToolboxSettings> {
        self.delete_states_with_prefix(SETTINGS_PREFIX)?;
        self.init_default_settings()?;
        self.get_toolbox_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Namespace;
    use pretty_assertions::assert_eq;

    fn create_test_db() -> DatabaseManager {
        DatabaseManager::open_in_memory(Namespace::History).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let db = create_test_db();
        assert_eq!(db.get_toolbox_settings().unwrap(), ToolboxSettings::default());
    }

    #[test]
    fn test_partial_update() {
        let db = create_test_db();

        let updated = db
            .update_toolbox_settings(&UpdateSettingsInput {
                history_per_tool_limit: Some(10),
                url_state_compression: Some(false),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.history_per_tool_limit, 10);
        assert!(!updated.url_state_compression);
        assert_eq!(updated.history_global_limit, 500);
        assert_eq!(db.get_toolbox_settings().unwrap(), updated);
    }

    #[test]
    fn test_invalid_value_falls_back() {
        let db = create_test_db();
        db.set_state(KEY_URL_MAX_BYTES, "lots").unwrap();

        let settings = db.get_toolbox_settings().unwrap();
        assert_eq!(settings.url_state_max_bytes, 8192);
    }

    #[test]
    fn test_init_default_settings_keeps_existing() {
        let db = create_test_db();
        db.set_state(KEY_HISTORY_GLOBAL, "42").unwrap();

        db.init_default_settings().unwrap();

        let settings = db.get_toolbox_settings().unwrap();
        assert_eq!(settings.history_global_limit, 42);
        assert_eq!(db.get_state(KEY_DETECT_MAX_CHARS).unwrap(), Some("200000".to_string()));
    }

    #[test]
    fn test_history_limits_are_validated() {
        let db = create_test_db();

        let result = db.update_toolbox_settings(&UpdateSettingsInput {
            history_per_tool_limit: Some(0),
            url_debounce_ms: Some(10),
            ..Default::default()
        });
        assert!(matches!(result, Err(StorageError::InvalidSetting { .. })));
        // Rejected updates write nothing
        assert_eq!(db.get_toolbox_settings().unwrap(), ToolboxSettings::default());

        let updated = db
            .update_toolbox_settings(&UpdateSettingsInput {
                history_global_limit: Some(usize::MAX),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.history_global_limit, i64::MAX as usize);
    }

    #[test]
    fn test_stored_zero_limit_falls_back() {
        let db = create_test_db();
        db.set_state(KEY_HISTORY_PER_TOOL, "0").unwrap();

        assert_eq!(db.get_toolbox_settings().unwrap().history_per_tool_limit, 50);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let db = create_test_db();
        db.update_toolbox_settings(&UpdateSettingsInput {
            worker_timeout_ms: Some(1),
            ..Default::default()
        })
        .unwrap();
        db.set_state("ui.theme", "dark").unwrap();

        assert_eq!(db.reset_toolbox_settings().unwrap(), ToolboxSettings::default());
        assert_eq!(db.get_state("ui.theme").unwrap(), Some("dark".to_string()));
    }

    #[test]
    fn test_derived_options() {
        let settings = ToolboxSettings::default();
        assert_eq!(settings.history_limits(), HistoryLimits { per_tool: 50, global: 500 });
        assert_eq!(settings.codec_options().max_bytes, 8192);
        assert_eq!(settings.url_debounce(), Duration::from_millis(500));
        assert_eq!(settings.worker_timeout(), Duration::from_secs(20));
    }
}
