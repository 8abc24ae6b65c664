// Content-type detector
// Suggests a tool for pasted text by walking an ordered table of format predicates

mod rules;

use serde::{Deserialize, Serialize};

/// Inputs longer than this skip detection
pub const DEFAULT_MAX_CHARS: usize = 200_000;

/// Upper bound on ranked suggestions
pub const MAX_SUGGESTIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    Jwt,
    Pem,
    GitDiff,
    Json,
    Html,
    Xml,
    DataUri,
    Url,
    UrlEncoded,
    Uuid,
    Color,
    UnixTimestamp,
    Cron,
    HashDigest,
    Csv,
    Yaml,
    Sql,
    Markdown,
    Css,
    Base64,
    Text,
}

impl ContentKind {
    /// Tool that handles this kind of content
    pub fn tool_id(&self) -> &'static str {
        match self {
            ContentKind::Jwt => "jwt-decoder",
            ContentKind::Pem => "pem-decoder",
            ContentKind::GitDiff => "diff-viewer",
            ContentKind::Json => "json-formatter",
            ContentKind::Html => "html-formatter",
            ContentKind::Xml => "xml-formatter",
            ContentKind::DataUri => "data-uri",
            ContentKind::Url => "url-parser",
            ContentKind::UrlEncoded => "url-encoder",
            ContentKind::Uuid => "uuid-generator",
            ContentKind::Color => "color-converter",
            ContentKind::UnixTimestamp => "timestamp-converter",
            ContentKind::Cron => "cron-parser",
            ContentKind::HashDigest => "hash-generator",
            ContentKind::Csv => "csv-json",
            ContentKind::Yaml => "yaml-json",
            ContentKind::Sql => "sql-formatter",
            ContentKind::Markdown => "markdown-preview",
            ContentKind::Css => "css-formatter",
            ContentKind::Base64 => "base64",
            ContentKind::Text => "text-diff",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Jwt => "JWT",
            ContentKind::Pem => "PEM certificate or key",
            ContentKind::GitDiff => "Git diff",
            ContentKind::Json => "JSON",
            ContentKind::Html => "HTML",
            ContentKind::Xml => "XML",
            ContentKind::DataUri => "Data URI",
            ContentKind::Url => "URL",
            ContentKind::UrlEncoded => "URL-encoded text",
            ContentKind::Uuid => "UUID",
            ContentKind::Color => "Color",
            ContentKind::UnixTimestamp => "Unix timestamp",
            ContentKind::Cron => "Cron expression",
            ContentKind::HashDigest => "Hash digest",
            ContentKind::Csv => "CSV",
            ContentKind::Yaml => "YAML",
            ContentKind::Sql => "SQL",
            ContentKind::Markdown => "Markdown",
            ContentKind::Css => "CSS",
            ContentKind::Base64 => "Base64",
            ContentKind::Text => "Plain text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub kind: ContentKind,
    pub tool_id: &'static str,
    pub label: &'static str,
}

impl From<ContentKind> for Suggestion {
    fn from(kind: ContentKind) -> Self {
        Self {
            kind,
            tool_id: kind.tool_id(),
            label: kind.label(),
        }
    }
}

struct Rule {
    kind: ContentKind,
    matches: fn(&str) -> bool,
}

/// Evaluated top to bottom. Specific formats sit above broad ones:
/// Base64's alphabet covers JWTs, digests and timestamps, so it goes last.
const RULES: &[Rule] = &[
    Rule { kind: ContentKind::Jwt, matches: rules::is_jwt },
    Rule { kind: ContentKind::Pem, matches: rules::is_pem },
    Rule { kind: ContentKind::GitDiff, matches: rules::is_git_diff },
    Rule { kind: ContentKind::Json, matches: rules::is_json },
    Rule { kind: ContentKind::Html, matches: rules::is_html },
    Rule { kind: ContentKind::Xml, matches: rules::is_xml },
    Rule { kind: ContentKind::DataUri, matches: rules::is_data_uri },
    Rule { kind: ContentKind::Url, matches: rules::is_url },
    Rule { kind: ContentKind::UrlEncoded, matches: rules::is_url_encoded },
    Rule { kind: ContentKind::Uuid, matches: rules::is_uuid },
    Rule { kind: ContentKind::Color, matches: rules::is_color },
    Rule { kind: ContentKind::UnixTimestamp, matches: rules::is_unix_timestamp },
    Rule { kind: ContentKind::Cron, matches: rules::is_cron },
    Rule { kind: ContentKind::HashDigest, matches: rules::is_hash_digest },
    Rule { kind: ContentKind::Csv, matches: rules::is_csv },
    Rule { kind: ContentKind::Yaml, matches: rules::is_yaml },
    Rule { kind: ContentKind::Sql, matches: rules::is_sql },
    Rule { kind: ContentKind::Markdown, matches: rules::is_markdown },
    Rule { kind: ContentKind::Css, matches: rules::is_css },
    Rule { kind: ContentKind::Base64, matches: rules::is_base64 },
];

/// Returned for oversized input instead of running the cascade
const FALLBACK: [ContentKind; 4] = [
    ContentKind::Text,
    ContentKind::Json,
    ContentKind::Base64,
    ContentKind::HashDigest,
];

pub fn fallback_suggestions() -> Vec<Suggestion> {
    FALLBACK.iter().copied().map(Suggestion::from).collect()
}

fn exceeds(text: &str, max_chars: usize) -> bool {
    // Byte length bounds char count from above; only count when it might matter
    text.len() > max_chars && text.chars().count() > max_chars
}

/// Best single match, or `None`
pub fn detect(text: &str) -> Option<Suggestion> {
    detect_with_limit(text, DEFAULT_MAX_CHARS)
}

pub fn detect_with_limit(text: &str, max_chars: usize) -> Option<Suggestion> {
    if exceeds(text, max_chars) {
        return None;
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    RULES
        .iter()
        .find(|rule| (rule.matches)(trimmed))
        .map(|rule| rule.kind.into())
}

/// Every matching rule in cascade order, up to `MAX_SUGGESTIONS`
pub fn detect_all(text: &str) -> Vec<Suggestion> {
    detect_all_with_limit(text, DEFAULT_MAX_CHARS)
}

pub fn detect_all_with_limit(text: &str, max_chars: usize) -> Vec<Suggestion> {
    if exceeds(text, max_chars) {
        return fallback_suggestions();
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    RULES
        .iter()
        .filter(|rule| (rule.matches)(trimmed))
        .take(MAX_SUGGESTIONS)
        .map(|rule| rule.kind.into())
        .collect()
}
