// Format predicates used by the detector cascade
// Each takes the trimmed input and must not allocate more than a copy of it

use regex::Regex;
use std::sync::LazyLock;

static JWT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$").unwrap());

static PEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^-----BEGIN ([A-Z0-9 ]+)-----\r?\n.*\r?\n-----END ([A-Z0-9 ]+)-----$").unwrap()
});

static DIFF_HUNK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^@@ -\d+(,\d+)? \+\d+(,\d+)? @@").unwrap());

static XML_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<\?xml\s").unwrap());

static XML_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^<([A-Za-z_][\w:.-]*)(\s[^>]*)?>.*</([A-Za-z_][\w:.-]*)>$").unwrap());

static HTML_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^<!doctype\s+html|<(html|head|body|div|span|p|a|script|style|table)[\s>]").unwrap()
});

static DATA_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:[\w.+-]+/[\w.+-]+(;[\w=.-]+)*;base64,").unwrap());

static HTTP_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap());

static PERCENT_ESCAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%[0-9A-Fa-f]{2}").unwrap());

static QUERY_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\??[\w.~-]+=[^&\s]*(&[\w.~-]+=[^&\s]*)+$").unwrap());

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$").unwrap()
});

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#([0-9A-Fa-f]{3}|[0-9A-Fa-f]{4}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})|(rgba?|hsla?)\([^)]*\))$").unwrap()
});

static UNIX_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{10}|\d{13})$").unwrap());

static CRON_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*|\?|[0-9]+|[A-Za-z]{3})([,/-](\*|[0-9]+|[A-Za-z]{3}))*$").unwrap()
});

static HEX_DIGEST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]+$").unwrap());

static YAML_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(- )?["']?[\w.-]+["']?:(\s|$)"#).unwrap());

static YAML_LIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*- \S").unwrap());

static SQL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^(select\s.+\sfrom\s|insert\s+into\s|update\s+\S+\s+set\s|delete\s+from\s|create\s+(table|index|view|unique)\s|alter\s+table\s|drop\s+(table|index|view)\s|with\s+\w+\s+as\s*\()",
    )
    .unwrap()
});

static MARKDOWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6}\s+\S|```|>\s+\S|\s*[-*+]\s+\[[ xX]\]\s)|\[[^\]\n]+\]\([^)\s]+\)|\*\*[^*\n]+\*\*")
        .unwrap()
});

static CSS_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(@[\w-]+[^{]*\{|[.#:\[\]\w\s,>*=~^$|()-]+\{)[^{}]*[\w-]+\s*:\s*[^;{}]+;?.*\}$").unwrap()
});

static BASE64: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/_-]+={0,2}$").unwrap());

pub(crate) fn is_jwt(text: &str) -> bool {
    JWT.is_match(text)
}

pub(crate) fn is_pem(text: &str) -> bool {
    PEM.captures(text)
        .map(|caps| caps.get(1).map(|m| m.as_str()) == caps.get(2).map(|m| m.as_str()))
        .unwrap_or(false)
}

pub(crate) fn is_git_diff(text: &str) -> bool {
    if text.starts_with("diff --git ") {
        return true;
    }
    let has_headers = text.lines().any(|l| l.starts_with("--- ")) && text.lines().any(|l| l.starts_with("+++ "));
    has_headers && DIFF_HUNK.is_match(text)
}

pub(crate) fn is_json(text: &str) -> bool {
    let structured = (text.starts_with('{') && text.ends_with('}')) || (text.starts_with('[') && text.ends_with(']'));
    structured && serde_json::from_str::<serde_json::Value>(text).is_ok()
}

pub(crate) fn is_html(text: &str) -> bool {
    text.starts_with('<') && HTML_HINT.is_match(text)
}

pub(crate) fn is_xml(text: &str) -> bool {
    if XML_DECL.is_match(text) {
        return true;
    }
    XML_ELEMENT
        .captures(text)
        .map(|caps| caps.get(1).map(|m| m.as_str()) == caps.get(3).map(|m| m.as_str()))
        .unwrap_or(false)
}

pub(crate) fn is_data_uri(text: &str) -> bool {
    DATA_URI.is_match(text)
}

pub(crate) fn is_url(text: &str) -> bool {
    HTTP_URL.is_match(text)
}

pub(crate) fn is_url_encoded(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    PERCENT_ESCAPE.is_match(text) || QUERY_STRING.is_match(text)
}

pub(crate) fn is_uuid(text: &str) -> bool {
    UUID.is_match(text)
}

pub(crate) fn is_color(text: &str) -> bool {
    HEX_COLOR.is_match(text)
}

pub(crate) fn is_unix_timestamp(text: &str) -> bool {
    UNIX_TIMESTAMP.is_match(text)
}

pub(crate) fn is_cron(text: &str) -> bool {
    if text.contains('\n') {
        return false;
    }
    let fields: Vec<&str> = text.split_whitespace().collect();
    (5..=6).contains(&fields.len())
        && fields.iter().any(|f| f.contains('*') || f.contains('/') || f.contains('?'))
        && fields.iter().all(|f| CRON_FIELD.is_match(f))
}

pub(crate) fn is_hash_digest(text: &str) -> bool {
    matches!(text.len(), 32 | 40 | 56 | 64 | 96 | 128) && HEX_DIGEST.is_match(text)
}

pub(crate) fn is_csv(text: &str) -> bool {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).take(50).collect();
    if lines.len() < 2 {
        return false;
    }
    let columns = lines[0].matches(',').count();
    columns >= 1 && lines.iter().all(|l| l.matches(',').count() == columns)
}

pub(crate) fn is_yaml(text: &str) -> bool {
    if text.starts_with('{') || text.starts_with('[') {
        return false;
    }
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .take(100)
        .collect();
    if text.starts_with("---\n") && lines.len() > 1 {
        return true;
    }
    let yamlish = lines
        .iter()
        .filter(|l| YAML_KEY.is_match(l) || YAML_LIST.is_match(l))
        .count();
    yamlish >= 2 && yamlish * 2 >= lines.len() && lines.iter().any(|l| YAML_KEY.is_match(l))
}

pub(crate) fn is_sql(text: &str) -> bool {
    SQL.is_match(text)
}

pub(crate) fn is_markdown(text: &str) -> bool {
    MARKDOWN.is_match(text)
}

pub(crate) fn is_css(text: &str) -> bool {
    CSS_RULE.is_match(text)
}

pub(crate) fn is_base64(text: &str) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    compact.len() >= 12 && compact.len() % 4 == 0 && BASE64.is_match(&compact)
}
