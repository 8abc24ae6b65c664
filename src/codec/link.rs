// URL shapes for shareable state
// Hash-router links carry the token as `#/app/<tool>?tb=<token>`, raw links as `#<token>`

use serde::{Deserialize, Serialize};
use url::Url;

use super::EncodedState;

/// Query parameter holding the token in hash-router links
pub const STATE_PARAM: &str = "tb";

const APP_ROUTE: &str = "/app/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoutingMode {
    HashRouter,
    RawHash,
}

/// A URL ready for the address bar, plus a warning when state was omitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareUrl {
    pub url: String,
    pub warning: Option<String>,
}

pub fn oversize_warning(encoded_len: usize) -> String {
    format!(
        "Current input is too large to share via URL ({encoded_len} bytes encoded); the link will not include it"
    )
}

/// Place the token into `base`. Oversize state is left out and a warning is set.
pub fn apply_token(base: &Url, tool_id: &str, encoded: &EncodedState, mode: RoutingMode) -> ShareUrl {
    let mut url = base.clone();
    let token = (!encoded.oversize && !encoded.token.is_empty()).then_some(encoded.token.as_str());

    match mode {
        RoutingMode::HashRouter => {
            let mut fragment = format!("{APP_ROUTE}{tool_id}");
            if let Some(token) = token {
                fragment.push('?');
                fragment.push_str(STATE_PARAM);
                fragment.push('=');
                fragment.push_str(token);
            }
            url.set_fragment(Some(&fragment));
        }
        RoutingMode::RawHash => url.set_fragment(token),
    }

    ShareUrl {
        url: url.into(),
        warning: encoded.oversize.then(|| oversize_warning(encoded.encoded_len)),
    }
}

/// Parse `base` and place the token into it
pub fn share_url(
    base: &str,
    tool_id: &str,
    encoded: &EncodedState,
    mode: RoutingMode,
) -> Result<ShareUrl, url::ParseError> {
    Ok(apply_token(&Url::parse(base)?, tool_id, encoded, mode))
}

/// Pull the raw (still encoded) token out of a URL
pub fn extract_token(url: &str, mode: RoutingMode) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let fragment = parsed.fragment()?;

    let token = match mode {
        RoutingMode::HashRouter => {
            let (_, query) = fragment.split_once('?')?;
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == STATE_PARAM)
                .map(|(_, value)| value)?
        }
        RoutingMode::RawHash => fragment,
    };

    (!token.is_empty()).then(|| token.to_string())
}

/// Tool id addressed by a hash-router link
pub fn route_tool(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.fragment()?.split('?').next()?;
    let tool = path.strip_prefix(APP_ROUTE)?.trim_end_matches('/');
    (!tool.is_empty()).then(|| tool.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode, CodecOptions, ShareState};
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://tools.example.dev/";

    fn shareable(token: &str) -> EncodedState {
        EncodedState {
            token: token.to_string(),
            oversize: false,
            encoded_len: token.len(),
        }
    }

    #[test]
    fn test_hash_router_shape() {
        let url = share_url(BASE, "json-formatter", &shareable("zs:abc"), RoutingMode::HashRouter).unwrap();
        assert_eq!(url.url, "https://tools.example.dev/#/app/json-formatter?tb=zs:abc");
        assert_eq!(url.warning, None);

        assert_eq!(extract_token(&url.url, RoutingMode::HashRouter), Some("zs:abc".to_string()));
        assert_eq!(route_tool(&url.url), Some("json-formatter".to_string()));
    }

    #[test]
    fn test_raw_hash_shape() {
        let url = share_url(BASE, "base64", &shareable("aGVsbG8"), RoutingMode::RawHash).unwrap();
        assert_eq!(url.url, "https://tools.example.dev/#aGVsbG8");
        assert_eq!(extract_token(&url.url, RoutingMode::RawHash), Some("aGVsbG8".to_string()));
    }

    #[test]
    fn test_oversize_omits_state() {
        let oversize = EncodedState {
            token: String::new(),
            oversize: true,
            encoded_len: 9000,
        };

        let routed = share_url(BASE, "diff", &oversize, RoutingMode::HashRouter).unwrap();
        assert_eq!(routed.url, "https://tools.example.dev/#/app/diff");
        assert!(!routed.url.contains("tb="));
        assert!(routed.warning.as_deref().unwrap().contains("9000"));
        assert_eq!(extract_token(&routed.url, RoutingMode::HashRouter), None);

        let raw = share_url("https://tools.example.dev/#stale", "diff", &oversize, RoutingMode::RawHash).unwrap();
        assert_eq!(raw.url, "https://tools.example.dev/");
        assert!(raw.warning.is_some());
    }

    #[test]
    fn test_end_to_end_through_url() {
        let state = ShareState::Text("line one\nline two & more".to_string());
        let encoded = encode(&state, &CodecOptions::default());
        let url = share_url(BASE, "text-diff", &encoded, RoutingMode::HashRouter).unwrap();

        let token = extract_token(&url.url, RoutingMode::HashRouter).unwrap();
        assert_eq!(decode(&token), Some(state));
    }

    #[test]
    fn test_extract_ignores_other_params() {
        let url = "https://tools.example.dev/#/app/json?theme=dark&tb=j:e30&x=1";
        assert_eq!(extract_token(url, RoutingMode::HashRouter), Some("j:e30".to_string()));
        assert_eq!(extract_token("https://tools.example.dev/#/app/json", RoutingMode::HashRouter), None);
        assert_eq!(extract_token("not a url", RoutingMode::RawHash), None);
    }
}
