// Shareable state codec
// Turns a tool's state into a URL-safe token and back; decoding is all-or-nothing

pub mod sync;
pub mod link;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};
use thiserror::Error;

pub use self::sync::{SyncPhase, UrlStateSync, UrlWrite};
pub use self::link::{apply_token, extract_token, share_url, RoutingMode, ShareUrl, STATE_PARAM};

pub const PREFIX_COMPRESSED_STRING: &str = "zs:";
pub const PREFIX_COMPRESSED_JSON: &str = "zj:";
pub const PREFIX_JSON: &str = "j:";

/// Default token budget for a shareable URL
pub const DEFAULT_MAX_TOKEN_BYTES: usize = 8 * 1024;

/// Upper bound on inflated payloads
const MAX_INFLATED_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMode {
    String,
    Object,
}

/// A tool's current state as carried through a URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum ShareState {
    #[serde(rename = "string")]
    Text(String),
    Object(Value),
}

impl ShareState {
    pub fn mode(&self) -> StateMode {
        match self {
            ShareState::Text(_) => StateMode::String,
            ShareState::Object(_) => StateMode::Object,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    /// Tokens longer than this are dropped and flagged oversize
    pub max_bytes: usize,
    /// Try DEFLATE before falling back to plain base64
    pub compress: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_TOKEN_BYTES,
            compress: true,
        }
    }
}

/// Result of encoding. An oversize result carries an empty token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedState {
    pub token: String,
    pub oversize: bool,
    /// Length the token would have had
    pub encoded_len: usize,
}

impl EncodedState {
    pub fn is_shareable(&self) -> bool {
        !self.oversize && !self.token.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("token is not valid percent-encoding: {0}")]
    Percent(#[from] std::string::FromUtf8Error),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid compressed stream: {0}")]
    Inflate(std::io::Error),
    #[error("inflated payload exceeds {0} bytes")]
    TooLarge(u64),
    #[error("payload is not UTF-8")]
    Utf8,
    #[error("payload is not JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty token")]
    Empty,
}

/// Encode a state into a token, honouring the size budget
pub fn encode(state: &ShareState, options: &CodecOptions) -> EncodedState {
    let (payload, compressed_prefix) = match state {
        ShareState::Text(text) => (text.clone(), PREFIX_COMPRESSED_STRING),
        ShareState::Object(value) => (value.to_string(), PREFIX_COMPRESSED_JSON),
    };

    // Empty text has no untagged plain form, so it always takes the tagged path
    let compressed = if options.compress || payload.is_empty() {
        match deflate(payload.as_bytes()) {
            Ok(bytes) => Some(format!("{compressed_prefix}{}", URL_SAFE_NO_PAD.encode(bytes))),
            Err(e) => {
                tracing::debug!(error = %e, "compression failed, using plain encoding");
                None
            }
        }
    } else {
        None
    };

    let token = compressed.unwrap_or_else(|| {
        let plain = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        match state {
            ShareState::Text(_) => plain,
            ShareState::Object(_) => format!("{PREFIX_JSON}{plain}"),
        }
    });

    let encoded_len = token.len();
    if encoded_len > options.max_bytes {
        tracing::warn!(encoded_len, max = options.max_bytes, "share token over budget, omitting");
        return EncodedState {
            token: String::new(),
            oversize: true,
            encoded_len,
        };
    }

    EncodedState {
        token,
        oversize: false,
        encoded_len,
    }
}

/// Decode a token; any failure yields `None`
pub fn decode(token: &str) -> Option<ShareState> {
    match try_decode(token) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::debug!(error = %e, "discarding undecodable share token");
            None
        }
    }
}

/// Decode a token, reporting why it failed
pub fn try_decode(token: &str) -> Result<ShareState, CodecError> {
    let token = urlencoding::decode(token.trim())?;
    let token = token.as_ref();
    if token.is_empty() {
        return Err(CodecError::Empty);
    }

    if let Some(body) = token.strip_prefix(PREFIX_COMPRESSED_STRING) {
        let bytes = inflate(&decode_base64(body)?)?;
        return Ok(ShareState::Text(utf8(bytes)?));
    }
    if let Some(body) = token.strip_prefix(PREFIX_COMPRESSED_JSON) {
        let bytes = inflate(&decode_base64(body)?)?;
        return Ok(ShareState::Object(serde_json::from_slice(&bytes)?));
    }
    if let Some(body) = token.strip_prefix(PREFIX_JSON) {
        let bytes = decode_base64(body)?;
        return Ok(ShareState::Object(serde_json::from_slice(&bytes)?));
    }

    // Untagged legacy tokens are plain base64 text
    Ok(ShareState::Text(utf8(decode_base64(token)?)?))
}

fn deflate(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    DeflateDecoder::new(bytes)
        .take(MAX_INFLATED_BYTES + 1)
        .read_to_end(&mut out)
        .map_err(CodecError::Inflate)?;
    if out.len() as u64 > MAX_INFLATED_BYTES {
        return Err(CodecError::TooLarge(MAX_INFLATED_BYTES));
    }
    Ok(out)
}

/// Accepts standard or URL-safe alphabets, padded or not
fn decode_base64(body: &str) -> Result<Vec<u8>, CodecError> {
    let normalized: String = body
        .trim_end_matches('=')
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    Ok(URL_SAFE_NO_PAD.decode(normalized)?)
}

fn utf8(bytes: Vec<u8>) -> Result<String, CodecError> {
    String::from_utf8(bytes).map_err(|_| CodecError::Utf8)
}
