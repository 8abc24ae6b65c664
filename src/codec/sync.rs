// Debounced mirroring of tool state into the address bar
//
// Two phases: Idle and PendingWrite. Restoring from the URL arms a one-shot
// guard so the state change caused by the restore does not schedule a write
// back to the URL.

use std::time::{Duration, Instant};
use url::Url;

use super::link::{apply_token, extract_token, RoutingMode};
use super::{decode, encode, CodecOptions, EncodedState, ShareState};

/// Default delay between the last change and the URL write
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    PendingWrite { encoded: EncodedState, due: Instant },
}

/// A URL the caller should push into browser history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlWrite {
    pub url: String,
    pub warning: Option<String>,
}

#[derive(Debug)]
pub struct UrlStateSync {
    base: Url,
    tool_id: String,
    routing: RoutingMode,
    options: CodecOptions,
    debounce: Duration,
    phase: SyncPhase,
    mounted: bool,
    restore_guard: Option<ShareState>,
    last_token: Option<String>,
}

impl UrlStateSync {
    pub fn new(
        base_url: &str,
        tool_id: impl Into<String>,
        routing: RoutingMode,
        options: CodecOptions,
        debounce: Duration,
    ) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base_url)?;
        base.set_fragment(None);

        Ok(Self {
            base,
            tool_id: tool_id.into(),
            routing,
            options,
            debounce,
            phase: SyncPhase::Idle,
            mounted: false,
            restore_guard: None,
            last_token: None,
        })
    }

    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SyncPhase::Idle
    }

    /// Read the initial state from the URL. Only the first call does anything.
    pub fn restore(&mut self, current_url: &str) -> Option<ShareState> {
        if self.mounted {
            return None;
        }
        self.mounted = true;

        let token = extract_token(current_url, self.routing)?;
        let state = decode(&token)?;
        self.last_token = Some(token);
        self.restore_guard = Some(state.clone());
        Some(state)
    }

    /// Record a state change; (re)schedules a write `debounce` after `now`
    pub fn on_change(&mut self, state: &ShareState, now: Instant) {
        if let Some(restored) = self.restore_guard.take() {
            if &restored == state {
                tracing::trace!(tool_id = %self.tool_id, "skipping write for restored state");
                return;
            }
        }

        let encoded = encode(state, &self.options);
        self.phase = SyncPhase::PendingWrite {
            encoded,
            due: now + self.debounce,
        };
    }

    /// Emit the pending write once its deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<UrlWrite> {
        match &self.phase {
            SyncPhase::PendingWrite { due, .. } if *due <= now => self.flush(),
            _ => None,
        }
    }

    /// Emit the pending write immediately, if any
    pub fn flush(&mut self) -> Option<UrlWrite> {
        let SyncPhase::PendingWrite { encoded, .. } = std::mem::replace(&mut self.phase, SyncPhase::Idle) else {
            return None;
        };

        let token = encoded.is_shareable().then(|| encoded.token.clone());
        if !encoded.oversize && token == self.last_token {
            return None;
        }
        self.last_token = token;

        let share = apply_token(&self.base, &self.tool_id, &encoded, self.routing);
        Some(UrlWrite {
            url: share.url,
            warning: share.warning,
        })
    }
}
