use pivot_protocol::SortingSettingsItem;
use std::sync::{Arc, Mutex};

/// Lifecycle of one query session.
///
/// `Idle → Submitting → Streaming → {Finished | Cancelled | Errored}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Streaming,
    Finished,
    Cancelled,
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Finished | SessionState::Cancelled | SessionState::Errored
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Submitting | SessionState::Streaming)
    }

    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Idle, Submitting)
                | (Submitting, Streaming)
                | (Streaming, Finished)
                | (Idle | Submitting | Streaming, Cancelled | Errored)
        )
    }
}

/// One outstanding or completed request. A new query supersedes the session
/// wholesale; sessions are never reused across queries except for
/// pagination, which continues the same guid.
#[derive(Debug, Clone)]
pub struct QuerySession {
    pub query_guid: String,
    pub is_paginated: bool,
    pub elements_per_page: Option<u64>,
    pub use_cache: bool,
    pub sort_settings: Vec<SortingSettingsItem>,
    state: Arc<Mutex<SessionState>>,
}

impl QuerySession {
    pub fn new(
        query_guid: String,
        is_paginated: bool,
        elements_per_page: Option<u64>,
        use_cache: bool,
    ) -> Self {
        Self {
            query_guid,
            is_paginated,
            elements_per_page,
            use_cache,
            sort_settings: Vec::new(),
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    pub fn state(&self) -> SessionState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn state_handle(&self) -> Arc<Mutex<SessionState>> {
        Arc::clone(&self.state)
    }

    /// Advances the state machine; illegal transitions are programming
    /// errors and are logged, never silently widened.
    pub(crate) fn advance(&self, to: SessionState) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state == to {
            return;
        }
        if state.can_transition(to) {
            *state = to;
        } else {
            log::error!("illegal session transition {:?} -> {to:?}", *state);
        }
    }
}

/// Hex guid from OS entropy, unique per submitted query.
pub fn new_query_guid() -> String {
    let mut bytes = [0u8; 16];
    if getrandom::getrandom(&mut bytes).is_err() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        return format!("q{nanos:032x}");
    }
    use std::fmt::Write as _;
    let mut out = String::with_capacity(32);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
