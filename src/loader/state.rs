//! Per-category load state machine.
//!
//! ```text
//! idle ──begin──▶ loading ──succeed──▶ success
//!                   │  ▲                  │
//!                 fail │ begin (retry)    expire
//!                   ▼  │                  ▼
//!                  error               idle
//! ```
//!
//! Transitions are plain methods on [`CategoryLoadState`] with no I/O, so the
//! loader's bookkeeping can be tested without a network or a view.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadPhase::Idle => "idle",
            LoadPhase::Loading => "loading",
            LoadPhase::Success => "success",
            LoadPhase::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLoadState {
    pub phase: LoadPhase,
    /// Consecutive failed attempts. Cleared on success.
    pub retry_count: u32,
    /// Message of the most recent failure, while in `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Epoch milliseconds of the last successful load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<u64>,
}

impl CategoryLoadState {
    /// Enter `loading`. The retry count survives so failures keep adding up.
    pub fn begin(&mut self) {
        self.phase = LoadPhase::Loading;
        self.error = None;
    }

    pub fn succeed(&mut self, now_ms: u64) {
        self.phase = LoadPhase::Success;
        self.retry_count = 0;
        self.error = None;
        self.loaded_at = Some(now_ms);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = LoadPhase::Error;
        self.retry_count += 1;
        self.error = Some(message.into());
    }

    /// Back to `idle` after the cached data expired.
    pub fn expire(&mut self) {
        self.phase = LoadPhase::Idle;
        self.loaded_at = None;
    }

    /// Abandoned mid-flight: back to `idle` without counting a failure.
    pub fn cancel(&mut self) {
        if self.is_loading() {
            self.phase = LoadPhase::Idle;
        }
    }

    pub fn retries_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }
}
