//! Read-only views returned by daemon queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stw_core::{format_usage, AppId};

/// Usage of one application in the current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUsageEntry {
    pub app: AppId,
    /// Recorded foreground time plus the live session, in milliseconds.
    pub used_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_minutes: Option<u32>,
    /// Blocked during the current monitor run.
    #[serde(default)]
    pub blocked: bool,
}

impl AppUsageEntry {
    /// Human-readable usage, e.g. "1h 5m".
    pub fn used_display(&self) -> String {
        format_usage(self.used_ms)
    }
}

/// Per-application usage for the current daily window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub window_start: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    /// Sorted by usage, highest first.
    pub apps: Vec<AppUsageEntry>,
}

/// Snapshot of the monitor loop published after every tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub tracked_app: Option<AppId>,
    pub session_started_at: Option<DateTime<Utc>>,
    pub blocked: Vec<AppId>,
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Short description of the last tick outcome.
    pub last_outcome: Option<String>,
}
