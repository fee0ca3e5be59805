//! Usage report for the current daily window.

use std::collections::HashMap;

use stw_core::{AppId, LimitSet, TrackedSession};
use stw_protocol::{AppUsageEntry, MonitorStatus, UsageReport};

use crate::monitor::TickTime;

/// Apps below this are left out of the report.
pub const MIN_REPORTED_MS: u64 = 1_000;

/// The monitor's live session, as published in its status.
pub fn live_session(status: &MonitorStatus) -> Option<TrackedSession> {
    match (&status.tracked_app, status.session_started_at) {
        (Some(app), Some(started_at)) => Some(TrackedSession {
            app: app.clone(),
            started_at,
        }),
        _ => None,
    }
}

/// Builds the per-app usage report.
///
/// `recorded` is closed-interval foreground time from the window start to
/// now. `before_session` is the recorded time of the tracked app up to its
/// session start; it replaces that app's total, and the live session is
/// added on top. Entries are sorted by usage, highest first, ties by app
/// identifier.
pub fn build_usage_report(
    recorded: HashMap<AppId, u64>,
    before_session: u64,
    status: &MonitorStatus,
    limits: &LimitSet,
    window: TickTime,
) -> UsageReport {
    let mut totals = recorded;

    if let Some(live) = live_session(status) {
        let total = before_session.saturating_add(live.elapsed_millis(window.now));
        totals.insert(live.app, total);
    }

    let mut apps: Vec<AppUsageEntry> = totals
        .into_iter()
        .filter(|(_, used_ms)| *used_ms > MIN_REPORTED_MS)
        .map(|(app, used_ms)| AppUsageEntry {
            budget_minutes: limits.find(&app).map(|l| l.budget_minutes),
            blocked: status.blocked.contains(&app),
            app,
            used_ms,
        })
        .collect();

    apps.sort_by(|a, b| b.used_ms.cmp(&a.used_ms).then_with(|| a.app.cmp(&b.app)));

    UsageReport {
        window_start: window.window_start,
        generated_at: window.now,
        apps,
    }
}
