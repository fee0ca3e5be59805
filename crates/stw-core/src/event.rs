//! Foreground transition events and interval aggregation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppId;

/// Kind of visibility transition reported for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The application became the visible, interactive one.
    MovedToForeground,
    /// The application stopped being visible.
    MovedToBackground,
}

/// A single foreground transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub app: AppId,
}

impl ForegroundEvent {
    pub fn new(timestamp: DateTime<Utc>, kind: EventKind, app: AppId) -> Self {
        Self { timestamp, kind, app }
    }

    pub fn foreground(timestamp: DateTime<Utc>, app: impl Into<AppId>) -> Self {
        Self::new(timestamp, EventKind::MovedToForeground, app.into())
    }

    pub fn background(timestamp: DateTime<Utc>, app: impl Into<AppId>) -> Self {
        Self::new(timestamp, EventKind::MovedToBackground, app.into())
    }
}

/// Returns the application of the last `MovedToForeground` event.
///
/// Events are expected in chronological order, as returned by a usage
/// source. Background events are ignored: only an explicit foreground
/// transition names a candidate.
pub fn last_foreground_app(events: &[ForegroundEvent]) -> Option<&AppId> {
    events
        .iter()
        .rev()
        .find(|e| e.kind == EventKind::MovedToForeground)
        .map(|e| &e.app)
}

/// Sums closed foreground intervals per application, clipped to `[start, end]`.
///
/// An interval opens on `MovedToForeground` and closes on either a
/// `MovedToBackground` for the same app or a `MovedToForeground` for a
/// different app. An interval still open at the last event is *not*
/// counted: that time belongs to the live session, which the usage
/// accumulator adds separately.
///
/// Returns milliseconds per application. Apps with no overlap are absent.
pub fn aggregate_foreground_time(
    events: &[ForegroundEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> HashMap<AppId, u64> {
    let mut ordered: Vec<&ForegroundEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);

    let mut totals: HashMap<AppId, u64> = HashMap::new();
    let mut open: Option<(&AppId, DateTime<Utc>)> = None;

    for event in ordered {
        if event.timestamp > end {
            break;
        }

        match event.kind {
            EventKind::MovedToForeground => match open {
                Some((app, _)) if *app == event.app => {}
                Some((app, opened_at)) => {
                    add_clipped(&mut totals, app, opened_at, event.timestamp, start, end);
                    open = Some((&event.app, event.timestamp));
                }
                None => open = Some((&event.app, event.timestamp)),
            },
            EventKind::MovedToBackground => {
                if let Some((app, opened_at)) = open {
                    if *app == event.app {
                        add_clipped(&mut totals, app, opened_at, event.timestamp, start, end);
                        open = None;
                    }
                }
            }
        }
    }

    totals
}

fn add_clipped(
    totals: &mut HashMap<AppId, u64>,
    app: &AppId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    let clipped_from = from.max(start);
    let clipped_to = to.min(end);
    if clipped_to <= clipped_from {
        return;
    }

    let millis = u64::try_from((clipped_to - clipped_from).num_milliseconds()).unwrap_or(0);
    if millis > 0 {
        *totals.entry(app.clone()).or_insert(0) += millis;
    }
}
