//! Minutes-used accumulation.

use chrono::{DateTime, Utc};

use crate::{AppId, SessionState};

/// Milliseconds in one minute.
pub const MILLIS_PER_MINUTE: u64 = 60_000;

/// Milliseconds of the live, not-yet-recorded session for `app`.
///
/// Zero unless `app` is the tracked application. A session start in the
/// future (clock adjusted backwards) also yields zero.
pub fn live_session_millis(app: &AppId, session: &SessionState, now: DateTime<Utc>) -> u64 {
    session
        .tracked()
        .filter(|tracked| tracked.app == *app)
        .map_or(0, |tracked| tracked.elapsed_millis(now))
}

/// End of the recorded-time query for `app`.
///
/// For the tracked application this is the start of its live session:
/// time after that is added live by [`usage_minutes`], and a recorded
/// interval past it (a launcher visit, a repeated foreground report)
/// would otherwise be counted twice. Any other app is queried up to `now`.
pub fn recorded_until(
    app: &AppId,
    session: &SessionState,
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    session
        .tracked()
        .filter(|tracked| tracked.app == *app)
        .map_or(now, |tracked| tracked.recorded_until(window_start, now))
}

/// Total whole minutes used by `app` in the current window.
///
/// `historical_ms` is the recorded foreground time of `app` from the
/// window start up to [`recorded_until`], as reported by the usage source. The live session is
/// added only for the tracked application. Partial minutes are floored,
/// so a budget of N minutes is reached only after N full minutes.
pub fn usage_minutes(app: &AppId, historical_ms: u64, session: &SessionState, now: DateTime<Utc>) -> u64 {
    let live_ms = live_session_millis(app, session, now);
    historical_ms.saturating_add(live_ms) / MILLIS_PER_MINUTE
}

/// Formats a duration for display: "2h 5m", "12m" or "< 1m".
pub fn format_usage(millis: u64) -> String {
    let total_minutes = millis / MILLIS_PER_MINUTE;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        "< 1m".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ForegroundSignal;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn tracking(app: &str, started_at: DateTime<Utc>) -> SessionState {
        let mut state = SessionState::new();
        state.on_sample(&ForegroundSignal::Detected(AppId::new(app)), started_at);
        state
    }

    #[test]
    fn test_tracked_app_adds_live_session() {
        let state = tracking("chat", now() - Duration::minutes(2));
        let used = usage_minutes(&AppId::new("chat"), 5 * MILLIS_PER_MINUTE, &state, now());
        assert_eq!(used, 7);
    }

    #[test]
    fn test_untracked_app_has_no_live_delta() {
        let state = tracking("browser", now() - Duration::minutes(2));
        let used = usage_minutes(&AppId::new("chat"), 5 * MILLIS_PER_MINUTE, &state, now());
        assert_eq!(used, 5);
    }

    #[test]
    fn test_no_session_at_all() {
        let used = usage_minutes(&AppId::new("chat"), 3 * MILLIS_PER_MINUTE, &SessionState::new(), now());
        assert_eq!(used, 3);
    }

    #[test]
    fn test_partial_minutes_are_floored() {
        let state = tracking("chat", now() - Duration::seconds(59));
        let used = usage_minutes(&AppId::new("chat"), 4 * MILLIS_PER_MINUTE + 59_000, &state, now());
        // 4m59s + 59s = 5m58s
        assert_eq!(used, 5);
    }

    #[test]
    fn test_future_session_start_counts_zero() {
        let state = tracking("chat", now() + Duration::minutes(3));
        assert_eq!(live_session_millis(&AppId::new("chat"), &state, now()), 0);
    }

    #[test]
    fn test_recorded_time_ends_at_session_start() {
        let window_start = now() - Duration::hours(7);
        let started_at = now() - Duration::minutes(2);
        let state = tracking("chat", started_at);

        assert_eq!(recorded_until(&AppId::new("chat"), &state, window_start, now()), started_at);
        assert_eq!(recorded_until(&AppId::new("video"), &state, window_start, now()), now());
    }

    #[test]
    fn test_recorded_until_stays_inside_window() {
        let window_start = now() - Duration::hours(1);
        let app = AppId::new("chat");

        let before_reset = tracking("chat", window_start - Duration::minutes(10));
        assert_eq!(recorded_until(&app, &before_reset, window_start, now()), window_start);

        let future = tracking("chat", now() + Duration::minutes(1));
        assert_eq!(recorded_until(&app, &future, window_start, now()), now());
    }

    #[test]
    fn test_format_usage() {
        assert_eq!(format_usage(0), "< 1m");
        assert_eq!(format_usage(59_999), "< 1m");
        assert_eq!(format_usage(5 * MILLIS_PER_MINUTE), "5m");
        assert_eq!(format_usage(65 * MILLIS_PER_MINUTE), "1h 5m");
        assert_eq!(format_usage(120 * MILLIS_PER_MINUTE), "2h 0m");
    }
}
