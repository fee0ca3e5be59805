//! Session tracking across noisy foreground samples.
//!
//! The foreground query underneath is only reliable over short windows
//! and regularly misses events. The tracker therefore treats every
//! sample that names no application as noise: the current session is
//! kept until a *different* application is positively detected.
//!
//! The consequence is intentional: an application that really went to
//! the background keeps accruing session time until the next detected
//! switch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AppId;

/// Outcome of one foreground detection sample.
///
/// Only `Detected` carries evidence of a foreground application. The
/// other three variants are distinguished for logging and tests but are
/// all treated as "no application" by [`SessionState::on_sample`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForegroundSignal {
    /// A regular application moved to the foreground.
    Detected(AppId),
    /// The home screen / launcher is in front.
    Launcher(AppId),
    /// No foreground transition in the lookback window.
    NoEvents,
    /// The usage source could not be queried.
    QueryFailed(String),
}

impl ForegroundSignal {
    /// Returns the detected application, if this sample names one.
    pub fn detected_app(&self) -> Option<&AppId> {
        match self {
            Self::Detected(app) => Some(app),
            Self::Launcher(_) | Self::NoEvents | Self::QueryFailed(_) => None,
        }
    }

    /// Short label used in structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Detected(_) => "detected",
            Self::Launcher(_) => "launcher",
            Self::NoEvents => "no_events",
            Self::QueryFailed(_) => "query_failed",
        }
    }
}

/// The application currently attributed with foreground time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSession {
    pub app: AppId,
    pub started_at: DateTime<Utc>,
}

impl TrackedSession {
    /// Milliseconds since the session started, zero if `now` is earlier.
    pub fn elapsed_millis(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.started_at).num_milliseconds()).unwrap_or(0)
    }

    /// Where recorded time for this app must stop being counted.
    ///
    /// Everything from the session start on is live time, so the recorded
    /// aggregate ends there. Kept within `[window_start, now]`.
    pub fn recorded_until(&self, window_start: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        self.started_at.min(now).max(window_start)
    }
}

/// Current-session state, owned by the monitor loop.
///
/// Starts untracked. Once an application has been detected there is
/// always a tracked session; it is only replaced, never cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    tracked: Option<TrackedSession>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one sample and returns the application now attributed.
    pub fn on_sample(&mut self, signal: &ForegroundSignal, now: DateTime<Utc>) -> Option<&AppId> {
        match signal.detected_app() {
            Some(detected) => {
                let is_switch = self
                    .tracked
                    .as_ref()
                    .map_or(true, |session| session.app != *detected);

                if is_switch {
                    debug!(
                        app = %detected,
                        previous = ?self.tracked.as_ref().map(|s| s.app.as_str()),
                        "New foreground app, starting session"
                    );
                    self.tracked = Some(TrackedSession {
                        app: detected.clone(),
                        started_at: now,
                    });
                }
            }
            None => {
                if let Some(session) = &self.tracked {
                    debug!(
                        app = %session.app,
                        signal = signal.label(),
                        "No foreground app in sample, keeping current session"
                    );
                }
            }
        }

        self.tracked_app()
    }

    /// Returns the tracked application, if any.
    pub fn tracked_app(&self) -> Option<&AppId> {
        self.tracked.as_ref().map(|s| &s.app)
    }

    /// Returns the tracked session, if any.
    pub fn tracked(&self) -> Option<&TrackedSession> {
        self.tracked.as_ref()
    }

    /// Returns the session start if `app` is the tracked application.
    pub fn session_start_for(&self, app: &AppId) -> Option<DateTime<Utc>> {
        self.tracked
            .as_ref()
            .filter(|s| s.app == *app)
            .map(|s| s.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn detected(app: &str) -> ForegroundSignal {
        ForegroundSignal::Detected(AppId::new(app))
    }

    #[test]
    fn test_noise_preserves_session_until_switch() {
        let mut state = SessionState::new();
        let samples = [
            detected("A"),
            ForegroundSignal::NoEvents,
            detected("A"),
            ForegroundSignal::NoEvents,
            ForegroundSignal::NoEvents,
            detected("B"),
        ];

        let mut starts = Vec::new();
        for (i, sample) in samples.iter().enumerate() {
            let now = t0() + Duration::seconds(3 * i64::try_from(i).unwrap());
            state.on_sample(sample, now);
            starts.push(state.tracked().cloned().unwrap());
        }

        for session in starts.iter().take(5) {
            assert_eq!(session.app, AppId::new("A"));
            assert_eq!(session.started_at, t0());
        }
        let last = starts.last().unwrap();
        assert_eq!(last.app, AppId::new("B"));
        assert_eq!(last.started_at, t0() + Duration::seconds(15));
    }

    #[test]
    fn test_untracked_stays_untracked() {
        let mut state = SessionState::new();
        assert_eq!(state.on_sample(&ForegroundSignal::NoEvents, t0()), None);
        assert_eq!(state.on_sample(&ForegroundSignal::NoEvents, t0()), None);
        assert!(state.tracked().is_none());
    }

    #[test]
    fn test_launcher_and_failure_do_not_reset() {
        let mut state = SessionState::new();
        state.on_sample(&detected("A"), t0());

        let later = t0() + Duration::minutes(1);
        state.on_sample(&ForegroundSignal::Launcher(AppId::new("home")), later);
        state.on_sample(&ForegroundSignal::QueryFailed("denied".into()), later);

        assert_eq!(state.tracked_app(), Some(&AppId::new("A")));
        assert_eq!(state.session_start_for(&AppId::new("A")), Some(t0()));
    }

    #[test]
    fn test_launcher_never_starts_a_session() {
        let mut state = SessionState::new();
        let app = state.on_sample(&ForegroundSignal::Launcher(AppId::new("home")), t0());
        assert_eq!(app, None);
    }

    #[test]
    fn test_same_app_does_not_restart_session() {
        let mut state = SessionState::new();
        state.on_sample(&detected("A"), t0());
        state.on_sample(&detected("A"), t0() + Duration::minutes(5));
        assert_eq!(state.session_start_for(&AppId::new("A")), Some(t0()));
    }

    #[test]
    fn test_session_start_only_for_tracked_app() {
        let mut state = SessionState::new();
        state.on_sample(&detected("A"), t0());
        assert_eq!(state.session_start_for(&AppId::new("B")), None);
    }

    #[test]
    fn test_signal_detected_app() {
        assert_eq!(detected("A").detected_app(), Some(&AppId::new("A")));
        assert_eq!(ForegroundSignal::Launcher(AppId::new("home")).detected_app(), None);
        assert_eq!(ForegroundSignal::NoEvents.detected_app(), None);
        assert_eq!(ForegroundSignal::QueryFailed("x".into()).detected_app(), None);
    }
}
