//! State owned by one monitor run.

use chrono::{DateTime, Utc};
use stw_core::{BlockedSet, SessionState};
use stw_protocol::MonitorStatus;

/// Session tracker and blocked set for one monitor run.
///
/// Owned by the loop task and passed into each tick. A new run always
/// starts from [`MonitorState::new`], which is how a restart clears the
/// blocked set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    pub session: SessionState,
    pub blocked: BlockedSet,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only copy published to status readers.
    pub fn status(&self, running: bool, last_tick_at: Option<DateTime<Utc>>, last_outcome: Option<String>) -> MonitorStatus {
        let tracked = self.session.tracked();
        MonitorStatus {
            running,
            tracked_app: tracked.map(|s| s.app.clone()),
            session_started_at: tracked.map(|s| s.started_at),
            blocked: self.blocked.iter().cloned().collect(),
            last_tick_at,
            last_outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stw_core::{AppId, ForegroundSignal};

    #[test]
    fn test_status_reflects_session_and_blocked() {
        let mut state = MonitorState::new();
        let now = Utc::now();
        state
            .session
            .on_sample(&ForegroundSignal::Detected(AppId::new("video")), now);
        state.blocked.block(AppId::new("chat"));

        let status = state.status(true, Some(now), Some("idle".to_string()));
        assert!(status.running);
        assert_eq!(status.tracked_app, Some(AppId::new("video")));
        assert_eq!(status.session_started_at, Some(now));
        assert_eq!(status.blocked, vec![AppId::new("chat")]);
    }
}
