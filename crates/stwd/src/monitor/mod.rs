//! The usage monitor loop.
//!
//! One long-lived task samples the foreground application every tick,
//! updates the session tracker, accumulates usage against the daily
//! window and enforces budgets. The [`MonitorState`] it mutates is owned
//! by that task alone; readers get copies through a `watch` channel.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Cancellation is observed both while ticking and while sleeping

mod state;
mod tick;

pub use state::MonitorState;
pub use tick::{TickOutcome, UsageMonitor};

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use stw_core::{start_of_current_window, ResetHour};
use stw_protocol::MonitorStatus;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default sampling interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(3);

/// Monitor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub reset_hour: ResetHour,
    pub tick_interval: Duration,
    /// Trailing window searched for the last foreground transition.
    pub foreground_lookback: chrono::Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reset_hour: ResetHour::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            foreground_lookback: chrono::Duration::seconds(60),
        }
    }
}

/// Failures that end a monitor run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Usage access is missing; the loop never starts.
    #[error("usage access denied: {0}")]
    PermissionDenied(String),

    /// The host refused to start the loop.
    #[error("monitor start rejected: {0}")]
    StartupRejected(String),

    #[error("unexpected monitor failure: {0}")]
    Unexpected(String),
}

// ============================================================================
// Clock
// ============================================================================

/// The instants one tick works with, both in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTime {
    pub now: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
}

impl TickTime {
    /// Resolves the window start in `now`'s time zone.
    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: ResetHour) -> Self {
        Self {
            now: now.with_timezone(&Utc),
            window_start: start_of_current_window(now, reset_hour).with_timezone(&Utc),
        }
    }
}

/// Source of wall-clock time for the monitor and usage reports.
pub trait Clock: Send + Sync {
    fn tick_time(&self, reset_hour: ResetHour) -> TickTime;
}

/// The system clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn tick_time(&self, reset_hour: ResetHour) -> TickTime {
        TickTime::at(&Local::now(), reset_hour)
    }
}

// ============================================================================
// Loop
// ============================================================================

/// Runs the monitor until cancelled or a tick fails fatally.
///
/// Startup checks run first; a fresh [`MonitorState`] is created for
/// this run. Every tick publishes a status copy to `status`.
///
/// # Errors
///
/// Returns the [`MonitorError`] that ended the run. `Ok(())` means the
/// run was cancelled.
pub async fn run_monitor(
    monitor: &UsageMonitor,
    clock: &dyn Clock,
    cancel: &CancellationToken,
    status: &watch::Sender<MonitorStatus>,
) -> Result<(), MonitorError> {
    monitor.startup_checks().await?;

    let config = monitor.config().clone();
    let mut state = MonitorState::new();
    let mut last_tick_at = None;

    info!(
        reset_hour = %config.reset_hour,
        interval_ms = config.tick_interval.as_millis() as u64,
        "Usage monitor started"
    );
    status.send_replace(state.status(true, None, None));

    let result = loop {
        let at = clock.tick_time(config.reset_hour);

        let outcome = tokio::select! {
            biased;

            _ = cancel.cancelled() => break Ok(()),
            outcome = monitor.tick(&mut state, at) => outcome,
        };

        match outcome {
            Ok(outcome) => {
                debug!(outcome = %outcome, "Tick complete");
                last_tick_at = Some(at.now);
                status.send_replace(state.status(true, last_tick_at, Some(outcome.to_string())));
            }
            Err(e) => break Err(e),
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break Ok(()),
            _ = sleep(config.tick_interval) => {}
        }
    };

    status.send_modify(|s| s.running = false);
    match &result {
        Ok(()) => info!(blocked = state.blocked.len(), "Usage monitor stopped"),
        Err(e) => info!(error = %e, last_tick_at = ?last_tick_at, "Usage monitor ended"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_tick_time_uses_local_window() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 6, 15, 4, 0, 0).unwrap();
        let at = TickTime::at(&now, ResetHour::new(5).unwrap());

        assert_eq!(at.now, Utc.with_ymd_and_hms(2024, 6, 15, 2, 0, 0).unwrap());
        assert_eq!(at.window_start, Utc.with_ymd_and_hms(2024, 6, 14, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_monitor_error_display() {
        let err = MonitorError::StartupRejected("command not found: wmctrl".to_string());
        assert!(err.to_string().contains("wmctrl"));
    }
}
