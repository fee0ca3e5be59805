//! Host scheduler for the usage monitor.
//!
//! Runs the monitor in its own task and decides, from the way a run
//! ended, whether to start another one:
//!
//! | Run ended with              | Lifecycle result   | Supervisor     |
//! |-----------------------------|--------------------|----------------|
//! | cancellation                | `Cancelled`        | stops          |
//! | `PermissionDenied`          | `PermanentFailure` | stops          |
//! | `StartupRejected`           | `PermanentFailure` | stops          |
//! | `Unexpected` or a panic     | `Retry`            | restarts later |
//!
//! Every restart begins with a fresh monitor state.

use std::sync::Arc;
use std::time::Duration;

use stw_protocol::MonitorStatus;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::monitor::{run_monitor, Clock, MonitorError, UsageMonitor};

/// How a monitor run ended, from the host's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleResult {
    Cancelled,
    PermanentFailure,
    Retry,
}

impl MonitorError {
    pub fn outcome(&self) -> LifecycleResult {
        match self {
            Self::PermissionDenied(_) | Self::StartupRejected(_) => LifecycleResult::PermanentFailure,
            Self::Unexpected(_) => LifecycleResult::Retry,
        }
    }
}

/// Exponential backoff between monitor restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (2.0 doubles the delay).
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    fn next_delay(&self, delay: Duration) -> Duration {
        let next_ms = (delay.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(next_ms).min(self.max_delay)
    }
}

/// Supervises monitor runs until cancellation or a permanent failure.
///
/// A run that lasted longer than `max_delay` resets the backoff.
pub async fn supervise(
    monitor: Arc<UsageMonitor>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    status: Arc<watch::Sender<MonitorStatus>>,
    retry: RetryPolicy,
) -> LifecycleResult {
    let mut delay = retry.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);
        let started = Instant::now();

        let run = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            let clock = Arc::clone(&clock);
            let cancel = cancel.clone();
            let status = Arc::clone(&status);
            async move { run_monitor(&monitor, clock.as_ref(), &cancel, &status).await }
        });

        let result = match run.await {
            Ok(result) => result,
            Err(e) => {
                status.send_modify(|s| s.running = false);
                Err(MonitorError::Unexpected(format!("monitor task failed: {e}")))
            }
        };

        let error = match result {
            Ok(()) => {
                info!(attempt, "Monitor cancelled");
                return LifecycleResult::Cancelled;
            }
            Err(e) => e,
        };

        match error.outcome() {
            LifecycleResult::Retry => {}
            outcome => {
                error!(error = %error, attempt, "Monitor failed permanently");
                status.send_modify(|s| s.last_outcome = Some(error.to_string()));
                return outcome;
            }
        }

        if started.elapsed() > retry.max_delay {
            delay = retry.initial_delay;
        }

        warn!(
            error = %error,
            attempt,
            retry_in_ms = delay.as_millis() as u64,
            "Monitor run failed, restarting"
        );
        status.send_modify(|s| s.last_outcome = Some(error.to_string()));

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Monitor restart cancelled");
                return LifecycleResult::Cancelled;
            }
            _ = sleep(delay) => {
                delay = retry.next_delay(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            MonitorError::PermissionDenied("revoked".into()).outcome(),
            LifecycleResult::PermanentFailure
        );
        assert_eq!(
            MonitorError::StartupRejected("no helper".into()).outcome(),
            LifecycleResult::PermanentFailure
        );
        assert_eq!(MonitorError::Unexpected("io".into()).outcome(), LifecycleResult::Retry);
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            multiplier: 2.0,
        };
        let mut delay = policy.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..4 {
            delay = policy.next_delay(delay);
            seen.push(delay.as_millis());
        }
        assert_eq!(seen, vec![1000, 2000, 3000, 3000]);
    }
}
