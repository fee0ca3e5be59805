//! One sampling tick: sample → track → accumulate → decide → act.

use std::fmt;
use std::sync::Arc;

use stw_core::{judge, recorded_until, usage_minutes, AppId, LimitSet, LimitStore, Verdict};
use tracing::{debug, info, warn};

use super::state::MonitorState;
use super::{MonitorConfig, MonitorError, TickTime};
use crate::actions::ActionSink;
use crate::launcher::LauncherClassifier;
use crate::source::{detect_foreground, SourceError, UsageSource};

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No application has been detected yet in this run.
    Idle,
    /// The tracked application is blocked; the home screen was requested.
    Redirected { app: AppId },
    /// The tracked application has no limit.
    Unmonitored { app: AppId },
    WithinBudget {
        app: AppId,
        used_minutes: u64,
        budget_minutes: u32,
    },
    /// The budget was reached on this tick; blocked and notified.
    Blocked {
        app: AppId,
        used_minutes: u64,
        budget_minutes: u32,
    },
    /// The usage query failed; retried on the next tick.
    Skipped { app: AppId, reason: String },
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Redirected { app } => write!(f, "redirected {app}"),
            Self::Unmonitored { app } => write!(f, "{app} unmonitored"),
            Self::WithinBudget {
                app,
                used_minutes,
                budget_minutes,
            } => write!(f, "{app} {used_minutes}/{budget_minutes} min"),
            Self::Blocked {
                app,
                used_minutes,
                budget_minutes,
            } => write!(f, "blocked {app} at {used_minutes}/{budget_minutes} min"),
            Self::Skipped { app, reason } => write!(f, "skipped {app}: {reason}"),
        }
    }
}

/// The usage monitor and its collaborators.
pub struct UsageMonitor {
    source: Arc<dyn UsageSource>,
    limits: Arc<dyn LimitStore>,
    launchers: Arc<dyn LauncherClassifier>,
    actions: Arc<dyn ActionSink>,
    config: MonitorConfig,
}

impl UsageMonitor {
    pub fn new(
        source: Arc<dyn UsageSource>,
        limits: Arc<dyn LimitStore>,
        launchers: Arc<dyn LauncherClassifier>,
        actions: Arc<dyn ActionSink>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            source,
            limits,
            launchers,
            actions,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Checks run once before the loop starts.
    ///
    /// # Errors
    ///
    /// - `MonitorError::PermissionDenied` if the usage source refuses access
    /// - `MonitorError::StartupRejected` if the action sink cannot be prepared
    /// - `MonitorError::Unexpected` for any other source failure
    pub async fn startup_checks(&self) -> Result<(), MonitorError> {
        match self.source.check_access().await {
            Ok(()) => {}
            Err(SourceError::PermissionDenied(reason)) => return Err(MonitorError::PermissionDenied(reason)),
            Err(e) => return Err(MonitorError::Unexpected(e.to_string())),
        }

        self.actions
            .prepare()
            .await
            .map_err(|e| MonitorError::StartupRejected(e.to_string()))
    }

    /// Runs one tick against `state`.
    ///
    /// A blocked app is redirected without reading limits or usage. A
    /// failed usage query skips the tick. Only an unreadable limit store
    /// ends the run.
    pub async fn tick(&self, state: &mut MonitorState, at: TickTime) -> Result<TickOutcome, MonitorError> {
        let signal = detect_foreground(
            self.source.as_ref(),
            self.launchers.as_ref(),
            at.now,
            self.config.foreground_lookback,
        )
        .await;

        let Some(app) = state.session.on_sample(&signal, at.now).cloned() else {
            debug!(signal = signal.label(), "No application tracked yet");
            return Ok(TickOutcome::Idle);
        };

        let verdict = if state.blocked.contains(&app) {
            debug!(app = %app, "Blocked application in front, redirecting");
            Verdict::Redirect
        } else {
            let limits = self.read_limits().await?;
            let Some(budget_minutes) = limits.find(&app).map(|l| l.budget_minutes) else {
                debug!(app = %app, "No limit configured");
                return Ok(TickOutcome::Unmonitored { app });
            };

            let until = recorded_until(&app, &state.session, at.window_start, at.now);
            let recorded = match self
                .source
                .query_aggregated_foreground_time(at.window_start, until)
                .await
            {
                Ok(recorded) => recorded,
                Err(e) => {
                    warn!(app = %app, error = %e, "Usage query failed, skipping tick");
                    return Ok(TickOutcome::Skipped {
                        app,
                        reason: e.to_string(),
                    });
                }
            };

            let historical_ms = recorded.get(&app).copied().unwrap_or(0);
            let used_minutes = usage_minutes(&app, historical_ms, &state.session, at.now);
            judge(&mut state.blocked, &app, used_minutes, budget_minutes)
        };

        match verdict {
            Verdict::Redirect => {
                self.return_to_home(&app).await;
                Ok(TickOutcome::Redirected { app })
            }
            Verdict::Breach {
                used_minutes,
                budget_minutes,
            } => {
                info!(
                    app = %app,
                    used_minutes,
                    budget_minutes,
                    window_start = %at.window_start,
                    "Budget reached, blocking application"
                );
                self.return_to_home(&app).await;
                self.notify_breach(&app, used_minutes, budget_minutes).await;
                Ok(TickOutcome::Blocked {
                    app,
                    used_minutes,
                    budget_minutes,
                })
            }
            Verdict::WithinBudget {
                used_minutes,
                budget_minutes,
            } => {
                debug!(app = %app, used_minutes, budget_minutes, "Within budget");
                Ok(TickOutcome::WithinBudget {
                    app,
                    used_minutes,
                    budget_minutes,
                })
            }
        }
    }

    /// Reads the limit snapshot off the async runtime.
    async fn read_limits(&self) -> Result<LimitSet, MonitorError> {
        let store = Arc::clone(&self.limits);
        tokio::task::spawn_blocking(move || store.get_all_limits())
            .await
            .map_err(|e| MonitorError::Unexpected(format!("limit store task failed: {e}")))?
            .map_err(|e| MonitorError::Unexpected(e.to_string()))
    }

    async fn return_to_home(&self, app: &AppId) {
        if let Err(e) = self.actions.return_to_home().await {
            warn!(app = %app, error = %e, "Failed to return to home screen");
        }
    }

    async fn notify_breach(&self, app: &AppId, used_minutes: u64, budget_minutes: u32) {
        if let Err(e) = self.actions.notify_breach(app, used_minutes, budget_minutes).await {
            warn!(app = %app, error = %e, "Failed to emit breach notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        let outcome = TickOutcome::Blocked {
            app: AppId::new("video"),
            used_minutes: 10,
            budget_minutes: 10,
        };
        assert_eq!(outcome.to_string(), "blocked video at 10/10 min");
        assert_eq!(TickOutcome::Idle.to_string(), "idle");
    }
}
