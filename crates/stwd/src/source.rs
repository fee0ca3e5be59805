//! Usage source abstraction and foreground detection.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use stw_core::{last_foreground_app, AppId, ForegroundEvent, ForegroundSignal};
use thiserror::Error;
use tracing::debug;

use crate::launcher::LauncherClassifier;

/// Errors reported by a usage source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Access to usage data was revoked or never granted.
    #[error("usage access denied: {0}")]
    PermissionDenied(String),

    /// The source is not running.
    #[error("usage source unavailable: {0}")]
    Unavailable(String),

    /// A single query failed; later queries may succeed.
    #[error("usage query failed: {0}")]
    Query(String),
}

/// Provider of foreground transitions and recorded foreground time.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Verifies the source can be queried at all. Called before the
    /// monitor loop starts.
    async fn check_access(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Transitions with `start <= timestamp <= end`, oldest first.
    async fn query_foreground_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ForegroundEvent>, SourceError>;

    /// Milliseconds of closed foreground intervals per app within
    /// `[start, end]`.
    async fn query_aggregated_foreground_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<AppId, u64>, SourceError>;
}

/// Samples the foreground application over the trailing `lookback`.
///
/// The last "moved to foreground" transition wins. Every outcome other
/// than a regular application is reported as its own signal variant.
pub async fn detect_foreground(
    source: &dyn UsageSource,
    launchers: &dyn LauncherClassifier,
    now: DateTime<Utc>,
    lookback: Duration,
) -> ForegroundSignal {
    let events = match source.query_foreground_events(now - lookback, now).await {
        Ok(events) => events,
        Err(e) => {
            debug!(error = %e, "Foreground query failed");
            return ForegroundSignal::QueryFailed(e.to_string());
        }
    };

    match last_foreground_app(&events) {
        Some(app) if launchers.is_home_launcher(app) => ForegroundSignal::Launcher(app.clone()),
        Some(app) => ForegroundSignal::Detected(app.clone()),
        None => ForegroundSignal::NoEvents,
    }
}
