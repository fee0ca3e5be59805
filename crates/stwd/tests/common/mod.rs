//! Fakes shared by the stwd integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use stw_core::{AppId, ForegroundEvent, LimitChange, LimitSet, LimitStore, ResetHour, StoreError};
use stwd::actions::{ActionError, ActionSink};
use stwd::monitor::{Clock, MonitorConfig, TickTime};
use stwd::source::{SourceError, UsageSource};

/// Reset hour used throughout the tests.
pub fn reset_hour() -> ResetHour {
    ResetHour::new(5).unwrap()
}

pub fn fast_config() -> MonitorConfig {
    MonitorConfig {
        reset_hour: reset_hour(),
        tick_interval: Duration::from_millis(10),
        foreground_lookback: chrono::Duration::seconds(60),
    }
}

pub fn app(id: &str) -> AppId {
    AppId::new(id)
}

pub fn minutes(n: u64) -> u64 {
    n * 60_000
}

// ============================================================================
// Usage source
// ============================================================================

#[derive(Default)]
struct SourceState {
    events: Vec<ForegroundEvent>,
    aggregate: HashMap<AppId, u64>,
    aggregate_error: Option<SourceError>,
    access_error: Option<SourceError>,
    aggregate_queries: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Scriptable usage source.
#[derive(Default)]
pub struct FakeSource {
    state: Mutex<SourceState>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: ForegroundEvent) {
        self.state.lock().unwrap().events.push(event);
    }

    pub fn set_recorded(&self, app: &AppId, millis: u64) {
        self.state.lock().unwrap().aggregate.insert(app.clone(), millis);
    }

    pub fn fail_aggregate(&self, error: Option<SourceError>) {
        self.state.lock().unwrap().aggregate_error = error;
    }

    /// Bounds of every aggregate query so far, oldest first.
    pub fn aggregate_queries(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.state.lock().unwrap().aggregate_queries.clone()
    }

    pub fn deny_access(&self, reason: &str) {
        self.state.lock().unwrap().access_error = Some(SourceError::PermissionDenied(reason.to_string()));
    }
}

#[async_trait]
impl UsageSource for FakeSource {
    async fn check_access(&self) -> Result<(), SourceError> {
        match &self.state.lock().unwrap().access_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn query_foreground_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ForegroundEvent>, SourceError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect())
    }

    async fn query_aggregated_foreground_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<AppId, u64>, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.aggregate_queries.push((start, end));
        match &state.aggregate_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.aggregate.clone()),
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Home,
    Notify { app: AppId, used: u64, budget: u32 },
}

/// Action sink that records every call.
#[derive(Default)]
pub struct RecordingActions {
    actions: Mutex<Vec<Action>>,
    prepare_error: Option<ActionError>,
}

impl RecordingActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_prepare(program: &str) -> Self {
        Self {
            actions: Mutex::default(),
            prepare_error: Some(ActionError::NotFound {
                program: program.to_string(),
            }),
        }
    }

    pub fn taken(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> usize {
        self.taken()
            .iter()
            .filter(|a| matches!(a, Action::Notify { .. }))
            .count()
    }
}

#[async_trait]
impl ActionSink for RecordingActions {
    async fn prepare(&self) -> Result<(), ActionError> {
        match &self.prepare_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn return_to_home(&self) -> Result<(), ActionError> {
        self.actions.lock().unwrap().push(Action::Home);
        Ok(())
    }

    async fn notify_breach(&self, app: &AppId, used_minutes: u64, budget_minutes: u32) -> Result<(), ActionError> {
        self.actions.lock().unwrap().push(Action::Notify {
            app: app.clone(),
            used: used_minutes,
            budget: budget_minutes,
        });
        Ok(())
    }
}

// ============================================================================
// Limit store
// ============================================================================

/// Limit store whose reads always fail.
#[derive(Default)]
pub struct BrokenLimitStore {
    reads: AtomicUsize,
}

impl BrokenLimitStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl LimitStore for BrokenLimitStore {
    fn get_all_limits(&self) -> Result<LimitSet, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Io {
            path: "/nonexistent/limits.json".into(),
            message: "disk went away".to_string(),
        })
    }

    fn set_limit(&self, _app: &AppId, _budget_minutes: i64) -> Result<LimitChange, StoreError> {
        Err(StoreError::Serialize("read-only".to_string()))
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn at(now: DateTime<FixedOffset>) -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(now) })
    }

    /// 2024-06-15 04:00 at UTC+2, one hour before the reset.
    pub fn before_reset() -> Arc<Self> {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        Self::at(tz.with_ymd_and_hms(2024, 6, 15, 4, 0, 0).unwrap())
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn now(&self) -> TickTime {
        self.tick_time(reset_hour())
    }
}

impl Clock for ManualClock {
    fn tick_time(&self, reset_hour: ResetHour) -> TickTime {
        TickTime::at(&*self.now.lock().unwrap(), reset_hour)
    }
}

/// Real time, with a window that started an hour ago.
pub struct TrailingHourClock;

impl Clock for TrailingHourClock {
    fn tick_time(&self, _reset_hour: ResetHour) -> TickTime {
        let now = Utc::now();
        TickTime {
            now,
            window_start: now - chrono::Duration::hours(1),
        }
    }
}
