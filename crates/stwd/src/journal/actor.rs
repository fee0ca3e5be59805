//! Journal actor - owns the recorded foreground transitions.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures are ignored (the requester went away)

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use stw_core::{aggregate_foreground_time, AppId, EventKind, ForegroundEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::commands::{JournalCommand, JournalError};

/// Maximum number of transitions the journal holds.
pub const MAX_EVENTS: usize = 50_000;

/// Default retention for recorded transitions.
pub const DEFAULT_RETENTION_HOURS: i64 = 48;

/// The journal actor.
///
/// Receives commands via mpsc and processes them sequentially. Events
/// are kept ordered by timestamp; a late report is inserted at its
/// position rather than appended.
pub struct JournalActor {
    receiver: mpsc::Receiver<JournalCommand>,
    events: VecDeque<ForegroundEvent>,
    retention: Duration,
}

impl JournalActor {
    pub fn new(receiver: mpsc::Receiver<JournalCommand>, retention: Duration) -> Self {
        Self {
            receiver,
            events: VecDeque::new(),
            retention,
        }
    }

    /// Runs the actor until every sender is dropped.
    pub async fn run(mut self) {
        info!(retention_hours = self.retention.num_hours(), "Journal actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(events = self.events.len(), "Journal actor stopped");
    }

    fn handle_command(&mut self, cmd: JournalCommand) {
        match cmd {
            JournalCommand::Record { event, respond_to } => {
                let result = self.handle_record(event, Utc::now());
                let _ = respond_to.send(result);
            }
            JournalCommand::EventsBetween { start, end, respond_to } => {
                let _ = respond_to.send(self.handle_events_between(start, end));
            }
            JournalCommand::ForegroundTime { start, end, respond_to } => {
                let _ = respond_to.send(self.handle_foreground_time(start, end));
            }
            JournalCommand::Prune => {
                self.handle_prune(Utc::now());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_record(&mut self, event: ForegroundEvent, now: DateTime<Utc>) -> Result<(), JournalError> {
        if event.app.is_blank() {
            return Err(JournalError::BlankApp);
        }
        if event.timestamp < now - self.retention {
            return Err(JournalError::TooOld {
                timestamp: event.timestamp,
            });
        }

        if self.events.len() >= MAX_EVENTS {
            if let Some(dropped) = self.events.pop_front() {
                warn!(
                    max = MAX_EVENTS,
                    dropped_at = %dropped.timestamp,
                    "Journal full, dropping oldest event"
                );
            }
        }

        debug!(app = %event.app, kind = ?event.kind, timestamp = %event.timestamp, "Recording transition");

        // Insert after any event with the same timestamp to keep arrival order.
        let position = self.events.partition_point(|e| e.timestamp <= event.timestamp);
        self.events.insert(position, event);
        Ok(())
    }

    fn handle_events_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<ForegroundEvent> {
        let from = self.events.partition_point(|e| e.timestamp < start);
        self.events
            .iter()
            .skip(from)
            .take_while(|e| e.timestamp <= end)
            .cloned()
            .collect()
    }

    fn handle_foreground_time(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> HashMap<AppId, u64> {
        aggregate_foreground_time(self.events.make_contiguous(), start, end)
    }

    /// Drops events older than the retention horizon, keeping the last
    /// foreground transition before it so an interval spanning the
    /// horizon can still be closed.
    fn handle_prune(&mut self, now: DateTime<Utc>) {
        let horizon = now - self.retention;
        let expired = self.events.partition_point(|e| e.timestamp < horizon);
        if expired == 0 {
            return;
        }

        let keep_from = self
            .events
            .iter()
            .take(expired)
            .rposition(|e| e.kind == EventKind::MovedToForeground)
            .unwrap_or(expired);

        if keep_from == 0 {
            return;
        }

        self.events.drain(..keep_from);
        debug!(pruned = keep_from, remaining = self.events.len(), "Pruned expired transitions");
    }

    #[cfg(test)]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn create_actor() -> JournalActor {
        let (_tx, rx) = mpsc::channel(16);
        JournalActor::new(rx, Duration::hours(DEFAULT_RETENTION_HOURS))
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, h, m, 0).unwrap()
    }

    #[test]
    fn test_record_keeps_timestamp_order() {
        let mut actor = create_actor();
        let now = at(12, 0);

        actor.handle_record(ForegroundEvent::foreground(at(10, 5), "chat"), now).unwrap();
        actor.handle_record(ForegroundEvent::foreground(at(10, 0), "video"), now).unwrap();

        let events = actor.handle_events_between(at(9, 0), at(11, 0));
        let apps: Vec<&str> = events.iter().map(|e| e.app.as_str()).collect();
        assert_eq!(apps, vec!["video", "chat"]);
    }

    #[test]
    fn test_record_rejects_blank_and_expired() {
        let mut actor = create_actor();
        let now = at(12, 0);

        assert_eq!(
            actor.handle_record(ForegroundEvent::foreground(now, ""), now),
            Err(JournalError::BlankApp)
        );
        let ancient = now - Duration::hours(DEFAULT_RETENTION_HOURS + 1);
        assert!(matches!(
            actor.handle_record(ForegroundEvent::foreground(ancient, "video"), now),
            Err(JournalError::TooOld { .. })
        ));
        assert_eq!(actor.event_count(), 0);
    }

    #[test]
    fn test_events_between_is_inclusive() {
        let mut actor = create_actor();
        let now = at(12, 0);
        for m in [0, 10, 20] {
            actor.handle_record(ForegroundEvent::foreground(at(11, m), "video"), now).unwrap();
        }

        assert_eq!(actor.handle_events_between(at(11, 0), at(11, 10)).len(), 2);
        assert!(actor.handle_events_between(at(11, 21), at(11, 30)).is_empty());
    }

    #[test]
    fn test_foreground_time_counts_closed_intervals() {
        let mut actor = create_actor();
        let now = at(12, 0);
        actor.handle_record(ForegroundEvent::foreground(at(10, 0), "video"), now).unwrap();
        actor.handle_record(ForegroundEvent::foreground(at(10, 30), "chat"), now).unwrap();

        let totals = actor.handle_foreground_time(at(5, 0), now);
        assert_eq!(totals.get(&AppId::new("video")), Some(&(30 * 60_000)));
        // chat is still open
        assert!(totals.get(&AppId::new("chat")).is_none());
    }

    #[test]
    fn test_prune_keeps_last_foreground_before_horizon() {
        let (_tx, rx) = mpsc::channel(16);
        let mut actor = JournalActor::new(rx, Duration::hours(1));
        let now = at(12, 0);

        actor.handle_record(ForegroundEvent::foreground(at(11, 1), "chat"), now).unwrap();
        actor.handle_record(ForegroundEvent::background(at(11, 2), "chat"), now).unwrap();
        actor.handle_record(ForegroundEvent::foreground(at(11, 3), "video"), now).unwrap();
        actor.handle_record(ForegroundEvent::foreground(at(12, 0), "chat"), now).unwrap();

        actor.handle_prune(at(12, 30));

        let remaining = actor.handle_events_between(at(0, 0), at(23, 0));
        let apps: Vec<&str> = remaining.iter().map(|e| e.app.as_str()).collect();
        assert_eq!(apps, vec!["video", "chat"]);

        let totals = actor.handle_foreground_time(at(11, 30), at(12, 30));
        assert_eq!(totals.get(&AppId::new("video")), Some(&(30 * 60_000)));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut actor = create_actor();
        let now = at(12, 0);
        for i in 0..MAX_EVENTS + 1 {
            let ts = at(11, 0) + Duration::milliseconds(i as i64);
            actor.handle_record(ForegroundEvent::foreground(ts, "video"), now).unwrap();
        }
        assert_eq!(actor.event_count(), MAX_EVENTS);
    }
}
