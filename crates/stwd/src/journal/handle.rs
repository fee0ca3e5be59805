//! Client interface for the journal actor.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stw_core::{AppId, ForegroundEvent};
use tokio::sync::{mpsc, oneshot};

use super::commands::{JournalCommand, JournalError};
use crate::source::{SourceError, UsageSource};

/// Cheap-to-clone handle to the journal actor.
///
/// Also the daemon's [`UsageSource`]: the monitor queries the journal
/// through this handle.
#[derive(Clone)]
pub struct JournalHandle {
    sender: mpsc::Sender<JournalCommand>,
}

impl JournalHandle {
    pub fn new(sender: mpsc::Sender<JournalCommand>) -> Self {
        Self { sender }
    }

    /// Records one transition.
    ///
    /// # Errors
    ///
    /// - `JournalError::BlankApp` / `JournalError::TooOld` for rejected events
    /// - `JournalError::ChannelClosed` if the actor has shut down
    pub async fn record(&self, event: ForegroundEvent) -> Result<(), JournalError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(JournalCommand::Record { event, respond_to: tx })
            .await
            .map_err(|_| JournalError::ChannelClosed)?;

        rx.await.map_err(|_| JournalError::ChannelClosed)?
    }

    pub async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ForegroundEvent>, JournalError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(JournalCommand::EventsBetween { start, end, respond_to: tx })
            .await
            .map_err(|_| JournalError::ChannelClosed)?;

        rx.await.map_err(|_| JournalError::ChannelClosed)
    }

    pub async fn foreground_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<AppId, u64>, JournalError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(JournalCommand::ForegroundTime { start, end, respond_to: tx })
            .await
            .map_err(|_| JournalError::ChannelClosed)?;

        rx.await.map_err(|_| JournalError::ChannelClosed)
    }

    /// Triggers retention pruning without waiting for it.
    pub async fn prune(&self) {
        let _ = self.sender.send(JournalCommand::Prune).await;
    }
}

impl From<JournalError> for SourceError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::ChannelClosed => SourceError::Unavailable(err.to_string()),
            other => SourceError::Query(other.to_string()),
        }
    }
}

#[async_trait]
impl UsageSource for JournalHandle {
    async fn check_access(&self) -> Result<(), SourceError> {
        if self.sender.is_closed() {
            return Err(JournalError::ChannelClosed.into());
        }
        Ok(())
    }

    async fn query_foreground_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ForegroundEvent>, SourceError> {
        Ok(self.events_between(start, end).await?)
    }

    async fn query_aggregated_foreground_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<AppId, u64>, SourceError> {
        Ok(self.foreground_time(start, end).await?)
    }
}
