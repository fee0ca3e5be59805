//! Journal actor commands and errors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use stw_core::{AppId, ForegroundEvent};
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Journal Commands
// ============================================================================

/// Commands sent to the journal actor.
///
/// Queries carry a oneshot channel for the response.
#[derive(Debug)]
pub enum JournalCommand {
    /// Store one transition.
    ///
    /// # Errors
    /// - `JournalError::BlankApp` if the app identifier is empty
    /// - `JournalError::TooOld` if the event predates the retention horizon
    Record {
        event: ForegroundEvent,
        respond_to: oneshot::Sender<Result<(), JournalError>>,
    },

    /// Transitions with `start <= timestamp <= end`, oldest first.
    EventsBetween {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        respond_to: oneshot::Sender<Vec<ForegroundEvent>>,
    },

    /// Closed-interval foreground time per app within `[start, end]`.
    ForegroundTime {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        respond_to: oneshot::Sender<HashMap<AppId, u64>>,
    },

    /// Drop transitions older than the retention horizon.
    ///
    /// Fire-and-forget, sent by the prune task.
    Prune,
}

// ============================================================================
// Journal Errors
// ============================================================================

/// Errors that can occur during journal operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("application identifier must not be empty")]
    BlankApp,

    #[error("event at {timestamp} is older than the retention horizon")]
    TooOld { timestamp: DateTime<Utc> },

    /// The actor was shut down.
    #[error("journal channel closed")]
    ChannelClosed,
}
