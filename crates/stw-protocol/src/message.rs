//! Protocol message types for daemon communication.

use crate::version::ProtocolVersion;
use crate::view::{MonitorStatus, UsageReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stw_core::{AppId, EventKind};

/// Message types that can be sent by clients to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    /// Client handshake/connection request
    Connect {
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// An application moved to the foreground
    Foreground {
        app: AppId,
        /// When the transition happened; the daemon clock is used if absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },

    /// An application moved to the background
    Background {
        app: AppId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Request per-app usage for the current window
    QueryUsage,

    /// Request the monitor loop status
    Status,

    /// Ping to check connection
    Ping { seq: u64 },

    /// Client disconnecting gracefully
    Disconnect,
}

/// Messages sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub protocol_version: ProtocolVersion,

    #[serde(flatten)]
    pub message: MessageType,
}

impl ClientMessage {
    /// Creates a new client message with current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            message,
        }
    }

    pub fn connect(client_id: Option<String>) -> Self {
        Self::new(MessageType::Connect { client_id })
    }

    /// Creates a transition report of the given kind.
    pub fn transition(kind: EventKind, app: AppId, timestamp: Option<DateTime<Utc>>) -> Self {
        match kind {
            EventKind::MovedToForeground => Self::new(MessageType::Foreground { app, timestamp }),
            EventKind::MovedToBackground => Self::new(MessageType::Background { app, timestamp }),
        }
    }

    pub fn foreground(app: AppId) -> Self {
        Self::transition(EventKind::MovedToForeground, app, None)
    }

    pub fn background(app: AppId) -> Self {
        Self::transition(EventKind::MovedToBackground, app, None)
    }

    pub fn query_usage() -> Self {
        Self::new(MessageType::QueryUsage)
    }

    pub fn status() -> Self {
        Self::new(MessageType::Status)
    }

    pub fn ping(seq: u64) -> Self {
        Self::new(MessageType::Ping { seq })
    }

    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect)
    }
}

/// Messages sent from daemon to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Connection accepted
    Connected {
        protocol_version: ProtocolVersion,
        client_id: String,
    },

    /// Connection rejected (version mismatch, etc.)
    Rejected {
        reason: String,
        /// Daemon's protocol version (for client to upgrade)
        protocol_version: ProtocolVersion,
    },

    /// A transition report was stored in the journal
    Recorded {
        app: AppId,
        kind: EventKind,
        timestamp: DateTime<Utc>,
    },

    /// Response to `query_usage`
    Usage { report: UsageReport },

    /// Response to `status`
    Status { status: MonitorStatus },

    /// Pong response to ping
    Pong { seq: u64 },

    /// Error response
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl DaemonMessage {
    pub fn connected(client_id: String) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            client_id,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    pub fn recorded(app: AppId, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self::Recorded { app, kind, timestamp }
    }

    pub fn usage(report: UsageReport) -> Self {
        Self::Usage { report }
    }

    pub fn status(status: MonitorStatus) -> Self {
        Self::Status { status }
    }

    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: None,
        }
    }

    pub fn error_with_code(message: &str, code: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: Some(code.to_string()),
        }
    }
}
