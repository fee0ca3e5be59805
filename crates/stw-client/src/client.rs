//! Request/response client for the stw daemon.
//!
//! This module provides the `DaemonClient` which handles:
//! - Connection to the daemon via Unix socket, with optional retry
//! - The `Connect` handshake and protocol version check
//! - One reply per request over newline-delimited JSON
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use stw_core::{AppId, EventKind};
use stw_protocol::{ClientMessage, DaemonMessage, MonitorStatus, ProtocolVersion, UsageReport};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the daemon client.
///
/// # Example
///
/// ```rust
/// use stw_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig {
///     socket_path: std::path::PathBuf::from("/tmp/my-daemon.sock"),
///     connect_attempts: 3,
///     ..Default::default()
/// };
/// assert_eq!(config.retry_initial_delay, Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path to the Unix socket where the daemon listens.
    pub socket_path: PathBuf,

    /// Total connection attempts before giving up. Zero behaves like one.
    pub connect_attempts: u32,

    /// Initial delay before first retry after connection failure.
    pub retry_initial_delay: Duration,

    /// Maximum delay between retry attempts.
    pub retry_max_delay: Duration,

    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry).
    pub retry_multiplier: f64,

    /// How long to wait for any single reply.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/stw.sock"),
            connect_attempts: 1,
            retry_initial_delay: Duration::from_millis(200),
            retry_max_delay: Duration::from_secs(2),
            retry_multiplier: 2.0,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn with_socket(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Daemon Client
// ============================================================================

/// A handshaken connection to the stw daemon.
///
/// # Connection Lifecycle
///
/// 1. Connect to the Unix socket, retrying with backoff if configured
/// 2. Send `Connect` and wait for `Connected` (or `Rejected`)
/// 3. Issue requests; each gets exactly one reply
/// 4. `disconnect()` tells the daemon the client is leaving
pub struct DaemonClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    client_id: String,
    daemon_version: ProtocolVersion,
    request_timeout: Duration,
}

impl DaemonClient {
    /// Connects and performs the handshake.
    pub async fn connect(config: &ClientConfig, client_id: Option<String>) -> Result<Self> {
        let stream = connect_with_retry(config).await?;
        let (reader, writer) = stream.into_split();

        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
            client_id: String::new(),
            daemon_version: ProtocolVersion::CURRENT,
            request_timeout: config.request_timeout,
        };

        client.handshake(client_id).await?;
        Ok(client)
    }

    /// The identifier the daemon assigned to this connection.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn daemon_version(&self) -> ProtocolVersion {
        self.daemon_version
    }

    async fn handshake(&mut self, client_id: Option<String>) -> Result<()> {
        match self.request(ClientMessage::connect(client_id)).await? {
            DaemonMessage::Connected {
                protocol_version,
                client_id,
            } => {
                if !ProtocolVersion::CURRENT.is_compatible_with(&protocol_version) {
                    return Err(ClientError::VersionMismatch {
                        client_version: ProtocolVersion::CURRENT.to_string(),
                        daemon_version: protocol_version.to_string(),
                    });
                }
                info!(
                    client_id,
                    protocol_version = %protocol_version,
                    "Handshake complete"
                );
                self.client_id = client_id;
                self.daemon_version = protocol_version;
                Ok(())
            }
            DaemonMessage::Rejected { protocol_version, .. } => Err(ClientError::VersionMismatch {
                client_version: ProtocolVersion::CURRENT.to_string(),
                daemon_version: protocol_version.to_string(),
            }),
            other => Err(unexpected(&other)),
        }
    }

    /// Sends one message and waits for its reply.
    ///
    /// Daemon `Error` replies are returned as-is; the typed helpers below
    /// turn them into `ClientError::Daemon`.
    pub async fn request(&mut self, message: ClientMessage) -> Result<DaemonMessage> {
        let json = serde_json::to_string(&message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        debug!(message_type = ?message.message, "Sent message to daemon");

        let mut line = String::new();
        let bytes_read = match timeout(self.request_timeout, self.reader.read_line(&mut line)).await {
            Ok(result) => result?,
            Err(_) => return Err(ClientError::Timeout),
        };
        if bytes_read == 0 {
            return Err(ClientError::Closed);
        }

        Ok(serde_json::from_str(line.trim())?)
    }

    /// Reports a foreground transition and returns the timestamp the daemon
    /// recorded for it.
    pub async fn report_transition(
        &mut self,
        kind: EventKind,
        app: AppId,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>> {
        match self.request(ClientMessage::transition(kind, app, timestamp)).await? {
            DaemonMessage::Recorded { timestamp, .. } => Ok(timestamp),
            other => Err(daemon_error_or_unexpected(other)),
        }
    }

    pub async fn report_foreground(&mut self, app: AppId) -> Result<DateTime<Utc>> {
        self.report_transition(EventKind::MovedToForeground, app, None).await
    }

    pub async fn report_background(&mut self, app: AppId) -> Result<DateTime<Utc>> {
        self.report_transition(EventKind::MovedToBackground, app, None).await
    }

    pub async fn query_usage(&mut self) -> Result<UsageReport> {
        match self.request(ClientMessage::query_usage()).await? {
            DaemonMessage::Usage { report } => Ok(report),
            other => Err(daemon_error_or_unexpected(other)),
        }
    }

    pub async fn status(&mut self) -> Result<MonitorStatus> {
        match self.request(ClientMessage::status()).await? {
            DaemonMessage::Status { status } => Ok(status),
            other => Err(daemon_error_or_unexpected(other)),
        }
    }

    pub async fn ping(&mut self, seq: u64) -> Result<()> {
        match self.request(ClientMessage::ping(seq)).await? {
            DaemonMessage::Pong { seq: echoed } if echoed == seq => Ok(()),
            other => Err(daemon_error_or_unexpected(other)),
        }
    }

    /// Tells the daemon this client is leaving. The daemon does not reply.
    pub async fn disconnect(mut self) -> Result<()> {
        let json = serde_json::to_string(&ClientMessage::disconnect())?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Attempts to connect with exponential backoff, up to
/// `config.connect_attempts` times.
async fn connect_with_retry(config: &ClientConfig) -> Result<UnixStream> {
    let attempts = config.connect_attempts.max(1);
    let mut delay = config.retry_initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);

        debug!(
            attempt,
            socket_path = %config.socket_path.display(),
            "Attempting to connect to daemon"
        );

        let message = match UnixStream::connect(&config.socket_path).await {
            Ok(stream) => {
                debug!(attempt, "Connection successful");
                return Ok(stream);
            }
            Err(e) => e.to_string(),
        };

        if attempt >= attempts {
            return Err(ClientError::Connect {
                path: config.socket_path.clone(),
                message,
            });
        }

        debug!(attempt, error = %message, "Connection attempt failed");
        sleep(delay).await;
        let next_delay_ms = (delay.as_millis() as f64 * config.retry_multiplier) as u64;
        delay = Duration::from_millis(next_delay_ms).min(config.retry_max_delay);
    }
}

fn daemon_error_or_unexpected(reply: DaemonMessage) -> ClientError {
    match reply {
        DaemonMessage::Error { message, code } => ClientError::Daemon { message, code },
        other => unexpected(&other),
    }
}

fn unexpected(reply: &DaemonMessage) -> ClientError {
    ClientError::UnexpectedReply(format!("{reply:?}"))
}
