//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Performs protocol version negotiation
//! - Records transition reports in the journal
//! - Answers usage and status queries
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use stw_core::{AppId, EventKind, ForegroundEvent};
use stw_protocol::{ClientMessage, DaemonMessage, MessageType, ProtocolVersion};

use super::report::{build_usage_report, live_session};
use super::ServerContext;

/// Maximum message size (64 KB)
pub const MAX_MESSAGE_SIZE: usize = 65_536;

/// Read timeout for idle connections
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Write timeout
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection handler for a single client.
pub struct ConnectionHandler {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    context: Arc<ServerContext>,
    client_id: Option<String>,
    connection_number: u64,
}

impl ConnectionHandler {
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        context: Arc<ServerContext>,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            context,
            client_id: None,
            connection_number,
        }
    }

    /// Performs the handshake, then serves requests until the client
    /// disconnects.
    pub async fn run(mut self) {
        debug!(connection = self.connection_number, "New client connected");

        if let Err(e) = self.handle_handshake().await {
            warn!(connection = self.connection_number, error = %e, "Handshake failed");
            return;
        }
        debug!(client_id = ?self.client_id, "Client handshake completed");

        if let Err(e) = self.process_messages().await {
            debug!(client_id = ?self.client_id, error = %e, "Connection closed");
        }

        debug!(client_id = ?self.client_id, "Client disconnected");
    }

    /// Expects `Connect` with a compatible protocol version.
    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::Timeout),
        };

        let client_version = msg.protocol_version;
        if let Err(e) = client_version.check_current() {
            warn!(
                client_version = %client_version,
                server_version = %ProtocolVersion::CURRENT,
                "Protocol version mismatch"
            );

            self.send_message(DaemonMessage::rejected(&format!(
                "Protocol version {client_version} not compatible with server version {}",
                ProtocolVersion::CURRENT
            )))
            .await?;

            return Err(ConnectionError::Version(e));
        }

        match msg.message {
            MessageType::Connect { client_id } => {
                let assigned_id = client_id.unwrap_or_else(|| format!("client-{}", self.connection_number));
                self.client_id = Some(assigned_id.clone());
                self.send_message(DaemonMessage::connected(assigned_id)).await
            }
            other => {
                self.send_message(DaemonMessage::error("Expected Connect message for handshake"))
                    .await?;
                Err(ConnectionError::UnexpectedMessage(format!("{other:?}")))
            }
        }
    }

    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::Eof)) => return Ok(()),
                Ok(Err(e @ ConnectionError::ParseError(_))) => {
                    // Malformed line: report it and keep the connection.
                    self.send_message(DaemonMessage::error_with_code(&e.to_string(), "parse"))
                        .await?;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(ConnectionError::Timeout),
            };

            match self.handle_message(msg).await {
                Ok(()) => {}
                Err(ConnectionError::Eof) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    async fn handle_message(&mut self, msg: ClientMessage) -> Result<(), ConnectionError> {
        match msg.message {
            MessageType::Connect { .. } => {
                self.send_message(DaemonMessage::error("Already connected")).await?;
            }

            MessageType::Foreground { app, timestamp } => {
                self.handle_transition(EventKind::MovedToForeground, app, timestamp)
                    .await?;
            }

            MessageType::Background { app, timestamp } => {
                self.handle_transition(EventKind::MovedToBackground, app, timestamp)
                    .await?;
            }

            MessageType::QueryUsage => {
                let reply = self.handle_query_usage().await;
                self.send_message(reply).await?;
            }

            MessageType::Status => {
                let status = self.context.status.borrow().clone();
                self.send_message(DaemonMessage::status(status)).await?;
            }

            MessageType::Ping { seq } => {
                self.send_message(DaemonMessage::pong(seq)).await?;
            }

            MessageType::Disconnect => {
                debug!(client_id = ?self.client_id, "Client requested disconnect");
                return Err(ConnectionError::Eof);
            }
        }

        Ok(())
    }

    async fn handle_transition(
        &mut self,
        kind: EventKind,
        app: AppId,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), ConnectionError> {
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let event = ForegroundEvent::new(timestamp, kind, app.clone());

        match self.context.journal.record(event).await {
            Ok(()) => {
                info!(app = %app, kind = ?kind, "Transition recorded");
                self.send_message(DaemonMessage::recorded(app, kind, timestamp)).await
            }
            Err(e) => {
                warn!(app = %app, error = %e, "Transition rejected");
                self.send_message(DaemonMessage::error_with_code(&e.to_string(), "journal"))
                    .await
            }
        }
    }

    async fn handle_query_usage(&self) -> DaemonMessage {
        let window = self.context.clock.tick_time(self.context.reset_hour);
        let status = self.context.status.borrow().clone();

        let recorded = match self.context.journal.foreground_time(window.window_start, window.now).await {
            Ok(recorded) => recorded,
            Err(e) => return DaemonMessage::error_with_code(&e.to_string(), "journal"),
        };

        // Recorded time of the tracked app stops where its live session starts.
        let before_session = match live_session(&status) {
            Some(live) => {
                let until = live.recorded_until(window.window_start, window.now);
                match self.context.journal.foreground_time(window.window_start, until).await {
                    Ok(totals) => totals.get(&live.app).copied().unwrap_or(0),
                    Err(e) => return DaemonMessage::error_with_code(&e.to_string(), "journal"),
                }
            }
            None => 0,
        };

        let store = Arc::clone(&self.context.limits);
        let limits = match tokio::task::spawn_blocking(move || store.get_all_limits()).await {
            Ok(Ok(limits)) => limits,
            Ok(Err(e)) => return DaemonMessage::error_with_code(&e.to_string(), "limits"),
            Err(e) => return DaemonMessage::error_with_code(&e.to_string(), "limits"),
        };

        DaemonMessage::usage(build_usage_report(recorded, before_session, &status, &limits, window))
    }

    /// Reads a single newline-terminated message.
    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut buf = Vec::new();

        // Bounded read: one byte past the limit is enough to reject.
        let bytes_read = (&mut self.reader)
            .take(MAX_MESSAGE_SIZE as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if buf.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: buf.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let msg: ClientMessage =
            serde_json::from_slice(&buf).map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        debug!(
            client_id = ?self.client_id,
            message_type = ?std::mem::discriminant(&msg.message),
            "Received message"
        );

        Ok(msg)
    }

    async fn send_message(&mut self, msg: DaemonMessage) -> Result<(), ConnectionError> {
        let json = serde_json::to_string(&msg).map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        let writer = &mut self.writer;
        match timeout(WRITE_TIMEOUT, async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Version(#[from] stw_protocol::VersionError),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err: ConnectionError = ProtocolVersion::new(2, 0)
            .check_current()
            .unwrap_err()
            .into();
        assert!(err.to_string().contains("2.0"));
        assert!(err.to_string().contains("1.0"));
    }

    #[test]
    fn test_message_size_error() {
        let err = ConnectionError::MessageTooLarge {
            size: 70_000,
            max: MAX_MESSAGE_SIZE,
        };
        assert!(err.to_string().contains("70000"));
    }
}
