//! Unix socket server for the stw daemon.
//!
//! The server:
//! - Listens on a Unix socket for client connections
//! - Spawns a ConnectionHandler for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! ```text
//! ┌─────────────────┐
//! │   DaemonServer  │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  ServerContext  │  journal, limits,
//! │   (per client)  │     │                 │  monitor status, clock
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Server errors are logged and allow continued operation

mod connection;
mod report;

pub use connection::{ConnectionError, ConnectionHandler, MAX_MESSAGE_SIZE};
pub use report::{build_usage_report, live_session, MIN_REPORTED_MS};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use stw_core::{LimitStore, ResetHour};
use stw_protocol::MonitorStatus;
use tokio::net::UnixListener;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::journal::JournalHandle;
use crate::monitor::Clock;

/// Maximum number of concurrent client connections
const MAX_CONNECTIONS: usize = 64;

/// Everything a connection handler needs to answer requests.
pub struct ServerContext {
    pub journal: JournalHandle,
    pub limits: Arc<dyn LimitStore>,
    pub status: watch::Receiver<MonitorStatus>,
    pub clock: Arc<dyn Clock>,
    pub reset_hour: ResetHour,
}

/// Unix socket server for the stw daemon.
pub struct DaemonServer {
    socket_path: PathBuf,
    context: Arc<ServerContext>,
    cancel_token: CancellationToken,
    connection_counter: AtomicU64,
    connection_slots: Arc<Semaphore>,
}

impl DaemonServer {
    pub fn new(socket_path: impl Into<PathBuf>, context: ServerContext, cancel_token: CancellationToken) -> Self {
        Self {
            socket_path: socket_path.into(),
            context: Arc::new(context),
            cancel_token,
            connection_counter: AtomicU64::new(0),
            connection_slots: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the server until the cancellation token is triggered.
    pub async fn run(&self) -> Result<(), ServerError> {
        let setup_error = |e: std::io::Error| ServerError::SocketSetup {
            path: self.socket_path.clone(),
            error: e.to_string(),
        };

        // Remove a stale socket left by a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(setup_error)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(setup_error)?;
            }
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(setup_error)?;

        info!(socket = %self.socket_path.display(), "Daemon server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    fn handle_connection(&self, stream: tokio::net::UnixStream, connection_number: u64) {
        let Ok(permit) = Arc::clone(&self.connection_slots).try_acquire_owned() else {
            warn!(max = MAX_CONNECTIONS, "Too many clients, dropping connection");
            return;
        };

        let (reader, writer) = stream.into_split();
        let context = Arc::clone(&self.context);

        tokio::spawn(async move {
            let _permit = permit;
            ConnectionHandler::new(reader, writer, context, connection_number)
                .run()
                .await;
        });
    }

    fn cleanup(&self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Server cleanup complete");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}
