//! Error types for the daemon client.
//!
//! Connection errors suggest checking whether the daemon is running;
//! protocol errors usually mean the CLI and daemon versions differ.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Could not reach the daemon socket.
    #[error("Failed to connect to daemon at {path}: {message} (is stwd running?)")]
    Connect { path: PathBuf, message: String },

    #[error("Protocol version mismatch (client: {client_version}, daemon: {daemon_version})")]
    VersionMismatch {
        client_version: String,
        daemon_version: String,
    },

    /// The daemon answered with something other than the expected reply.
    #[error("Unexpected reply from daemon: {0}")]
    UnexpectedReply(String),

    /// The daemon reported an error for the request.
    #[error("Daemon error: {message}")]
    Daemon { message: String, code: Option<String> },

    #[error("Daemon closed the connection")]
    Closed,

    #[error("Timed out waiting for the daemon")]
    Timeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
