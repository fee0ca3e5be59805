//! STW Protocol - Wire protocol for daemon communication
//!
//! This crate provides the newline-delimited JSON messages exchanged
//! between hook clients / the `stw` CLI and the `stwd` daemon: foreground
//! transition reports, usage and status queries, and their replies.

pub mod message;
pub mod version;
pub mod view;

pub use message::{ClientMessage, DaemonMessage, MessageType};
pub use version::{ProtocolVersion, VersionError};
pub use view::{AppUsageEntry, MonitorStatus, UsageReport};
