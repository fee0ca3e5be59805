//! STW Daemon - foreground usage journal, budget monitor and query server
//!
//! This crate provides the core infrastructure for the stw daemon:
//! - `config` - TOML configuration with defaults
//! - `source` / `launcher` / `actions` - seams to the outside world
//! - `journal` - event journal actor, the daemon's usage source
//! - `monitor` - the periodic sample → decide → act loop
//! - `supervisor` - restarts the monitor according to its lifecycle result
//! - `server` - Unix socket server for hook clients and the CLI
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          stwd daemon                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌─────────────────┐  record   ┌─────────────────────────┐   │
//! │  │  DaemonServer   │──────────▶│      JournalActor       │   │
//! │  │ (Unix Socket)   │           │ (foreground transitions)│   │
//! │  └────────┬────────┘           └────────────┬────────────┘   │
//! │           │ status                          │ UsageSource    │
//! │           │                                 ▼                │
//! │  ┌────────┴────────┐  watch    ┌─────────────────────────┐   │
//! │  │  MonitorStatus  │◀──────────│  Supervisor → Monitor   │   │
//! │  └─────────────────┘           │  (LimitStore, Actions)  │   │
//! │                                └─────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod actions;
pub mod config;
pub mod journal;
pub mod launcher;
pub mod monitor;
pub mod server;
pub mod source;
pub mod supervisor;
