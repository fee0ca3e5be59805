//! STW Core - Shared types for foreground usage monitoring
//!
//! This crate provides the domain types and pure decision logic shared
//! between the daemon (stwd) and the CLI (stw):
//! - `window` - daily accounting window anchored to a reset hour
//! - `event` - foreground transition events and interval aggregation
//! - `session` - the resilient current-session tracker
//! - `usage` - minutes-used accumulation
//! - `enforcement` - the block/notify decision and the blocked set
//! - `limits` - per-app budgets and their stores
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod app;
pub mod enforcement;
pub mod error;
pub mod event;
pub mod limits;
pub mod session;
pub mod usage;
pub mod window;

// Re-exports for convenience
pub use app::AppId;
pub use enforcement::{judge, BlockedSet, Verdict};
pub use error::{DomainError, DomainResult};
pub use event::{aggregate_foreground_time, last_foreground_app, EventKind, ForegroundEvent};
pub use limits::{JsonLimitStore, Limit, LimitChange, LimitSet, LimitStore, MemoryLimitStore, StoreError};
pub use session::{ForegroundSignal, SessionState, TrackedSession};
pub use usage::{format_usage, live_session_millis, recorded_until, usage_minutes, MILLIS_PER_MINUTE};
pub use window::{start_of_current_window, ResetHour, DEFAULT_RESET_HOUR};
