//! STW Client - request/response access to the stw daemon
//!
//! Used by the `stw` CLI and by hook scripts to report foreground
//! transitions and to query usage and monitor status.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

pub mod client;
pub mod error;

pub use client::{ClientConfig, DaemonClient};
pub use error::{ClientError, Result};
