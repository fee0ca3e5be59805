//! Event journal using the actor pattern.
//!
//! Hook clients report foreground/background transitions to the daemon;
//! the journal keeps them in timestamp order and answers the two queries
//! the monitor needs: recent transitions and closed-interval foreground
//! time per application.
//!
//! ```text
//! ┌─────────────────┐  JournalCommand  ┌─────────────────┐
//! │ ConnectionHandler│────────────────▶│  JournalActor   │
//! └─────────────────┘  (mpsc channel)  │ VecDeque<Event> │
//! ┌─────────────────┐                  └─────────────────┘
//! │  UsageMonitor   │──── queries ────────────▲
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Channel operations handle closure gracefully

use chrono::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::debug;

mod actor;
mod commands;
mod handle;

pub use actor::{JournalActor, DEFAULT_RETENTION_HOURS, MAX_EVENTS};
pub use commands::{JournalCommand, JournalError};
pub use handle::JournalHandle;

const COMMAND_BUFFER: usize = 256;

/// Prune interval in seconds
const PRUNE_INTERVAL_SECS: u64 = 600;

/// Spawns the journal actor and its prune task.
///
/// The prune task holds only a weak sender, so the actor stops once
/// every [`JournalHandle`] is dropped.
pub fn spawn_journal(retention: Duration) -> JournalHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = JournalActor::new(cmd_rx, retention);
    tokio::spawn(actor.run());

    spawn_prune_task(cmd_tx.downgrade());

    JournalHandle::new(cmd_tx)
}

fn spawn_prune_task(sender: mpsc::WeakSender<JournalCommand>) {
    tokio::spawn(async move {
        let mut ticker = interval(std::time::Duration::from_secs(PRUNE_INTERVAL_SECS));

        loop {
            ticker.tick().await;

            let Some(sender) = sender.upgrade() else {
                debug!("Prune task stopping: journal dropped");
                break;
            };
            if sender.send(JournalCommand::Prune).await.is_err() {
                debug!("Prune task stopping: journal channel closed");
                break;
            }
        }
    });
}
