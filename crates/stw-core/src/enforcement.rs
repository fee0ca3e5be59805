//! Block/notify decisions.
//!
//! Each application moves through `Unmonitored → WithinBudget → Breached`.
//! An app without a limit is never judged; the monitor skips it before
//! reading usage. `Breached` is terminal for the lifetime of a monitor run: membership
//! in the [`BlockedSet`] is what guarantees a breach is notified once.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::AppId;

/// Applications blocked during the current monitor run.
///
/// Only grows. A new run (daemon restart or supervisor retry) starts
/// with an empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockedSet {
    apps: BTreeSet<AppId>,
}

impl BlockedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, app: &AppId) -> bool {
        self.apps.contains(app)
    }

    /// Marks `app` as blocked. Returns true if it was not blocked before.
    pub fn block(&mut self, app: AppId) -> bool {
        self.apps.insert(app)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppId> {
        self.apps.iter()
    }
}

/// What the monitor must do for the tracked application this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Already blocked: send the user back to the home screen.
    Redirect,
    /// Limit configured and not reached.
    WithinBudget { used_minutes: u64, budget_minutes: u32 },
    /// Limit reached for the first time: redirect, then notify.
    Breach { used_minutes: u64, budget_minutes: u32 },
}

impl Verdict {
    /// Returns true if the home screen must be brought to the front.
    pub fn redirects(&self) -> bool {
        matches!(self, Self::Redirect | Self::Breach { .. })
    }

    /// Returns true if a breach notification must be emitted.
    pub fn notifies(&self) -> bool {
        matches!(self, Self::Breach { .. })
    }
}

/// Decides the verdict for `app` given its usage and budget.
///
/// On the first tick where `used_minutes >= budget_minutes` the app is
/// added to `blocked` and `Breach` is returned. Every later call for the
/// same app returns `Redirect`, whatever the usage, so the breach is
/// reported exactly once per run.
pub fn judge(blocked: &mut BlockedSet, app: &AppId, used_minutes: u64, budget_minutes: u32) -> Verdict {
    if blocked.contains(app) {
        return Verdict::Redirect;
    }

    if used_minutes >= u64::from(budget_minutes) {
        blocked.block(app.clone());
        return Verdict::Breach {
            used_minutes,
            budget_minutes,
        };
    }

    Verdict::WithinBudget {
        used_minutes,
        budget_minutes,
    }
}
