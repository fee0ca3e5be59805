//! Per-application daily budgets.
//!
//! A [`Limit`] exists only for applications with a positive budget.
//! Setting a budget of zero or less removes the limit entirely, which
//! puts the application back into the unmonitored state.

mod store;

pub use store::{JsonLimitStore, LimitStore, MemoryLimitStore, StoreError};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::AppId;

/// Daily budget for one application.
///
/// Serialized as `{"applicationIdentifier": "...", "budgetMinutes": N}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    #[serde(rename = "applicationIdentifier")]
    pub app: AppId,
    #[serde(rename = "budgetMinutes")]
    pub budget_minutes: u32,
}

impl Limit {
    /// Creates a limit, rejecting a zero budget.
    pub fn new(app: AppId, budget_minutes: u32) -> DomainResult<Self> {
        if budget_minutes == 0 {
            return Err(DomainError::InvalidFieldValue {
                field: "budget_minutes".to_string(),
                value: "0".to_string(),
                expected: "a positive number of minutes".to_string(),
            });
        }
        Ok(Self { app, budget_minutes })
    }
}

/// Result of applying a budget change to a [`LimitSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitChange {
    Added(Limit),
    Updated { previous: u32, limit: Limit },
    Removed(Limit),
    /// A removal for an app that had no limit.
    Unchanged,
}

/// The full set of configured limits, at most one per application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitSet {
    limits: Vec<Limit>,
}

impl LimitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from stored records.
    ///
    /// Records with a zero budget are dropped and, if an application
    /// appears more than once, the last record wins.
    pub fn from_records(records: Vec<Limit>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.apply(record.app, i64::from(record.budget_minutes));
        }
        set
    }

    /// Returns the limit for `app`, if one is configured.
    pub fn find(&self, app: &AppId) -> Option<&Limit> {
        self.limits.iter().find(|l| l.app == *app)
    }

    /// Sets the budget for `app`: upsert when positive, remove otherwise.
    pub fn apply(&mut self, app: AppId, budget_minutes: i64) -> LimitChange {
        let position = self.limits.iter().position(|l| l.app == app);

        let budget = match u32::try_from(budget_minutes) {
            Ok(minutes) if minutes > 0 => Some(minutes),
            _ if budget_minutes > 0 => Some(u32::MAX),
            _ => None,
        };

        match (position, budget) {
            (Some(index), Some(minutes)) => match self.limits.get_mut(index) {
                Some(existing) => {
                    let previous = existing.budget_minutes;
                    existing.budget_minutes = minutes;
                    LimitChange::Updated {
                        previous,
                        limit: existing.clone(),
                    }
                }
                None => LimitChange::Unchanged,
            },
            (Some(index), None) => LimitChange::Removed(self.limits.remove(index)),
            (None, Some(minutes)) => {
                let limit = Limit {
                    app,
                    budget_minutes: minutes,
                };
                self.limits.push(limit.clone());
                LimitChange::Added(limit)
            }
            (None, None) => LimitChange::Unchanged,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Limit> {
        self.limits.iter()
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    /// Returns the records in storage order.
    pub fn as_records(&self) -> &[Limit] {
        &self.limits
    }
}
