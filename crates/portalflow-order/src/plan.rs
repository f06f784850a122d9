//! Planned and applied changes for a converged collection

use crate::poll::SettleReport;
use crate::reconcile::ReconcileSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of remote call a change turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Create a new entry
    Create,
    /// Update an existing entry in place
    Update,
    /// Delete an entry
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change<K> {
    pub key: K,
    pub kind: ChangeKind,
    /// Half of a delete + create pair standing in for an identity change
    pub replacement: bool,
}

impl<K> Change<K> {
    fn new(key: K, kind: ChangeKind) -> Self {
        Self {
            key,
            kind,
            replacement: false,
        }
    }

    fn replacing(key: K, kind: ChangeKind) -> Self {
        Self {
            key,
            kind,
            replacement: true,
        }
    }
}

/// Ordered changes for one collection: deletes, then creates, then updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan<K> {
    pub changes: Vec<Change<K>>,

    /// Entries already matching the desired state
    pub unchanged: usize,
}

impl<K: Ord + Clone> Plan<K> {
    /// Order a diff into steps. Keys in `replaced` must be a subset of
    /// `set.to_update`; they become a delete followed by a create.
    pub fn from_diff(set: &ReconcileSet<K>, replaced: &BTreeSet<K>) -> Self {
        let mut changes = Vec::with_capacity(set.len() + replaced.len());

        for key in &set.to_delete {
            changes.push(Change::new(key.clone(), ChangeKind::Delete));
        }
        for key in replaced {
            changes.push(Change::replacing(key.clone(), ChangeKind::Delete));
        }
        for key in &set.to_create {
            changes.push(Change::new(key.clone(), ChangeKind::Create));
        }
        for key in replaced {
            changes.push(Change::replacing(key.clone(), ChangeKind::Create));
        }
        for key in set.to_update.difference(replaced) {
            changes.push(Change::new(key.clone(), ChangeKind::Update));
        }

        Self {
            changes,
            unchanged: set.unchanged.len(),
        }
    }
}

impl<K> Plan<K> {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Get changes by kind
    pub fn changes_by_kind(&self, kind: ChangeKind) -> Vec<&Change<K>> {
        self.changes.iter().filter(|c| c.kind == kind).collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        let count = |kind: ChangeKind, replacement: bool| {
            self.changes
                .iter()
                .filter(|c| c.kind == kind && c.replacement == replacement)
                .count()
        };

        PlanSummary {
            create: count(ChangeKind::Create, false),
            update: count(ChangeKind::Update, false),
            delete: count(ChangeKind::Delete, false),
            replace: count(ChangeKind::Create, true),
            no_change: self.unchanged,
        }
    }
}

/// Summary of planned changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub replace: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} to replace, {} unchanged",
            self.create, self.update, self.delete, self.replace, self.no_change
        )
    }
}

/// A change that was sent and settled
#[derive(Debug, Clone)]
pub struct AppliedChange<K> {
    pub change: Change<K>,

    /// Remote action that carried the change
    pub action: String,

    pub settle: SettleReport,
}

/// Result of converging one collection
#[derive(Debug, Clone)]
pub struct ConvergeReport<K> {
    /// Applied changes, in execution order
    pub applied: Vec<AppliedChange<K>>,

    pub summary: PlanSummary,

    pub started_at: DateTime<Utc>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl<K> ConvergeReport<K> {
    /// Nothing had to be sent
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }

    /// Changes whose action ended in a warning or failure the call site allowed
    pub fn tolerated(&self) -> impl Iterator<Item = &AppliedChange<K>> {
        self.applied.iter().filter(|a| a.settle.tolerated)
    }
}
