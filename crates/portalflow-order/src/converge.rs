//! Converging a nested collection of an order to a desired set
//!
//! A [`Collection`] describes one kind of nested entity (buckets, users, ACL
//! rules, topics, ...): how to read the current entries from the item tree,
//! how to compare them, and which action creates, updates or deletes one.
//! [`ResourceConverger`] runs the same sequence for every collection:
//!
//! 1. validate every desired entry locally, before any network call
//! 2. resync the order and read the current entries from it
//! 3. diff, turning identity changes into delete + create
//! 4. apply deletes, then creates, then updates, settling after each call
//!
//! The first failing call stops the batch. Changes applied before it stay
//! applied; running the convergence again picks up from the remote state.

use crate::error::{OrderError, Result};
use crate::item::{ItemState, ItemTree};
use crate::order::Order;
use crate::plan::{AppliedChange, Change, ChangeKind, ConvergeReport, Plan};
use crate::poll::PollPolicy;
use crate::reconcile::{ReconcileSet, diff};
use crate::service::ActionRequest;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

/// One kind of nested entity inside an order
pub trait Collection {
    /// Unique name of an entry (bucket name, user name, ACL identity, ...)
    type Key: Ord + Clone + Display;

    /// Declared shape of an entry
    type Spec;

    /// Human-readable collection name used in logs and errors
    fn name(&self) -> &str;

    /// Read the current entries from a freshly resynced item tree.
    fn current(&self, items: &ItemTree) -> Result<BTreeMap<Self::Key, Self::Spec>>;

    /// Whether a current entry already matches the desired one.
    fn equal(&self, desired: &Self::Spec, current: &Self::Spec) -> bool;

    /// Whether the change touches a field that identifies the entry remotely
    /// and therefore cannot be updated in place.
    fn identity_changed(&self, _desired: &Self::Spec, _current: &Self::Spec) -> bool {
        false
    }

    /// Local shape checks for a desired entry.
    fn validate(&self, _key: &Self::Key, _spec: &Self::Spec) -> Result<()> {
        Ok(())
    }

    /// Root state the order must be in before anything is changed.
    fn required_state(&self) -> Option<ItemState> {
        None
    }

    /// Poll policy for the settle wait after each call.
    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::quick()
    }

    fn create(&self, items: &ItemTree, key: &Self::Key, desired: &Self::Spec)
    -> Result<ActionRequest>;

    fn update(
        &self,
        items: &ItemTree,
        key: &Self::Key,
        desired: &Self::Spec,
        current: &Self::Spec,
    ) -> Result<ActionRequest>;

    fn delete(&self, items: &ItemTree, key: &Self::Key, current: &Self::Spec)
    -> Result<ActionRequest>;
}

/// Drives a [`Collection`] of one order to a desired set
pub struct ResourceConverger<'c, C: Collection> {
    collection: &'c C,
}

/// A plan together with the specs it was computed from
struct Prepared<K, V> {
    plan: Plan<K>,
    current: BTreeMap<K, V>,
}

impl<'c, C: Collection> ResourceConverger<'c, C> {
    pub fn new(collection: &'c C) -> Self {
        Self { collection }
    }

    /// Check every desired entry; the first invalid one fails the batch.
    pub fn validate(&self, desired: &BTreeMap<C::Key, C::Spec>) -> Result<()> {
        for (key, spec) in desired {
            self.collection.validate(key, spec).map_err(|e| match e {
                OrderError::Validation(message) => OrderError::Validation(format!(
                    "{} '{}': {}",
                    self.collection.name(),
                    key,
                    message
                )),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Diff against a current snapshot without touching the network.
    pub fn diff(
        &self,
        desired: &BTreeMap<C::Key, C::Spec>,
        current: &BTreeMap<C::Key, C::Spec>,
    ) -> Plan<C::Key> {
        let set: ReconcileSet<C::Key> =
            diff(desired, current, |want, have| self.collection.equal(want, have));

        let replaced: BTreeSet<C::Key> = set
            .to_update
            .iter()
            .filter(|key| match (desired.get(*key), current.get(*key)) {
                (Some(want), Some(have)) => self.collection.identity_changed(want, have),
                _ => false,
            })
            .cloned()
            .collect();

        Plan::from_diff(&set, &replaced)
    }

    /// Validate, resync and diff: what [`converge`](Self::converge) would send.
    pub async fn plan(
        &self,
        order: &mut Order,
        desired: &BTreeMap<C::Key, C::Spec>,
    ) -> Result<Plan<C::Key>> {
        Ok(self.prepare(order, desired).await?.plan)
    }

    async fn prepare(
        &self,
        order: &mut Order,
        desired: &BTreeMap<C::Key, C::Spec>,
    ) -> Result<Prepared<C::Key, C::Spec>> {
        self.validate(desired)?;

        order.resync().await?;
        let current = self.collection.current(order.items())?;
        let plan = self.diff(desired, &current);

        tracing::debug!(
            "{} on order {}: {}",
            self.collection.name(),
            order.id(),
            plan.summary()
        );
        Ok(Prepared { plan, current })
    }

    /// Apply the minimal set of changes that makes the collection match
    /// `desired`.
    pub async fn converge(
        &self,
        order: &mut Order,
        desired: &BTreeMap<C::Key, C::Spec>,
    ) -> Result<ConvergeReport<C::Key>> {
        let started_at = Utc::now();
        let start = std::time::Instant::now();

        let Prepared { plan, current } = self.prepare(order, desired).await?;
        let summary = plan.summary();
        let mut applied = Vec::with_capacity(plan.changes.len());

        if plan.has_changes() {
            if let Some(state) = self.collection.required_state() {
                order.require_state(&state)?;
            }
            tracing::info!(
                "Converging {} on order {}: {}",
                self.collection.name(),
                order.id(),
                summary
            );
        }

        let policy = self.collection.poll_policy();

        for (completed, change) in plan.changes.into_iter().enumerate() {
            let outcome = self.apply(order, &change, desired, &current, &policy).await;
            match outcome {
                Ok(applied_change) => applied.push(applied_change),
                Err(source) => {
                    tracing::warn!(
                        "Stopping {} convergence on order {} at {} '{}': {}",
                        self.collection.name(),
                        order.id(),
                        change.kind,
                        change.key,
                        source
                    );
                    return Err(OrderError::PartialApply {
                        collection: self.collection.name().to_string(),
                        key: change.key.to_string(),
                        change: change.kind,
                        completed,
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(ConvergeReport {
            applied,
            summary,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn apply(
        &self,
        order: &mut Order,
        change: &Change<C::Key>,
        desired: &BTreeMap<C::Key, C::Spec>,
        current: &BTreeMap<C::Key, C::Spec>,
        policy: &PollPolicy,
    ) -> Result<AppliedChange<C::Key>> {
        let missing = |side: &str| {
            OrderError::NotFound(format!(
                "{} spec for {} '{}'",
                side,
                self.collection.name(),
                change.key
            ))
        };

        let request = match change.kind {
            ChangeKind::Create => {
                let want = desired.get(&change.key).ok_or_else(|| missing("desired"))?;
                self.collection.create(order.items(), &change.key, want)?
            }
            ChangeKind::Update => {
                let want = desired.get(&change.key).ok_or_else(|| missing("desired"))?;
                let have = current.get(&change.key).ok_or_else(|| missing("current"))?;
                self.collection.update(order.items(), &change.key, want, have)?
            }
            ChangeKind::Delete => {
                let have = current.get(&change.key).ok_or_else(|| missing("current"))?;
                self.collection.delete(order.items(), &change.key, have)?
            }
        };

        let settle = order.perform(&request, policy).await?;

        Ok(AppliedChange {
            change: change.clone(),
            action: request.name,
            settle,
        })
    }
}
