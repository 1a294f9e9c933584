//! Convergence driver - executes deletion plans in dependency order

use crate::context::ProgressCallback;
use crate::diff::DiffSummary;
use crate::error::{Error, StoreError};
use crate::planner::{ConvergencePlan, LinkRequest, PlannedKind, Planner};
use crate::store::ChildStore;
use crate::types::{ChildId, ChildKind, ConvergeOptions, ParentId};
use std::collections::{BTreeMap, BTreeSet};

/// Final status of one kind after a convergence pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindStatus {
    /// Every planned deletion succeeded (or none were needed)
    Converged,
    /// At least one delete call failed
    Partial,
    /// Deletions were held back because a referencing kind did not settle
    Blocked { by: ChildKind },
    /// Planning failed; nothing was deleted
    Aborted(Error),
}

/// Outcome of one kind
#[derive(Debug, Clone)]
pub struct KindOutcome {
    pub kind: ChildKind,
    pub status: KindStatus,
    /// Ids confirmed deleted
    pub deleted: BTreeSet<ChildId>,
    /// Failed delete calls and ids a call did not confirm
    pub failures: Vec<Error>,
    /// Planned ids that were never sent
    pub not_attempted: BTreeSet<ChildId>,
    /// Dropped ids kept because they are inherited
    pub kept_inherited: BTreeSet<ChildId>,
    /// Declared set to use as the previous declaration on the next pass
    pub carry_forward: BTreeSet<ChildId>,
    pending: BTreeSet<ChildId>,
}

impl KindOutcome {
    fn new(kind: ChildKind, status: KindStatus) -> Self {
        Self {
            kind,
            status,
            deleted: BTreeSet::new(),
            failures: Vec::new(),
            not_attempted: BTreeSet::new(),
            kept_inherited: BTreeSet::new(),
            carry_forward: BTreeSet::new(),
            pending: BTreeSet::new(),
        }
    }

    /// Ids whose delete call failed
    pub fn failed_ids(&self) -> BTreeSet<ChildId> {
        self.failures
            .iter()
            .filter_map(|e| match e {
                Error::Deletion { ids, .. } => Some(ids.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Ids that may still need deleting after this pass
    pub fn pending(&self) -> &BTreeSet<ChildId> {
        &self.pending
    }

    /// Check if nothing is left outstanding for this kind
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_converged(&self) -> bool {
        self.status == KindStatus::Converged
    }

    /// The planning error, if the kind was aborted
    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            KindStatus::Aborted(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of a convergence pass for one parent
#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    pub parent: ParentId,
    pub outcomes: BTreeMap<ChildKind, KindOutcome>,
}

impl ConvergenceReport {
    /// Check if every kind converged
    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(KindOutcome::is_converged)
    }

    /// Total number of deleted ids
    pub fn deleted_count(&self) -> usize {
        self.outcomes.values().map(|o| o.deleted.len()).sum()
    }

    /// Every error raised during planning or deletion
    pub fn errors(&self) -> Vec<&Error> {
        self.outcomes
            .values()
            .flat_map(|o| o.error().into_iter().chain(o.failures.iter()))
            .collect()
    }

    /// Previous declaration to carry into the next pass for a kind
    pub fn carry_forward(&self, kind: ChildKind) -> Option<&BTreeSet<ChildId>> {
        self.outcomes.get(&kind).map(|o| &o.carry_forward)
    }
}

/// Executes convergence plans against a child store
pub struct ConvergenceDriver<'a, S: ChildStore + ?Sized> {
    store: &'a S,
    options: ConvergeOptions,
}

impl<'a, S: ChildStore + ?Sized> ConvergenceDriver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            options: ConvergeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConvergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Plan and execute in one step
    pub fn converge<P: ProgressCallback>(
        &self,
        request: &LinkRequest,
        progress: &mut P,
    ) -> ConvergenceReport {
        let plan = Planner::new(self.store).plan(request);
        self.execute(plan, progress)
    }

    /// Execute a plan.
    ///
    /// Kinds run in [`ChildKind::deletion_order`]. A kind is blocked when a
    /// kind that references it still has outstanding deletions.
    pub fn execute<P: ProgressCallback>(
        &self,
        mut plan: ConvergencePlan,
        progress: &mut P,
    ) -> ConvergenceReport {
        let summary = DiffSummary::from_diffs(plan.diffs());
        log::debug!(
            "Converging {}: {} deletions planned, {} inherited kept",
            plan.parent,
            summary.deletions,
            summary.kept_inherited
        );

        let mut outcomes: BTreeMap<ChildKind, KindOutcome> = BTreeMap::new();

        for kind in ChildKind::deletion_order() {
            let Some(planned) = plan.kinds.remove(kind) else {
                continue;
            };

            let outcome = match planned {
                PlannedKind::Aborted { error, change } => {
                    let mut outcome = KindOutcome::new(*kind, KindStatus::Aborted(error));
                    outcome.pending = change.dropped();
                    outcome.carry_forward = change.mentioned();
                    outcome
                }
                PlannedKind::Ready { diff, new } => {
                    let blocker = kind
                        .referenced_by()
                        .iter()
                        .find(|k| outcomes.get(*k).is_some_and(|o| !o.is_settled()));

                    let mut outcome = match blocker {
                        Some(by) if diff.has_deletions() => {
                            log::warn!(
                                "Holding back {} {} of {}: {} did not settle",
                                diff.deletions.len(),
                                kind.label(),
                                plan.parent,
                                by.label()
                            );
                            let mut outcome =
                                KindOutcome::new(*kind, KindStatus::Blocked { by: *by });
                            outcome.not_attempted = diff.deletions.as_set().clone();
                            outcome
                        }
                        _ => self.delete_kind(*kind, diff.deletions.into_set(), progress),
                    };

                    outcome.kept_inherited = diff.kept_inherited;
                    outcome.pending = outcome
                        .failed_ids()
                        .into_iter()
                        .chain(outcome.not_attempted.iter().cloned())
                        .collect();
                    outcome.carry_forward = new
                        .into_set()
                        .into_iter()
                        .chain(outcome.pending.iter().cloned())
                        .collect();
                    outcome
                }
            };

            progress.on_kind_complete(&outcome);
            outcomes.insert(*kind, outcome);
        }

        ConvergenceReport {
            parent: plan.parent,
            outcomes,
        }
    }

    /// Delete one kind's ids in batches, stopping at the first failed call
    fn delete_kind<P: ProgressCallback>(
        &self,
        kind: ChildKind,
        ids: BTreeSet<ChildId>,
        progress: &mut P,
    ) -> KindOutcome {
        let mut outcome = KindOutcome::new(kind, KindStatus::Converged);
        if ids.is_empty() {
            return outcome;
        }

        progress.on_kind_start(kind, ids.len());

        let ids: Vec<ChildId> = ids.into_iter().collect();
        for batch in ids.chunks(self.options.batch_size.max(1)) {
            if !outcome.failures.is_empty() {
                outcome.not_attempted.extend(batch.iter().cloned());
                continue;
            }

            match self.store.delete(kind, batch) {
                Ok(confirmed) => {
                    let confirmed: BTreeSet<ChildId> = confirmed.into_iter().collect();
                    let (deleted, unconfirmed): (Vec<ChildId>, Vec<ChildId>) =
                        batch.iter().cloned().partition(|id| confirmed.contains(id));

                    if !deleted.is_empty() {
                        log::info!("Deleted {} {}", deleted.len(), kind.label());
                        progress.on_batch_deleted(kind, &deleted);
                        outcome.deleted.extend(deleted);
                    }
                    if !unconfirmed.is_empty() {
                        let source = StoreError::new("delete not confirmed by the remote system");
                        log::warn!(
                            "{} of {} {} not confirmed deleted",
                            unconfirmed.len(),
                            batch.len(),
                            kind.label()
                        );
                        progress.on_batch_failed(kind, &unconfirmed, &source.reason);
                        outcome.failures.push(Error::Deletion {
                            kind,
                            ids: unconfirmed,
                            source,
                        });
                    }
                }
                Err(source) => {
                    log::warn!("Delete of {} {} failed: {}", batch.len(), kind.label(), source);
                    progress.on_batch_failed(kind, batch, &source.reason);
                    outcome.failures.push(Error::Deletion {
                        kind,
                        ids: batch.to_vec(),
                        source,
                    });
                }
            }
        }

        if !outcome.failures.is_empty() {
            outcome.status = KindStatus::Partial;
        }
        outcome
    }
}
