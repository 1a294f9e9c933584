//! Convergence planner - validates declarations and builds per-kind diffs

use crate::classifier::OwnershipClassifier;
use crate::diff::{DiffSummary, KindDiff};
use crate::error::Error;
use crate::store::ChildStore;
use crate::types::{ChildId, ChildKind, DeclaredSet, ParentId};
use std::collections::{BTreeMap, BTreeSet};

/// Old and new declarations for one kind, as written by the author
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredChange {
    pub old: Vec<ChildId>,
    pub new: Vec<ChildId>,
}

impl DeclaredChange {
    pub fn new<O, N>(old: O, new: N) -> Self
    where
        O: IntoIterator,
        O::Item: Into<ChildId>,
        N: IntoIterator,
        N::Item: Into<ChildId>,
    {
        Self {
            old: old.into_iter().map(Into::into).collect(),
            new: new.into_iter().map(Into::into).collect(),
        }
    }

    /// Every id mentioned by either declaration
    pub fn mentioned(&self) -> BTreeSet<ChildId> {
        self.old.iter().chain(&self.new).cloned().collect()
    }

    /// Ids dropped from the declaration, ignoring ownership
    pub fn dropped(&self) -> BTreeSet<ChildId> {
        let new: BTreeSet<&ChildId> = self.new.iter().collect();
        self.old
            .iter()
            .filter(|id| !new.contains(id))
            .cloned()
            .collect()
    }
}

/// A reconciliation request for one parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub parent: ParentId,
    pub kinds: BTreeMap<ChildKind, DeclaredChange>,
}

impl LinkRequest {
    pub fn new(parent: ParentId) -> Self {
        Self {
            parent,
            kinds: BTreeMap::new(),
        }
    }

    /// Add the declaration change for a kind
    pub fn with_kind(mut self, kind: ChildKind, change: DeclaredChange) -> Self {
        self.kinds.insert(kind, change);
        self
    }
}

/// Planning outcome for one kind
#[derive(Debug, Clone)]
pub enum PlannedKind {
    /// Declarations are valid and ownership is known
    Ready {
        diff: KindDiff,
        new: DeclaredSet,
    },
    /// Configuration or classification failed; nothing will be deleted
    Aborted {
        error: Error,
        change: DeclaredChange,
    },
}

impl PlannedKind {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn diff(&self) -> Option<&KindDiff> {
        match self {
            Self::Ready { diff, .. } => Some(diff),
            Self::Aborted { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Ready { .. } => None,
            Self::Aborted { error, .. } => Some(error),
        }
    }
}

/// A convergence plan for one parent
#[derive(Debug, Clone)]
pub struct ConvergencePlan {
    pub parent: ParentId,
    pub kinds: BTreeMap<ChildKind, PlannedKind>,
}

impl ConvergencePlan {
    /// Diffs of every kind that is ready to execute
    pub fn diffs(&self) -> impl Iterator<Item = &KindDiff> {
        self.kinds.values().filter_map(PlannedKind::diff)
    }

    /// Kinds whose planning failed
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.kinds.values().filter_map(PlannedKind::error)
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diffs(self.diffs())
    }

    /// Check if executing would delete anything
    pub fn has_deletions(&self) -> bool {
        self.diffs().any(KindDiff::has_deletions)
    }

    /// Check if every kind planned cleanly
    pub fn is_clean(&self) -> bool {
        self.kinds.values().all(PlannedKind::is_ready)
    }
}

/// Builds convergence plans against a child store
pub struct Planner<'a, S: ChildStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ChildStore + ?Sized> Planner<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Validate every kind, then classify and diff the valid ones.
    ///
    /// Validation runs for all kinds before the first remote call, so a
    /// duplicate declaration never triggers a query.
    pub fn plan(&self, request: &LinkRequest) -> ConvergencePlan {
        let mut validated = BTreeMap::new();
        for (kind, change) in &request.kinds {
            validated.insert(*kind, validate(*kind, change));
        }

        let classifier = OwnershipClassifier::new(self.store);
        let mut kinds = BTreeMap::new();

        for (kind, result) in validated {
            let change = &request.kinds[&kind];
            let planned = match result {
                Err(error) => {
                    log::warn!("Skipping {} of {}: {}", kind.label(), request.parent, error);
                    PlannedKind::Aborted {
                        error,
                        change: change.clone(),
                    }
                }
                Ok((old, new)) => match classifier.classify(&request.parent, kind) {
                    Ok(inherited) => {
                        let diff = KindDiff::compute(kind, &old, &new, &inherited);
                        for id in &diff.declared_inherited {
                            log::warn!(
                                "{} {} on {} is declared but inherited; it will not be managed",
                                kind,
                                id,
                                request.parent
                            );
                        }
                        PlannedKind::Ready { diff, new }
                    }
                    Err(error) => {
                        log::warn!("{}", error);
                        PlannedKind::Aborted {
                            error,
                            change: change.clone(),
                        }
                    }
                },
            };
            kinds.insert(kind, planned);
        }

        ConvergencePlan {
            parent: request.parent.clone(),
            kinds,
        }
    }
}

fn validate(
    kind: ChildKind,
    change: &DeclaredChange,
) -> crate::error::Result<(DeclaredSet, DeclaredSet)> {
    let old = DeclaredSet::from_declared(kind, change.old.iter().cloned())?;
    let new = DeclaredSet::from_declared(kind, change.new.iter().cloned())?;
    Ok((old, new))
}
