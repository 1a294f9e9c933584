//! Three-way diff of declared sets against the live inherited set

use crate::types::{ChildId, ChildKind, DeclaredSet, DeletionPlan, InheritedSet};
use std::collections::BTreeSet;

/// Compute the ids to delete for one kind.
///
/// ```text
/// candidates = old - new
/// deletions  = candidates - inherited
/// ```
///
/// The result depends only on set membership, never on declaration order.
pub fn diff(old: &DeclaredSet, new: &DeclaredSet, inherited: &InheritedSet) -> DeletionPlan {
    old.iter()
        .filter(|id| !new.contains(id))
        .filter(|id| !inherited.contains(id))
        .cloned()
        .collect()
}

/// Full diff for one kind, including what was held back and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindDiff {
    pub kind: ChildKind,
    /// Ids that will be deleted
    pub deletions: DeletionPlan,
    /// Dropped from the declaration but inherited, so kept
    pub kept_inherited: BTreeSet<ChildId>,
    /// Declared now while also inherited
    pub declared_inherited: BTreeSet<ChildId>,
    /// Newly declared ids not present in the previous declaration
    pub added: BTreeSet<ChildId>,
}

impl KindDiff {
    pub fn compute(
        kind: ChildKind,
        old: &DeclaredSet,
        new: &DeclaredSet,
        inherited: &InheritedSet,
    ) -> Self {
        let deletions = diff(old, new, inherited);
        let kept_inherited = old
            .iter()
            .filter(|id| !new.contains(id) && inherited.contains(id))
            .cloned()
            .collect();
        let declared_inherited = new
            .iter()
            .filter(|id| inherited.contains(id))
            .cloned()
            .collect();
        let added = new.iter().filter(|id| !old.contains(id)).cloned().collect();

        Self {
            kind,
            deletions,
            kept_inherited,
            declared_inherited,
            added,
        }
    }

    /// Check if this diff deletes anything
    pub fn has_deletions(&self) -> bool {
        !self.deletions.is_empty()
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of ids to delete
    pub deletions: usize,
    /// Number of dropped ids protected because they are inherited
    pub kept_inherited: usize,
    /// Number of newly declared ids
    pub added: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs<'a>(diffs: impl IntoIterator<Item = &'a KindDiff>) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            summary.deletions += diff.deletions.len();
            summary.kept_inherited += diff.kept_inherited.len();
            summary.added += diff.added.len();
        }
        summary
    }

    /// Check if applying would delete anything
    pub fn has_changes(&self) -> bool {
        self.deletions > 0
    }
}
