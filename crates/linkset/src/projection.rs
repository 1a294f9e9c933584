//! Link state projection
//!
//! Re-reads a parent after convergence and tags every child with its live
//! provenance, so the persisted view is ground truth rather than whatever
//! the previous pass assumed.

use crate::classifier::OwnershipClassifier;
use crate::error::{Error, Result};
use crate::store::{ChildFilter, ChildStore};
use crate::types::{ChildId, ChildKind, ParentId, ProjectedChild};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Children of one parent, grouped by kind and tagged local or inherited
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkProjection {
    pub children: BTreeMap<ChildKind, Vec<ProjectedChild>>,
}

impl LinkProjection {
    /// Children of a kind, or an empty slice if the kind was not projected
    pub fn get(&self, kind: ChildKind) -> &[ProjectedChild] {
        self.children
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn local_ids(&self, kind: ChildKind) -> Vec<&ChildId> {
        self.get(kind).iter().filter(|c| c.local).map(|c| &c.id).collect()
    }

    pub fn inherited_ids(&self, kind: ChildKind) -> Vec<&ChildId> {
        self.get(kind).iter().filter(|c| !c.local).map(|c| &c.id).collect()
    }

    /// Total number of projected children
    pub fn len(&self) -> usize {
        self.children.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds [`LinkProjection`]s from live queries
pub struct LinkProjector<'a, S: ChildStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ChildStore + ?Sized> LinkProjector<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Project every kind of a parent
    pub fn project(&self, parent: &ParentId) -> Result<LinkProjection> {
        self.project_kinds(parent, ChildKind::all())
    }

    /// Project only the listed kinds
    pub fn project_kinds(&self, parent: &ParentId, kinds: &[ChildKind]) -> Result<LinkProjection> {
        let mut projection = LinkProjection::default();
        for kind in kinds {
            projection
                .children
                .insert(*kind, self.project_kind(parent, *kind)?);
        }
        Ok(projection)
    }

    /// List all children of one kind and tag each by the classifier
    pub fn project_kind(&self, parent: &ParentId, kind: ChildKind) -> Result<Vec<ProjectedChild>> {
        let mut all = self
            .store
            .list(kind, &ChildFilter::all(parent))
            .map_err(|source| Error::Query {
                parent: parent.clone(),
                kind,
                source,
            })?;
        let inherited = OwnershipClassifier::new(self.store).classify(parent, kind)?;

        all.sort();
        all.dedup();
        Ok(all
            .into_iter()
            .map(|id| ProjectedChild {
                local: !inherited.contains(&id),
                id,
            })
            .collect())
    }
}
