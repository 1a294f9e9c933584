//! Remote child store abstraction
//!
//! The reconciler only needs two verbs from the remote system: list the
//! children of a parent (optionally only the inherited ones) and delete a
//! batch of children by id. Implement [`ChildStore`] over the real API;
//! use [`MemoryStore`] in tests.

use crate::error::StoreError;
use crate::types::{ChildId, ChildKind, ParentId, Provenance};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result type for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Scope of a list query
#[derive(Debug, Clone, Copy)]
pub struct ChildFilter<'a> {
    /// Parent whose children are listed
    pub parent: &'a ParentId,
    /// Only return children inherited through the template hierarchy
    pub inherited_only: bool,
}

impl<'a> ChildFilter<'a> {
    /// Every child of the parent, local and inherited
    pub fn all(parent: &'a ParentId) -> Self {
        Self {
            parent,
            inherited_only: false,
        }
    }

    /// Only inherited children of the parent
    pub fn inherited(parent: &'a ParentId) -> Self {
        Self {
            parent,
            inherited_only: true,
        }
    }
}

/// Remote object store addressed by kind and opaque id
///
/// Calls are blocking round trips. Implementations own timeouts and
/// transport concerns; the reconciler never retries.
pub trait ChildStore {
    /// List child ids of a parent matching the filter
    fn list(&self, kind: ChildKind, filter: &ChildFilter<'_>) -> StoreResult<Vec<ChildId>>;

    /// Delete children by id in a single call.
    ///
    /// Returns the ids the remote system confirmed. Ids sent but not
    /// confirmed are treated as failed deletions.
    fn delete(&self, kind: ChildKind, ids: &[ChildId]) -> StoreResult<Vec<ChildId>>;
}

impl<S: ChildStore + ?Sized> ChildStore for &S {
    fn list(&self, kind: ChildKind, filter: &ChildFilter<'_>) -> StoreResult<Vec<ChildId>> {
        (**self).list(kind, filter)
    }

    fn delete(&self, kind: ChildKind, ids: &[ChildId]) -> StoreResult<Vec<ChildId>> {
        (**self).delete(kind, ids)
    }
}

/// A call recorded by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List {
        kind: ChildKind,
        parent: ParentId,
        inherited_only: bool,
    },
    Delete {
        kind: ChildKind,
        ids: Vec<ChildId>,
    },
}

#[derive(Debug, Default)]
struct MemoryInner {
    children: BTreeMap<(ParentId, ChildKind), BTreeMap<ChildId, Provenance>>,
    failing_lists: BTreeSet<ChildKind>,
    failing_deletes: BTreeSet<(ChildKind, ChildId)>,
    calls: Vec<StoreCall>,
}

/// In-memory store for testing without network access.
///
/// Mirrors the remote API's behavior: deleting an unknown or inherited
/// child fails the whole call, and a failed call deletes nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builder form of [`MemoryStore::add_child`].
    pub fn with_child(
        self,
        parent: &str,
        kind: ChildKind,
        id: &str,
        provenance: Provenance,
    ) -> Self {
        self.add_child(parent, kind, id, provenance);
        self
    }

    /// Place a child on a parent.
    pub fn add_child(&self, parent: &str, kind: ChildKind, id: &str, provenance: Provenance) {
        self.lock()
            .children
            .entry((ParentId::new(parent), kind))
            .or_default()
            .insert(ChildId::new(id), provenance);
    }

    /// Make every list call for `kind` fail.
    pub fn fail_list(&self, kind: ChildKind) {
        self.lock().failing_lists.insert(kind);
    }

    /// Make any delete call that includes this child fail.
    pub fn fail_delete(&self, kind: ChildKind, id: &str) {
        self.lock().failing_deletes.insert((kind, ChildId::new(id)));
    }

    /// Ids currently present on a parent for a kind.
    pub fn children(&self, parent: &str, kind: ChildKind) -> Vec<ChildId> {
        self.lock()
            .children
            .get(&(ParentId::new(parent), kind))
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Only the delete calls made so far, in order.
    pub fn delete_calls(&self) -> Vec<(ChildKind, Vec<ChildId>)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::Delete { kind, ids } => Some((*kind, ids.clone())),
                StoreCall::List { .. } => None,
            })
            .collect()
    }
}

impl ChildStore for MemoryStore {
    fn list(&self, kind: ChildKind, filter: &ChildFilter<'_>) -> StoreResult<Vec<ChildId>> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::List {
            kind,
            parent: filter.parent.clone(),
            inherited_only: filter.inherited_only,
        });

        if inner.failing_lists.contains(&kind) {
            return Err(StoreError::new(format!("{kind}.get: connection reset")));
        }

        let ids = inner
            .children
            .get(&(filter.parent.clone(), kind))
            .map(|children| {
                children
                    .iter()
                    .filter(|(_, p)| !filter.inherited_only || !p.is_local())
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    fn delete(&self, kind: ChildKind, ids: &[ChildId]) -> StoreResult<Vec<ChildId>> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Delete {
            kind,
            ids: ids.to_vec(),
        });

        for id in ids {
            if inner.failing_deletes.contains(&(kind, id.clone())) {
                return Err(StoreError::new(format!("{kind} {id} is still referenced")));
            }
        }

        // Resolve every id before removing anything so a failed call is a no-op
        let mut owners = Vec::with_capacity(ids.len());
        for id in ids {
            let owner = inner
                .children
                .iter()
                .find(|((_, k), children)| *k == kind && children.contains_key(id))
                .map(|((parent, _), children)| (parent.clone(), children[id]));
            match owner {
                Some((_, Provenance::Inherited)) => {
                    return Err(StoreError::new(format!(
                        "cannot delete templated {kind} {id}"
                    )));
                }
                Some((parent, Provenance::Local)) => owners.push(parent),
                None => {
                    return Err(StoreError::new(
                        "No permissions to referred object or it does not exist!",
                    ));
                }
            }
        }

        for (id, parent) in ids.iter().zip(owners) {
            if let Some(children) = inner.children.get_mut(&(parent, kind)) {
                children.remove(id);
            }
        }
        Ok(ids.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_child("10001", ChildKind::Item, "1", Provenance::Local)
            .with_child("10001", ChildKind::Item, "2", Provenance::Inherited)
            .with_child("10002", ChildKind::Item, "3", Provenance::Local)
    }

    #[test]
    fn test_list_filters_inherited() {
        let store = store();
        let parent = ParentId::new("10001");

        let all = store.list(ChildKind::Item, &ChildFilter::all(&parent)).unwrap();
        assert_eq!(all, vec![ChildId::new("1"), ChildId::new("2")]);

        let inherited = store
            .list(ChildKind::Item, &ChildFilter::inherited(&parent))
            .unwrap();
        assert_eq!(inherited, vec![ChildId::new("2")]);
    }

    #[test]
    fn test_delete_removes_local_children() {
        let store = store();
        store
            .delete(ChildKind::Item, &[ChildId::new("1"), ChildId::new("3")])
            .unwrap();
        assert_eq!(store.children("10001", ChildKind::Item), vec![ChildId::new("2")]);
        assert!(store.children("10002", ChildKind::Item).is_empty());
    }

    #[test]
    fn test_failed_delete_is_a_no_op() {
        let store = store();
        let err = store
            .delete(ChildKind::Item, &[ChildId::new("1"), ChildId::new("2")])
            .unwrap_err();
        assert!(err.reason.contains("templated"));
        assert_eq!(store.children("10001", ChildKind::Item).len(), 2);
    }

    #[test]
    fn test_delete_unknown_child_fails() {
        let store = store();
        let err = store
            .delete(ChildKind::Trigger, &[ChildId::new("1")])
            .unwrap_err();
        assert!(err.reason.contains("does not exist"));
    }

    #[test]
    fn test_injected_failures_are_recorded() {
        let store = store();
        store.fail_list(ChildKind::Trigger);
        store.fail_delete(ChildKind::Item, "1");
        let parent = ParentId::new("10001");

        assert!(store.list(ChildKind::Trigger, &ChildFilter::all(&parent)).is_err());
        assert!(store.delete(ChildKind::Item, &[ChildId::new("1")]).is_err());
        assert_eq!(store.calls().len(), 2);
        assert_eq!(store.delete_calls().len(), 1);
        assert_eq!(store.children("10001", ChildKind::Item).len(), 2);
    }
}
