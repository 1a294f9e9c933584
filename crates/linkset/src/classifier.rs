//! Ownership classification
//!
//! Provenance is never stored: every pass asks the remote system which
//! children are currently inherited, and everything else on the parent is
//! eligible for local ownership.

use crate::error::{Error, Result};
use crate::store::{ChildFilter, ChildStore};
use crate::types::{ChildKind, InheritedSet, ParentId};

/// Determines which children of a parent are inherited
pub struct OwnershipClassifier<'a, S: ChildStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ChildStore + ?Sized> OwnershipClassifier<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Fetch the live inherited set for one kind.
    ///
    /// A failed query is returned as [`Error::Classification`]; callers must
    /// not substitute an empty set, since that would expose inherited
    /// children to deletion.
    pub fn classify(&self, parent: &ParentId, kind: ChildKind) -> Result<InheritedSet> {
        let ids = self
            .store
            .list(kind, &ChildFilter::inherited(parent))
            .map_err(|source| Error::Classification {
                parent: parent.clone(),
                kind,
                source,
            })?;

        log::debug!("Parent {} inherits {} {}", parent, ids.len(), kind.label());
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{ChildId, Provenance};

    #[test]
    fn test_classify_returns_only_inherited() {
        let store = MemoryStore::new()
            .with_child("10001", ChildKind::Trigger, "t1", Provenance::Local)
            .with_child("10001", ChildKind::Trigger, "t2", Provenance::Inherited)
            .with_child("10002", ChildKind::Trigger, "t3", Provenance::Inherited);

        let inherited = OwnershipClassifier::new(&store)
            .classify(&ParentId::new("10001"), ChildKind::Trigger)
            .unwrap();

        assert_eq!(inherited.len(), 1);
        assert!(inherited.contains(&ChildId::new("t2")));
    }

    #[test]
    fn test_classify_empty_parent() {
        let store = MemoryStore::new();
        let inherited = OwnershipClassifier::new(&store)
            .classify(&ParentId::new("10001"), ChildKind::Item)
            .unwrap();
        assert!(inherited.is_empty());
    }

    #[test]
    fn test_classify_failure_is_an_error_not_an_empty_set() {
        let store = MemoryStore::new()
            .with_child("10001", ChildKind::Item, "1", Provenance::Inherited);
        store.fail_list(ChildKind::Item);

        let err = OwnershipClassifier::new(&store)
            .classify(&ParentId::new("10001"), ChildKind::Item)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Classification {
                kind: ChildKind::Item,
                ..
            }
        ));
    }
}
