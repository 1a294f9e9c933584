//! Core types for link reconciliation

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque identifier of a parent object (a template or host)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParentId(String);

impl ParentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a child object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildId(String);

impl ChildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChildId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ChildId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of child object that can be linked to a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    Item,
    Trigger,
    DiscoveryRule,
}

impl ChildKind {
    /// All kinds, in declaration order
    pub fn all() -> &'static [ChildKind] {
        &[Self::Item, Self::Trigger, Self::DiscoveryRule]
    }

    /// Order in which deletions are issued.
    ///
    /// Referencing kinds come before the kinds they reference, so no delete
    /// leaves a live object pointing at a missing target.
    pub fn deletion_order() -> &'static [ChildKind] {
        &[Self::Trigger, Self::DiscoveryRule, Self::Item]
    }

    /// Kinds whose objects may hold references to objects of this kind
    pub fn referenced_by(&self) -> &'static [ChildKind] {
        match self {
            Self::Item => &[Self::Trigger],
            Self::Trigger | Self::DiscoveryRule => &[],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Trigger => "trigger",
            Self::DiscoveryRule => "discovery_rule",
        }
    }

    /// Plural label for display
    pub fn label(&self) -> &'static str {
        match self {
            Self::Item => "items",
            Self::Trigger => "triggers",
            Self::DiscoveryRule => "discovery rules",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a child on a parent comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Created or currently declared through configuration
    Local,
    /// Present through the parent's template hierarchy
    Inherited,
}

impl Provenance {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Set of child ids a configuration declares for one parent and kind.
///
/// Construction through [`DeclaredSet::from_declared`] enforces that an id
/// appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclaredSet(BTreeSet<ChildId>);

impl DeclaredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a declared set from ids in the order the author wrote them
    ///
    /// Returns [`Error::DuplicateChild`] for the first repeated id.
    pub fn from_declared<I>(kind: ChildKind, ids: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<ChildId>,
    {
        let mut set = BTreeSet::new();
        for id in ids {
            let id = id.into();
            if set.contains(&id) {
                return Err(Error::DuplicateChild { kind, id });
            }
            set.insert(id);
        }
        Ok(Self(set))
    }

    pub fn contains(&self, id: &ChildId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_set(&self) -> &BTreeSet<ChildId> {
        &self.0
    }

    pub fn into_set(self) -> BTreeSet<ChildId> {
        self.0
    }
}

impl From<BTreeSet<ChildId>> for DeclaredSet {
    fn from(set: BTreeSet<ChildId>) -> Self {
        Self(set)
    }
}

/// Children currently inherited by a parent for one kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InheritedSet(BTreeSet<ChildId>);

impl InheritedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ChildId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_set(&self) -> &BTreeSet<ChildId> {
        &self.0
    }
}

impl FromIterator<ChildId> for InheritedSet {
    fn from_iter<T: IntoIterator<Item = ChildId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Ids to delete for one kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan(BTreeSet<ChildId>);

impl DeletionPlan {
    pub fn contains(&self, id: &ChildId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_set(&self) -> &BTreeSet<ChildId> {
        &self.0
    }

    pub fn into_set(self) -> BTreeSet<ChildId> {
        self.0
    }
}

impl FromIterator<ChildId> for DeletionPlan {
    fn from_iter<T: IntoIterator<Item = ChildId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A child as seen after convergence, tagged with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedChild {
    pub id: ChildId,
    pub local: bool,
}

/// Options for executing a convergence plan
#[derive(Debug, Clone)]
pub struct ConvergeOptions {
    /// Maximum number of ids sent in a single delete call
    pub batch_size: usize,
}

impl Default for ConvergeOptions {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}
