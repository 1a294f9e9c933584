//! Error types for link reconciliation.
//!
//! Errors are categorized so callers can tell a configuration mistake
//! (nothing was sent to the remote system) from a failed ownership query
//! (nothing was deleted) from a failed delete (some deletions may have
//! happened).

use crate::types::{ChildId, ChildKind, ParentId};
use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Declared configuration is invalid; detected before any remote call.
    Configuration,
    /// The inherited-children query failed; ownership is unknown.
    Classification,
    /// A delete call was rejected by the remote system.
    Deletion,
    /// A read query (other than classification) failed.
    Query,
}

impl ErrorCategory {
    /// Whether remote state may have changed before the error surfaced.
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        matches!(self, Self::Deletion)
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Invalid declaration",
            Self::Classification => "Ownership could not be determined",
            Self::Deletion => "Deletion rejected",
            Self::Query => "Query failed",
        }
    }

    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Configuration => "Fix the declaration and run again",
            Self::Classification => "Nothing was deleted for this kind; run again once the API is reachable",
            Self::Deletion => "Failed ids are kept as pending and retried on the next apply",
            Self::Query => "Check API connectivity and permissions",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Error returned by a [`ChildStore`](crate::store::ChildStore) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct StoreError {
    pub reason: String,
}

impl StoreError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while reconciling links.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The same id was declared twice for one kind.
    #[error("{kind} {id} is declared more than once")]
    DuplicateChild { kind: ChildKind, id: ChildId },

    /// The inherited-set query failed.
    #[error("could not determine inherited {} of {parent}: {source}", kind.label())]
    Classification {
        parent: ParentId,
        kind: ChildKind,
        #[source]
        source: StoreError,
    },

    /// A delete call failed for the listed ids.
    #[error("failed to delete {kind} [{}]: {source}", join_ids(ids))]
    Deletion {
        kind: ChildKind,
        ids: Vec<ChildId>,
        #[source]
        source: StoreError,
    },

    /// Listing children failed.
    #[error("could not list {} of {parent}: {source}", kind.label())]
    Query {
        parent: ParentId,
        kind: ChildKind,
        #[source]
        source: StoreError,
    },
}

impl Error {
    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateChild { .. } => ErrorCategory::Configuration,
            Self::Classification { .. } => ErrorCategory::Classification,
            Self::Deletion { .. } => ErrorCategory::Deletion,
            Self::Query { .. } => ErrorCategory::Query,
        }
    }

    /// Kind of child the error concerns.
    #[must_use]
    pub fn kind(&self) -> ChildKind {
        match self {
            Self::DuplicateChild { kind, .. }
            | Self::Classification { kind, .. }
            | Self::Deletion { kind, .. }
            | Self::Query { kind, .. } => *kind,
        }
    }
}

fn join_ids(ids: &[ChildId]) -> String {
    ids.iter()
        .map(ChildId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_deletion_has_side_effects() {
        assert!(ErrorCategory::Deletion.has_side_effects());
        assert!(!ErrorCategory::Configuration.has_side_effects());
        assert!(!ErrorCategory::Classification.has_side_effects());
        assert!(!ErrorCategory::Query.has_side_effects());
    }

    #[test]
    fn test_error_category() {
        let err = Error::DuplicateChild {
            kind: ChildKind::Item,
            id: ChildId::new("1"),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let err = Error::Classification {
            parent: ParentId::new("10001"),
            kind: ChildKind::Trigger,
            source: StoreError::new("timeout"),
        };
        assert_eq!(err.category(), ErrorCategory::Classification);
        assert_eq!(err.kind(), ChildKind::Trigger);
    }

    #[test]
    fn test_deletion_display_lists_ids() {
        let err = Error::Deletion {
            kind: ChildKind::Item,
            ids: vec![ChildId::new("1"), ChildId::new("2")],
            source: StoreError::new("still referenced"),
        };
        let display = err.to_string();
        assert!(display.contains("1, 2"));
        assert!(display.contains("still referenced"));
    }

    #[test]
    fn test_classification_display() {
        let err = Error::Classification {
            parent: ParentId::new("10001"),
            kind: ChildKind::DiscoveryRule,
            source: StoreError::new("HTTP 502"),
        };
        let display = err.to_string();
        assert!(display.contains("discovery rules"));
        assert!(display.contains("10001"));
        assert!(display.contains("HTTP 502"));
    }

    #[test]
    fn test_category_advice() {
        assert!(!ErrorCategory::Classification.advice().is_empty());
        assert!(format!("{}", ErrorCategory::Deletion).contains("Deletion"));
    }
}
