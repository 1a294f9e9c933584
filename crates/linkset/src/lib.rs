//! # Linkset
//!
//! Ownership-aware reconciliation of the children linked to a parent object.
//!
//! A configuration declares, per child kind, which children a parent should
//! carry. Some children on the parent are inherited through a hierarchy the
//! configuration does not control; those must never be deleted, even if the
//! author drops them from the declaration.
//!
//! ## Core Concepts
//!
//! - **DeclaredSet**: ids the configuration lists for one kind
//! - **OwnershipClassifier**: asks the remote system which children are inherited
//! - **diff**: `(old - new) - inherited`, the ids to delete
//! - **ConvergenceDriver**: deletes in dependency order, triggers before items
//! - **LinkProjector**: re-reads the parent and tags each child local or inherited
//!
//! ## Example
//!
//! ```ignore
//! use linkset::{
//!     ChildKind, ConvergenceDriver, DeclaredChange, LinkProjector, LinkRequest,
//!     NoProgress, ParentId,
//! };
//!
//! let request = LinkRequest::new(ParentId::new("10084"))
//!     .with_kind(ChildKind::Item, DeclaredChange::new(["23296", "23297"], ["23297"]))
//!     .with_kind(ChildKind::Trigger, DeclaredChange::new(["13491"], ["13491"]));
//!
//! let report = ConvergenceDriver::new(&store).converge(&request, &mut NoProgress);
//! for error in report.errors() {
//!     eprintln!("{error}");
//! }
//!
//! let projection = LinkProjector::new(&store).project(&request.parent)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`ChildStore`]: lists and deletes children on the remote system
//! - [`ProgressCallback`]: receives progress updates during deletion
//!
//! [`MemoryStore`] implements [`ChildStore`] in memory for tests.

pub mod classifier;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod planner;
pub mod projection;
pub mod store;
pub mod types;

// Re-export main types at crate root
pub use classifier::OwnershipClassifier;
pub use context::{NoProgress, ProgressCallback};
pub use diff::{DiffSummary, KindDiff, diff};
pub use error::{Error, ErrorCategory, Result, StoreError};
pub use executor::{ConvergenceDriver, ConvergenceReport, KindOutcome, KindStatus};
pub use planner::{ConvergencePlan, DeclaredChange, LinkRequest, PlannedKind, Planner};
pub use projection::{LinkProjection, LinkProjector};
pub use store::{ChildFilter, ChildStore, MemoryStore, StoreCall, StoreResult};
pub use types::{
    ChildId, ChildKind, ConvergeOptions, DeclaredSet, DeletionPlan, InheritedSet, ParentId,
    ProjectedChild, Provenance,
};
