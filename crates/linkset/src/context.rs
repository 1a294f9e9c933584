//! Progress reporting for convergence
//!
//! This trait lets the driver report what it is doing without depending
//! on a particular terminal UI.

use crate::executor::KindOutcome;
use crate::types::{ChildId, ChildKind};

/// Progress callback for convergence
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called before the first delete call for a kind
    fn on_kind_start(&mut self, kind: ChildKind, count: usize);

    /// Called after a delete call succeeds
    fn on_batch_deleted(&mut self, kind: ChildKind, ids: &[ChildId]);

    /// Called after a delete call fails
    fn on_batch_failed(&mut self, kind: ChildKind, ids: &[ChildId], reason: &str);

    /// Called once a kind's outcome is final
    fn on_kind_complete(&mut self, outcome: &KindOutcome);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_kind_start(&mut self, _kind: ChildKind, _count: usize) {}
    fn on_batch_deleted(&mut self, _kind: ChildKind, _ids: &[ChildId]) {}
    fn on_batch_failed(&mut self, _kind: ChildKind, _ids: &[ChildId], _reason: &str) {}
    fn on_kind_complete(&mut self, _outcome: &KindOutcome) {}
}
