//! Review sessions: snapshots of pre-mutation state, diffs, approve and
//! rollback.
//!
//! The first mutation of a resource within a session captures its prior
//! state; later mutations leave that capture alone and only promote the
//! operation type. A snapshot stays pending until it is approved (keep the
//! current state) or rolled back (restore the capture).

pub mod diff;
mod engine;
pub mod snapshots;
mod types;

pub use diff::{compare_text, diff_snapshot, field_changes, unified_diff};
pub use engine::ReviewEngine;
pub use types::{
    FieldChange, OperationType, ResourceDiff, RollbackOutcome, SessionId, SessionInfo, Snapshot,
    SnapshotInfo, TextDiff, RESOURCE_TYPE_PATH,
};
