//! Keeping the mirror in sync with the remote manifest.
//!
//! - `Reconciler`: one fetch → diff → download → persist pass
//! - `SnapshotCell`: the version pointer readers load derived state through

pub mod reconciler;
pub mod snapshot;

pub use reconciler::{
    EntryFailure, FailureReason, ReconcileReport, Reconciler, DEFAULT_MAX_CONCURRENT_DOWNLOADS,
};
pub use snapshot::{Snapshot, SnapshotCell};
