//! Error types for camera configuration and persistence.
//!
//! Per-frame stack operations never fail: they degrade to a cut or skip the
//! entry. Errors surface only from validation, config parsing and snapshot restore.

use thiserror::Error;

use crate::ids::EntryId;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CameraError {
    #[error("transition '{transition}' has no blend")]
    MissingBlend { transition: String },

    #[error("camera rig '{rig}' has no root node")]
    MissingRootNode { rig: String },

    #[error("stack entry not found: {id}")]
    EntryNotFound { id: EntryId },

    #[error("stack invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("snapshot does not match stack: expected {expected} entries, got {actual}")]
    SnapshotMismatch { expected: usize, actual: usize },

    #[error("camera config parse error: {0}")]
    Config(#[from] serde_json::Error),
}
