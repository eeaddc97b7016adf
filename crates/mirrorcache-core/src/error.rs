//! Error taxonomy for the mirror cache.
//!
//! Only operations that a host calls directly return `MirrorError`. The
//! request interceptor is total and never surfaces an error, and a single
//! resource that fails to download is recorded in the reconcile report
//! instead of failing the whole run.

use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] ApiError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A reconciliation is already in progress")]
    ReconcileInProgress,

    #[error("Reconciliation cancelled")]
    Cancelled,
}

impl MirrorError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = MirrorError> = std::result::Result<T, E>;
