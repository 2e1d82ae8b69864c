#![forbid(unsafe_code)]

//! Error types for persistence and position bookkeeping.

use cutline_core::{Duration, EntryId};
use thiserror::Error;

use crate::persistence::BatchId;

pub type Result<T> = std::result::Result<T, PositionError>;

/// Failure reported by a [`PositionPersistence`](crate::PositionPersistence)
/// backend for a single write or batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("backend rejected write for {id}: {message}")]
    Rejected { id: EntryId, message: String },

    #[error("backend timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    #[error("backend unavailable: {message}")]
    Unavailable { message: String },
}

impl PersistError {
    #[must_use]
    pub fn rejected(id: impl Into<EntryId>, message: impl Into<String>) -> Self {
        Self::Rejected {
            id: id.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the position store to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("persisting {batch} failed, rolled back {rolled_back} entries: {source}")]
    PersistFailed {
        batch: BatchId,
        rolled_back: usize,
        #[source]
        source: PersistError,
    },

    #[error("no in-flight persistence batch {batch}")]
    UnknownBatch { batch: BatchId },
}

impl PositionError {
    /// Batch the error refers to.
    #[must_use]
    pub fn batch(&self) -> BatchId {
        match self {
            Self::PersistFailed { batch, .. } | Self::UnknownBatch { batch } => *batch,
        }
    }
}
