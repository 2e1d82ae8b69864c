#![forbid(unsafe_code)]

//! Persistence seam: what the store asks the host to write.
//!
//! The store never performs I/O. Each committed change becomes a
//! [`PersistBatch`] in the store's outbox; the host drains the outbox, writes
//! the batch however it likes, and reports back with
//! [`PositionStore::complete_persist`](crate::PositionStore::complete_persist).
//! [`PositionPersistence`] is the synchronous shape of that contract, used by
//! [`TimelineEngine::flush`](crate::TimelineEngine::flush).

use std::fmt;

use cutline_core::{EntryId, Frame};
use serde::{Deserialize, Serialize};

use crate::error::PersistError;

/// Monotonic identifier for one committed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(u64);

impl BatchId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch#{}", self.0)
    }
}

/// Kind of change a write represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOperation {
    Add,
    Move,
    Remove,
}

impl PendingOperation {
    /// Classify a transition between two optional frames.
    ///
    /// Returns `None` when nothing changed.
    #[must_use]
    pub fn classify(old: Option<Frame>, new: Option<Frame>) -> Option<Self> {
        match (old, new) {
            (None, Some(_)) => Some(Self::Add),
            (Some(_), None) => Some(Self::Remove),
            (Some(a), Some(b)) if a != b => Some(Self::Move),
            _ => None,
        }
    }
}

/// Context attached to every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistMetadata {
    pub operation: PendingOperation,
    /// Frame before this write; `None` for additions.
    pub previous: Option<Frame>,
    /// Caller-supplied reason (for example `"drag"` or `"import"`).
    pub reason: String,
}

/// One entry's write. `frame` is `None` for a removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistUpdate {
    pub id: EntryId,
    pub frame: Option<Frame>,
    pub metadata: PersistMetadata,
}

/// Every write produced by one committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistBatch {
    pub id: BatchId,
    pub updates: Vec<PersistUpdate>,
}

impl PersistBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// A backend that can durably write entry positions.
///
/// Implementors with a native multi-write operation should override
/// [`persist_batch`](Self::persist_batch); the provided version writes one
/// entry at a time and stops at the first failure.
pub trait PositionPersistence {
    /// Write a single entry.
    fn persist(&mut self, update: &PersistUpdate) -> Result<(), PersistError>;

    /// Write every update of one batch.
    fn persist_batch(&mut self, updates: &[PersistUpdate]) -> Result<(), PersistError> {
        updates.iter().try_for_each(|update| self.persist(update))
    }
}

impl<P: PositionPersistence + ?Sized> PositionPersistence for &mut P {
    fn persist(&mut self, update: &PersistUpdate) -> Result<(), PersistError> {
        (**self).persist(update)
    }

    fn persist_batch(&mut self, updates: &[PersistUpdate]) -> Result<(), PersistError> {
        (**self).persist_batch(updates)
    }
}

impl<P: PositionPersistence + ?Sized> PositionPersistence for Box<P> {
    fn persist(&mut self, update: &PersistUpdate) -> Result<(), PersistError> {
        (**self).persist(update)
    }

    fn persist_batch(&mut self, updates: &[PersistUpdate]) -> Result<(), PersistError> {
        (**self).persist_batch(updates)
    }
}
