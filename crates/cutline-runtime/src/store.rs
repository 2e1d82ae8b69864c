#![forbid(unsafe_code)]

//! Authoritative position store.
//!
//! [`PositionStore`] owns the committed [`PositionMap`] and the bookkeeping
//! that lets local writes coexist with remote snapshots and an asynchronous
//! persistence backend.
//!
//! # Lifecycle of a write
//!
//! ```text
//! update_positions ──► applied locally, revision += 1
//!                      pending record per changed id
//!                      lock (Persist) + batch in outbox
//! take_persist_requests ──► host writes the batch
//! complete_persist(Ok)  ──► pending kept until a remote snapshot confirms it
//! complete_persist(Err) ──► rolled back, earlier pending record reinstated,
//!                           error returned
//! ```
//!
//! # Invariants
//!
//! 1. The committed map never contains two entries on the same frame.
//!    Every frame written through [`PositionStore::update_positions`] lies on
//!    the `4N+1` lattice.
//! 2. An id has at most one pending record. A newer write replaces it, and
//!    the replaced record comes back if the newer write fails.
//! 3. `revision` increases exactly when the committed map changes.
//! 4. A rollback only restores an entry whose current frame is still the
//!    one the failed batch wrote. Later writes win.
//!
//! # Failure Modes
//!
//! - A lock that is never released expires after
//!   [`StoreTimeouts::lock_timeout`] and is dropped with a warning on the next
//!   [`tick`](PositionStore::tick) or remote sync.
//! - Completing an unknown batch is reported as
//!   [`PositionError::UnknownBatch`] and changes nothing.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use cutline_core::{Duration, EntryId, Frame, Instant, PositionMap};
use cutline_layout::{resolve_conflicts, settle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_LOCK_TIMEOUT, DEFAULT_PENDING_TIMEOUT};
use crate::error::{PersistError, PositionError, Result};
use crate::persistence::{BatchId, PendingOperation, PersistBatch, PersistMetadata, PersistUpdate};

/// Time windows governing pending writes and locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTimeouts {
    pub pending_timeout: Duration,
    pub lock_timeout: Duration,
}

impl Default for StoreTimeouts {
    fn default() -> Self {
        Self {
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// A local write not yet confirmed by a remote snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub id: EntryId,
    pub old_position: Option<Frame>,
    pub new_position: Option<Frame>,
    pub operation: PendingOperation,
    pub timestamp: Instant,
    pub batch: BatchId,
}

impl PendingUpdate {
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }
}

/// Who is holding the store's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    /// A committed batch is waiting on the persistence backend.
    Persist,
    /// A drag gesture is live.
    Drag,
    /// The host asked for a quiet period.
    Host,
}

/// Guard against remote snapshots clobbering in-flight local work.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionLock {
    /// Committed map at the moment the lock was first taken.
    pub snapshot: PositionMap,
    pub locked_at: Instant,
    pub reason: LockReason,
}

impl PositionLock {
    #[must_use]
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.locked_at) >= timeout
    }
}

/// Describes a call to [`PositionStore::update_positions`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateOptions {
    /// Carried into every [`PersistMetadata`] of the batch.
    pub reason: String,
}

impl UpdateOptions {
    #[must_use]
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Result of [`PositionStore::update_positions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The requested map matched the committed one; nothing was queued.
    Unchanged,
    Applied {
        batch: BatchId,
        /// Number of ids added, moved, or removed.
        changed: usize,
        /// Duplicate frames in the request that had to be separated.
        resolved_conflicts: usize,
    },
}

impl UpdateOutcome {
    #[must_use]
    pub fn batch(&self) -> Option<BatchId> {
        match self {
            Self::Unchanged => None,
            Self::Applied { batch, .. } => Some(*batch),
        }
    }
}

#[derive(Debug, Clone)]
struct InFlight {
    batch: BatchId,
    changes: Vec<FlightChange>,
}

/// One id written by an in-flight batch.
#[derive(Debug, Clone)]
struct FlightChange {
    id: EntryId,
    before: Option<Frame>,
    after: Option<Frame>,
    /// Pending record this write replaced; reinstated if the batch fails.
    displaced: Option<PendingUpdate>,
}

/// Owner of the committed position map.
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    pub(crate) positions: PositionMap,
    pub(crate) pending: BTreeMap<EntryId, PendingUpdate>,
    pub(crate) lock: Option<PositionLock>,
    in_flight: Vec<InFlight>,
    outbox: VecDeque<PersistBatch>,
    next_batch: u64,
    pub(crate) revision: u64,
    pub(crate) timeouts: StoreTimeouts,
}

impl PositionStore {
    #[must_use]
    pub fn new(timeouts: StoreTimeouts) -> Self {
        Self {
            timeouts,
            ..Self::default()
        }
    }

    /// Seed the store with an initial map, without queueing any writes.
    ///
    /// Duplicate frames in `initial` are separated before the map is adopted.
    #[must_use]
    pub fn with_positions(initial: &PositionMap, timeouts: StoreTimeouts) -> Self {
        let resolution = resolve_conflicts(initial);
        log_reassignments(&resolution.reassigned, "seed");
        Self {
            positions: resolution.positions,
            timeouts,
            ..Self::default()
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────

    /// Borrow the committed map.
    #[inline]
    #[must_use]
    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    /// Owned copy of the committed map.
    #[must_use]
    pub fn snapshot(&self) -> PositionMap {
        self.positions.clone()
    }

    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    #[must_use]
    pub fn timeouts(&self) -> StoreTimeouts {
        self.timeouts
    }

    #[must_use]
    pub fn pending(&self, id: &str) -> Option<&PendingUpdate> {
        self.pending.get(id)
    }

    pub fn pending_updates(&self) -> impl Iterator<Item = &PendingUpdate> + '_ {
        self.pending.values()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn lock_state(&self) -> Option<&PositionLock> {
        self.lock.as_ref()
    }

    /// Whether a lock is held and has not yet expired at `now`.
    #[must_use]
    pub fn is_locked(&self, now: Instant) -> bool {
        self.lock
            .as_ref()
            .is_some_and(|lock| !lock.is_expired(now, self.timeouts.lock_timeout))
    }

    /// Batches handed out but not yet completed.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    // ── Locking ───────────────────────────────────────────────────────

    /// Take the lock for `reason`, or refresh it if already held.
    ///
    /// The snapshot taken by the first holder is kept. A host lock is never
    /// downgraded by a drag or a commit; only [`unlock`](Self::unlock) ends it.
    pub fn lock(&mut self, reason: LockReason, now: Instant) {
        match self.lock.as_mut() {
            Some(lock) => {
                lock.locked_at = now;
                if lock.reason != LockReason::Host || reason == LockReason::Host {
                    lock.reason = reason;
                }
            }
            None => {
                self.lock = Some(PositionLock {
                    snapshot: self.positions.clone(),
                    locked_at: now,
                    reason,
                });
                debug!(?reason, "position lock taken");
            }
        }
    }

    /// Release the lock regardless of who holds it.
    pub fn unlock(&mut self) -> Option<PositionLock> {
        let released = self.lock.take();
        if let Some(lock) = &released {
            debug!(reason = ?lock.reason, "position lock released");
        }
        released
    }

    /// Release the lock only if `reason` currently holds it.
    pub fn unlock_if(&mut self, reason: LockReason) -> bool {
        if self.lock.as_ref().is_some_and(|lock| lock.reason == reason) {
            self.unlock();
            true
        } else {
            false
        }
    }

    /// End a drag's hold on the lock.
    ///
    /// If batches are still in flight the lock is handed back to them.
    pub fn release_drag_lock(&mut self) {
        if self.lock.as_ref().map(|lock| lock.reason) != Some(LockReason::Drag) {
            return;
        }
        if self.in_flight.is_empty() {
            self.unlock();
        } else if let Some(lock) = self.lock.as_mut() {
            lock.reason = LockReason::Persist;
        }
    }

    /// Drop an expired lock. Returns `true` if one was dropped.
    pub fn expire_lock(&mut self, now: Instant) -> bool {
        let timeout = self.timeouts.lock_timeout;
        match &self.lock {
            Some(lock) if lock.is_expired(now, timeout) => {
                warn!(
                    reason = ?lock.reason,
                    held_ms = now.saturating_duration_since(lock.locked_at).as_millis() as u64,
                    "position lock expired; force-releasing"
                );
                self.lock = None;
                true
            }
            _ => false,
        }
    }

    /// Periodic housekeeping.
    pub fn tick(&mut self, now: Instant) {
        self.expire_lock(now);
    }

    // ── Writes ────────────────────────────────────────────────────────

    /// Replace the committed map with `next`.
    ///
    /// `next` is settled first: every frame is snapped onto the `4N+1`
    /// lattice in rank order and duplicates are separated (first in insertion
    /// order keeps the lower frame). Only ids whose settled frame differs
    /// from the committed one are recorded as pending and queued for
    /// persistence.
    pub fn update_positions(
        &mut self,
        next: &PositionMap,
        options: UpdateOptions,
        now: Instant,
    ) -> UpdateOutcome {
        let resolved_conflicts = next.len() - distinct_frames(next);
        let settled = settle(next);
        log_reassignments(&settled.reassigned, &options.reason);
        let next = settled.positions;

        let changes = diff(&self.positions, &next);
        if changes.is_empty() {
            debug!(reason = %options.reason, "update carried no changes; ignored");
            return UpdateOutcome::Unchanged;
        }

        let batch = self.allocate_batch();
        let snapshot = std::mem::replace(&mut self.positions, next);
        self.revision += 1;

        let mut updates = Vec::with_capacity(changes.len());
        let mut flight = Vec::with_capacity(changes.len());
        for (id, old, new, operation) in changes {
            let displaced = self.pending.insert(
                id.clone(),
                PendingUpdate {
                    id: id.clone(),
                    old_position: old,
                    new_position: new,
                    operation,
                    timestamp: now,
                    batch,
                },
            );
            updates.push(PersistUpdate {
                id: id.clone(),
                frame: new,
                metadata: PersistMetadata {
                    operation,
                    previous: old,
                    reason: options.reason.clone(),
                },
            });
            flight.push(FlightChange {
                id,
                before: old,
                after: new,
                displaced,
            });
        }

        match self.lock.as_mut() {
            Some(lock) if lock.reason == LockReason::Host => lock.locked_at = now,
            Some(lock) => {
                lock.locked_at = now;
                lock.reason = LockReason::Persist;
            }
            None => {
                self.lock = Some(PositionLock {
                    snapshot,
                    locked_at: now,
                    reason: LockReason::Persist,
                });
            }
        }

        self.in_flight.push(InFlight {
            batch,
            changes: flight,
        });
        let changed = updates.len();
        self.outbox.push_back(PersistBatch { id: batch, updates });

        info!(
            %batch,
            changed,
            resolved_conflicts,
            revision = self.revision,
            reason = %options.reason,
            "positions updated"
        );

        UpdateOutcome::Applied {
            batch,
            changed,
            resolved_conflicts,
        }
    }

    /// Hand every queued batch to the caller, oldest first.
    pub fn take_persist_requests(&mut self) -> Vec<PersistBatch> {
        self.outbox.drain(..).collect()
    }

    /// Record the backend's verdict for `batch`.
    ///
    /// On success the pending records stay until a remote snapshot confirms
    /// them. On failure every entry the batch wrote (and that nothing has
    /// overwritten since) is restored, the batch's pending records give way
    /// to the ones they replaced, and the failure is returned.
    pub fn complete_persist(
        &mut self,
        batch: BatchId,
        result: std::result::Result<(), PersistError>,
    ) -> Result<()> {
        let Some(index) = self.in_flight.iter().position(|f| f.batch == batch) else {
            warn!(%batch, "completion for unknown persistence batch");
            return Err(PositionError::UnknownBatch { batch });
        };
        let flight = self.in_flight.remove(index);
        self.outbox.retain(|queued| queued.id != batch);

        let outcome = match result {
            Ok(()) => {
                debug!(%batch, "batch persisted; awaiting remote confirmation");
                Ok(())
            }
            Err(source) => {
                let rolled_back = self.roll_back(flight);
                warn!(%batch, rolled_back, error = %source, "persistence failed; rolled back");
                Err(PositionError::PersistFailed {
                    batch,
                    rolled_back,
                    source,
                })
            }
        };

        if self.in_flight.is_empty() {
            self.unlock_if(LockReason::Persist);
        }
        outcome
    }

    fn roll_back(&mut self, flight: InFlight) -> usize {
        let mut restored = self.positions.clone();
        let mut rolled_back = 0;
        for change in flight.changes {
            let FlightChange {
                id,
                before,
                after,
                displaced,
            } = change;
            self.hand_down(flight.batch, &id, before, displaced.as_ref());

            if self
                .pending
                .get(id.as_str())
                .is_some_and(|p| p.batch == flight.batch)
            {
                match displaced {
                    Some(previous) => {
                        debug!(%id, batch = %previous.batch, "earlier pending write reinstated");
                        self.pending.insert(id.clone(), previous);
                    }
                    None => {
                        self.pending.remove(id.as_str());
                    }
                }
            }
            if restored.get(id.as_str()) != after {
                debug!(%id, batch = %flight.batch, "rollback skipped; entry rewritten since");
                continue;
            }
            match before {
                Some(frame) => {
                    restored.insert(id, frame);
                }
                None => {
                    restored.remove(id.as_str());
                }
            }
            rolled_back += 1;
        }

        let resolution = resolve_conflicts(&restored);
        log_reassignments(&resolution.reassigned, "rollback");
        if resolution.positions != self.positions {
            self.positions = resolution.positions;
            self.revision += 1;
        }
        rolled_back
    }

    /// Pass a failed batch's view of `id` on to any in-flight batch that
    /// overwrote it, so that batch rolls back past the failed write too.
    fn hand_down(
        &mut self,
        failed: BatchId,
        id: &EntryId,
        before: Option<Frame>,
        displaced: Option<&PendingUpdate>,
    ) {
        let overwrites = self
            .in_flight
            .iter_mut()
            .flat_map(|f| f.changes.iter_mut())
            .filter(|c| c.id == *id)
            .filter(|c| c.displaced.as_ref().is_some_and(|p| p.batch == failed));
        for change in overwrites {
            change.before = before;
            change.displaced = displaced.cloned();
        }
    }

    fn allocate_batch(&mut self) -> BatchId {
        self.next_batch += 1;
        BatchId::new(self.next_batch)
    }
}

fn distinct_frames(map: &PositionMap) -> usize {
    map.iter().map(|(_, frame)| frame).collect::<BTreeSet<_>>().len()
}

/// Per-id changes from `old` to `new`, in `new`'s order followed by removals.
fn diff(
    old: &PositionMap,
    new: &PositionMap,
) -> Vec<(EntryId, Option<Frame>, Option<Frame>, PendingOperation)> {
    let mut changes = Vec::new();
    for (id, frame) in new.iter() {
        let before = old.get(id.as_str());
        if let Some(op) = PendingOperation::classify(before, Some(frame)) {
            changes.push((id.clone(), before, Some(frame), op));
        }
    }
    for (id, frame) in old.iter() {
        if !new.contains(id.as_str()) {
            changes.push((id.clone(), Some(frame), None, PendingOperation::Remove));
        }
    }
    changes
}

pub(crate) fn log_reassignments(reassigned: &[cutline_layout::Reassignment], context: &str) {
    for r in reassigned {
        debug!(
            id = %r.id,
            from = r.from,
            to = r.to,
            context,
            "duplicate frame resolved"
        );
    }
}
