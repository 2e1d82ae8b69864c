#![forbid(unsafe_code)]

//! Host-facing facade.
//!
//! [`TimelineEngine`] wires one [`PositionStore`] to one [`DragController`]
//! and enforces the hand-offs between them:
//!
//! - the store is locked while a drag is live, so a remote snapshot cannot
//!   snap the dragged entry back;
//! - a release commits the settled map through
//!   [`PositionStore::update_positions`], which converts the drag's lock into
//!   a persistence lock;
//! - a discarded or canceled drag releases the lock without touching the map.
//!
//! Every public operation runs inside the engine's `timeline` span.

use cutline_core::{
    DragPhase, EntryId, Frame, Instant, PointerInput, PointerPosition, PositionMap, TrackGeometry,
};
use cutline_layout::{CoordinateSystem, FluidParams};
use tracing::{Span, debug, info_span};

use crate::config::EngineConfig;
use crate::drag::{DragController, DragEffect, NeighborDistance};
use crate::error::{self, PersistError};
use crate::persistence::{BatchId, PersistBatch, PositionPersistence};
use crate::reconcile::{RemoteEntry, SyncReport};
use crate::store::{LockReason, PositionStore, UpdateOptions, UpdateOutcome};

/// Reason recorded on writes produced by a drag release.
pub const DRAG_REASON: &str = "drag";

/// Result of [`TimelineEngine::on_pointer_up`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOutcome {
    pub effect: DragEffect,
    /// Set when the release produced a commit attempt.
    pub update: Option<UpdateOutcome>,
}

/// Position engine for one timeline.
#[derive(Debug)]
pub struct TimelineEngine {
    config: EngineConfig,
    store: PositionStore,
    drag: DragController,
    span: Span,
}

impl TimelineEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_positions(config, &PositionMap::new())
    }

    /// Create an engine seeded with `initial` positions.
    #[must_use]
    pub fn with_positions(config: EngineConfig, initial: &PositionMap) -> Self {
        let span = info_span!("timeline", session = %config.session_label);
        let store = {
            let _entered = span.enter();
            PositionStore::with_positions(initial, config.to_store_timeouts())
        };
        let drag = DragController::new(
            config.to_gesture_config(),
            config.to_fluid_params(),
            config.frame_padding,
        );
        Self {
            config,
            store,
            drag,
            span,
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Owned copy of the committed positions.
    #[must_use]
    pub fn get_positions(&self) -> PositionMap {
        self.store.snapshot()
    }

    #[must_use]
    pub fn positions(&self) -> &PositionMap {
        self.store.positions()
    }

    #[must_use]
    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    #[must_use]
    pub fn drag_phase(&self) -> DragPhase {
        self.drag.phase()
    }

    #[must_use]
    pub fn preview(&self) -> Option<&PositionMap> {
        self.drag.preview()
    }

    #[must_use]
    pub fn candidate(&self) -> Option<Frame> {
        self.drag.candidate()
    }

    #[must_use]
    pub fn swap_target(&self) -> Option<&EntryId> {
        self.drag.swap_target()
    }

    #[must_use]
    pub fn neighbor_distance(&self) -> Option<NeighborDistance> {
        self.drag.neighbor_distance()
    }

    /// Coordinate bounds for rendering: the live drag's bounds if any,
    /// otherwise bounds derived from the committed map.
    #[must_use]
    pub fn bounds(&self) -> CoordinateSystem {
        self.drag.bounds().unwrap_or_else(|| {
            CoordinateSystem::from_positions(self.store.positions(), self.config.frame_padding)
        })
    }

    // ── Store operations ──────────────────────────────────────────────

    pub fn update_positions(
        &mut self,
        next: &PositionMap,
        options: UpdateOptions,
        now: Instant,
    ) -> UpdateOutcome {
        let _entered = self.span.clone().entered();
        self.store.update_positions(next, options, now)
    }

    pub fn sync_from_remote(&mut self, remote: &[RemoteEntry], now: Instant) -> SyncReport {
        let _entered = self.span.clone().entered();
        self.store.sync_from_remote(remote, now)
    }

    pub fn take_persist_requests(&mut self) -> Vec<PersistBatch> {
        self.store.take_persist_requests()
    }

    pub fn complete_persist(
        &mut self,
        batch: BatchId,
        result: std::result::Result<(), PersistError>,
    ) -> error::Result<()> {
        let _entered = self.span.clone().entered();
        self.store.complete_persist(batch, result)
    }

    /// Drive every queued batch through `backend`, oldest first.
    ///
    /// All batches are attempted even if one fails. Returns how many were
    /// persisted, or the first failure.
    pub fn flush<P>(&mut self, backend: &mut P) -> error::Result<usize>
    where
        P: PositionPersistence + ?Sized,
    {
        let _entered = self.span.clone().entered();
        let mut persisted = 0;
        let mut first_error = None;
        for batch in self.store.take_persist_requests() {
            let result = backend.persist_batch(&batch.updates);
            match self.store.complete_persist(batch.id, result) {
                Ok(()) => persisted += 1,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(persisted),
        }
    }

    /// Host-requested quiet period. Remote snapshots are ignored until
    /// [`unlock`](Self::unlock) or the lock timeout.
    pub fn lock(&mut self, now: Instant) {
        let _entered = self.span.clone().entered();
        self.store.lock(LockReason::Host, now);
    }

    /// End a host lock. Locks held by a drag or a persist are left alone.
    pub fn unlock(&mut self) -> bool {
        let _entered = self.span.clone().entered();
        self.store.unlock_if(LockReason::Host)
    }

    pub fn tick(&mut self, now: Instant) {
        let _entered = self.span.clone().entered();
        self.store.tick(now);
    }

    /// Change the adjacency context; the minimum gap follows it.
    pub fn set_context_frames(&mut self, context: u32) {
        self.config.context_frames = context;
        self.drag.set_params(FluidParams::from_context(context));
    }

    // ── Drag operations ───────────────────────────────────────────────

    pub fn begin_drag(
        &mut self,
        id: &str,
        input: PointerInput,
        geometry: Option<TrackGeometry>,
        now: Instant,
    ) -> DragEffect {
        let _entered = self.span.clone().entered();
        self.drag
            .begin(id, input, geometry, self.store.positions(), now)
    }

    pub fn on_pointer_move(&mut self, position: PointerPosition, now: Instant) -> DragEffect {
        let _entered = self.span.clone().entered();
        let effect = self.drag.pointer_move(position);
        if matches!(effect, DragEffect::Started { .. } | DragEffect::Preview { .. }) {
            self.store.lock(LockReason::Drag, now);
        }
        effect
    }

    pub fn on_pointer_up(&mut self, position: PointerPosition, now: Instant) -> ReleaseOutcome {
        let _entered = self.span.clone().entered();
        let effect = self.drag.pointer_up(position, self.store.positions());
        let update = match &effect {
            DragEffect::Released { positions, .. } => {
                let outcome =
                    self.store
                        .update_positions(positions, UpdateOptions::reason(DRAG_REASON), now);
                if outcome == UpdateOutcome::Unchanged {
                    self.store.release_drag_lock();
                }
                self.drag.finish(now);
                Some(outcome)
            }
            DragEffect::Noop(reason) => {
                debug!(?reason, "pointer up ignored");
                self.store.release_drag_lock();
                None
            }
            _ => None,
        };
        ReleaseOutcome { effect, update }
    }

    /// Drop the live drag, if any, without committing.
    pub fn cancel_drag(&mut self) -> Option<EntryId> {
        let _entered = self.span.clone().entered();
        let canceled = self.drag.cancel();
        self.store.release_drag_lock();
        canceled
    }
}
