#![forbid(unsafe_code)]

//! End-to-end flow: drag → commit → persist → reconcile.
//!
//! Run:
//!   cargo test -p cutline-runtime --test timeline_flow

use std::collections::BTreeMap;

use cutline_layout::{CoordinateSystem, FluidParams, fluid_move, is_on_lattice, quantize};
use cutline_runtime::{
    DragEffect, DragPhase, Duration, EngineConfig, EntryId, Frame, Instant, LockReason,
    PendingOperation, PersistError, PersistUpdate, PointerInput, PointerPosition, PositionError,
    PositionMap, PositionPersistence, RemoteEntry, SyncStatus, TimelineEngine, TrackGeometry,
    UpdateOptions, UpdateOutcome,
};

// ── Fixtures ────────────────────────────────────────────────────────────

const TRACK: TrackGeometry = TrackGeometry::new(1040.0, 20.0);

/// In-memory backend that behaves like a remote document store.
#[derive(Default)]
struct MemoryBackend {
    rows: BTreeMap<EntryId, Frame>,
    calls: usize,
    fail_next: bool,
}

impl MemoryBackend {
    fn seeded(map: &PositionMap) -> Self {
        Self {
            rows: map.iter().map(|(id, frame)| (id.clone(), frame)).collect(),
            ..Self::default()
        }
    }

    fn snapshot(&self) -> Vec<RemoteEntry> {
        self.rows
            .iter()
            .map(|(id, &frame)| RemoteEntry::placed(id.clone(), frame))
            .collect()
    }
}

impl PositionPersistence for MemoryBackend {
    fn persist(&mut self, update: &PersistUpdate) -> Result<(), PersistError> {
        self.calls += 1;
        if self.fail_next {
            self.fail_next = false;
            return Err(PersistError::unavailable("connection reset"));
        }
        match update.frame {
            Some(frame) => self.rows.insert(update.id.clone(), frame),
            None => self.rows.remove(&update.id),
        };
        Ok(())
    }
}

fn engine_with(map: &PositionMap) -> TimelineEngine {
    let config = EngineConfig {
        frame_padding: 0,
        context_frames: 20,
        ..EngineConfig::default()
    };
    TimelineEngine::with_positions(config, map)
}

/// Pixel X of `frame` on the engine's current axis.
fn x_for(engine: &TimelineEngine, frame: Frame) -> f64 {
    engine.bounds().pixel_for(frame, &TRACK).unwrap()
}

fn drag(engine: &mut TimelineEngine, id: &str, to: Frame, t: Instant) -> Option<UpdateOutcome> {
    let from = engine.get_positions().get(id).unwrap();
    let start = x_for(engine, from);
    let end = x_for(engine, to);
    engine.begin_drag(id, PointerInput::pressed(start, 0.0), Some(TRACK), t);
    engine.on_pointer_move(PointerPosition::new(end, 0.0), t);
    engine.on_pointer_up(PointerPosition::new(end, 0.0), t).update
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[test]
fn fluid_move_into_anchor_gap() {
    let map = PositionMap::from([("A", 0), ("B", 50), ("C", 100)]);
    let bounds = CoordinateSystem::from_positions(&map, 0);
    let out = fluid_move(&map, "C", 10, FluidParams { min_gap: 20 }, bounds).unwrap();
    assert_eq!(out.positions, PositionMap::from([("A", 0), ("C", 20), ("B", 50)]));
}

#[test]
fn lattice_scenarios() {
    let on_lattice = PositionMap::from([("X", 1), ("Y", 5), ("Z", 9)]);
    assert_eq!(quantize(&on_lattice), on_lattice);

    let crowded = quantize(&PositionMap::from([("X", 2), ("Y", 3)]));
    let (x, y) = (crowded.get("X").unwrap(), crowded.get("Y").unwrap());
    assert!(is_on_lattice(x) && is_on_lattice(y));
    assert!(x < y);
}

#[test]
fn pending_write_protected_then_abandoned() {
    let t0 = Instant::now();
    let mut engine = engine_with(&PositionMap::from([("P", 25)]));
    let batch = engine
        .update_positions(&PositionMap::from([("P", 29)]), UpdateOptions::reason("edit"), t0)
        .batch()
        .unwrap();
    engine.take_persist_requests();
    engine.complete_persist(batch, Ok(())).unwrap();

    let stale = [RemoteEntry::placed("P", 25)];
    engine.sync_from_remote(&stale, t0 + Duration::from_secs(2));
    assert_eq!(engine.get_positions().get("P"), Some(29));

    engine.sync_from_remote(&stale, t0 + Duration::from_secs(11));
    assert_eq!(engine.get_positions().get("P"), Some(25));
    assert!(engine.store().pending("P").is_none());
}

#[test]
fn tiny_wiggle_changes_nothing_and_writes_nothing() {
    let t = Instant::now();
    let map = PositionMap::from([("E", 40), ("F", 80)]);
    let mut engine = engine_with(&map);
    let mut backend = MemoryBackend::seeded(&map);
    let before = engine.get_positions();

    let x = x_for(&engine, 40);
    engine.begin_drag("E", PointerInput::pressed(x, 10.0), Some(TRACK), t);
    engine.on_pointer_move(PointerPosition::new(x + 2.0, 10.0), t);
    engine.on_pointer_move(PointerPosition::new(x + 3.0, 10.0), t);
    let outcome = engine.on_pointer_up(PointerPosition::new(x + 3.0, 10.0), t);

    assert!(matches!(outcome.effect, DragEffect::Discarded { .. }));
    assert_eq!(engine.get_positions(), before);
    assert_eq!(engine.flush(&mut backend), Ok(0));
    assert_eq!(backend.calls, 0);
}

// ── Full round trips ────────────────────────────────────────────────────

#[test]
fn drag_persist_and_confirm() {
    let t = Instant::now();
    let map = PositionMap::from([("A", 1), ("B", 49), ("C", 101)]);
    let mut engine = engine_with(&map);
    let mut backend = MemoryBackend::seeded(&map);

    let update = drag(&mut engine, "C", 10, t).unwrap();
    assert!(matches!(update, UpdateOutcome::Applied { changed: 1, .. }));
    let committed = engine.get_positions();
    assert!(committed.iter().all(|(_, frame)| is_on_lattice(frame)));
    assert!(!committed.has_duplicate_frames());
    assert_eq!(committed.get("C"), Some(21));

    assert_eq!(engine.flush(&mut backend), Ok(1));
    assert_eq!(backend.rows.get("C"), Some(&21));
    assert!(engine.store().lock_state().is_none());
    assert_eq!(engine.store().pending("C").unwrap().operation, PendingOperation::Move);

    let report = engine.sync_from_remote(&backend.snapshot(), t + Duration::from_millis(300));
    assert_eq!(report.confirmed, 1);
    assert_eq!(report.status, SyncStatus::Unchanged);
    assert_eq!(engine.store().pending_count(), 0);
    assert_eq!(engine.get_positions(), committed);
}

#[test]
fn failed_persist_rolls_back_and_surfaces() {
    let t = Instant::now();
    let map = PositionMap::from([("A", 1), ("B", 49), ("C", 101)]);
    let mut engine = engine_with(&map);
    let mut backend = MemoryBackend {
        fail_next: true,
        ..MemoryBackend::seeded(&map)
    };

    drag(&mut engine, "C", 10, t);
    assert_eq!(engine.get_positions().get("C"), Some(21));

    let err = engine.flush(&mut backend).unwrap_err();
    assert!(matches!(err, PositionError::PersistFailed { .. }));
    assert_eq!(engine.get_positions(), map);
    assert_eq!(engine.store().pending_count(), 0);
    assert!(engine.store().lock_state().is_none());
    assert_eq!(backend.rows.get("C"), Some(&101));
}

#[test]
fn remote_edits_land_between_drags() {
    let t = Instant::now();
    let map = PositionMap::from([("A", 1), ("B", 49)]);
    let mut engine = engine_with(&map);

    let remote = [
        RemoteEntry::placed("A", 1),
        RemoteEntry::placed("B", 49),
        RemoteEntry::placed("N", 201),
    ];
    let report = engine.sync_from_remote(&remote, t);
    assert_eq!(report.status, SyncStatus::Updated);
    assert_eq!(engine.revision(), 1);

    // Same snapshot again is a no-op.
    let report = engine.sync_from_remote(&remote, t);
    assert_eq!(report.status, SyncStatus::Unchanged);
    assert_eq!(engine.revision(), 1);
}

#[test]
fn host_lock_holds_off_remote_until_timeout() {
    let t = Instant::now();
    let mut engine = engine_with(&PositionMap::from([("A", 1)]));
    engine.lock(t);

    let remote = [RemoteEntry::placed("A", 9)];
    let report = engine.sync_from_remote(&remote, t + Duration::from_secs(1));
    assert_eq!(report.status, SyncStatus::Locked);

    engine.tick(t + Duration::from_secs(6));
    assert!(engine.store().lock_state().is_none());
    engine.sync_from_remote(&remote, t + Duration::from_secs(6));
    assert_eq!(engine.get_positions().get("A"), Some(9));
}

#[test]
fn drag_holds_lock_until_release() {
    let t = Instant::now();
    let mut engine = engine_with(&PositionMap::from([("A", 1), ("B", 49), ("C", 101)]));
    let start = x_for(&engine, 101);
    engine.begin_drag("C", PointerInput::pressed(start, 0.0), Some(TRACK), t);
    assert!(engine.store().lock_state().is_none());

    engine.on_pointer_move(PointerPosition::new(start - 300.0, 0.0), t);
    assert_eq!(engine.drag_phase(), DragPhase::Dragging);
    assert_eq!(engine.store().lock_state().unwrap().reason, LockReason::Drag);
    assert!(engine.preview().is_some());

    engine.on_pointer_up(PointerPosition::new(start - 300.0, 0.0), t);
    assert_eq!(engine.store().lock_state().unwrap().reason, LockReason::Persist);
}
