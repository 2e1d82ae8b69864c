#![forbid(unsafe_code)]

//! Drag controller: pointer gesture in, fluid preview and commit map out.
//!
//! [`DragController`] glues the pointer-side [`DragGesture`] to the layout
//! solvers. While a drag is live it keeps a private snapshot of the positions
//! taken at press time and a [`CoordinateSystem`] that grows as the pointer
//! pushes past its edges. Every motion sample recomputes the preview from
//! that snapshot, so previews never accumulate drift.
//!
//! # Invariants
//!
//! 1. The preview is derived state. It is never written to the store.
//! 2. A release that never crossed the drag threshold yields
//!    [`DragEffect::Discarded`] and no commit map.
//! 3. The commit map returned on release has passed through fluid layout,
//!    quantization, and conflict resolution, in that order.
//! 4. The coordinate bounds for a session only ever grow.
//!
//! # Failure Modes
//!
//! - Missing or unusable track geometry aborts the press with
//!   [`DragNoopReason::MissingGeometry`].
//! - An entry that disappears from the committed map mid-drag turns the
//!   release into [`DragNoopReason::UnknownEntry`] and drops the session.

use cutline_core::{
    DragGesture, DragNoopReason, DragPhase, DragSession, EntryId, Frame, GestureConfig,
    GestureStep, Instant, PointerInput, PointerPosition, PositionMap, TrackGeometry,
};
use cutline_layout::{
    ConflictResolution, CoordinateSystem, FluidOutcome, FluidParams, Reassignment, fluid_move,
    settle,
};
use tracing::{debug, trace};

/// Distances from the candidate frame to its nearest neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeighborDistance {
    /// Frames back to the closest entry at or before the candidate.
    pub before: Option<Frame>,
    /// Frames forward to the closest entry after the candidate.
    pub after: Option<Frame>,
}

/// What a pointer event did to the drag.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEffect {
    /// A press armed a session; nothing moves until the threshold is crossed.
    Armed { id: EntryId },
    /// The threshold was crossed; a preview may now be shown.
    Started {
        id: EntryId,
        candidate: Option<Frame>,
    },
    /// The preview was recomputed.
    Preview { candidate: Option<Frame> },
    /// Release after a real drag. `positions` is ready to commit.
    Released {
        id: EntryId,
        positions: PositionMap,
        moved_to: Frame,
        reassigned: Vec<Reassignment>,
    },
    /// Release below the threshold. Nothing may change.
    Discarded { id: EntryId },
    /// The session was dropped without a release.
    Canceled { id: EntryId },
    Noop(DragNoopReason),
}

#[derive(Debug, Clone)]
struct LiveDrag {
    geometry: TrackGeometry,
    base: PositionMap,
    bounds: CoordinateSystem,
    candidate: Option<Frame>,
    preview: Option<FluidOutcome>,
}

/// Turns pointer samples over the track into layout previews and commits.
#[derive(Debug, Clone)]
pub struct DragController {
    gesture: DragGesture,
    params: FluidParams,
    frame_padding: Frame,
    live: Option<LiveDrag>,
}

impl DragController {
    #[must_use]
    pub fn new(gesture: GestureConfig, params: FluidParams, frame_padding: Frame) -> Self {
        Self {
            gesture: DragGesture::new(gesture),
            params,
            frame_padding,
            live: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> DragPhase {
        self.gesture.phase()
    }

    #[must_use]
    pub fn session(&self) -> Option<&DragSession> {
        self.gesture.session()
    }

    #[must_use]
    pub fn params(&self) -> FluidParams {
        self.params
    }

    /// Change spacing; takes effect from the next motion sample.
    pub fn set_params(&mut self, params: FluidParams) {
        self.params = params;
    }

    /// Candidate frame under the pointer, once dragging.
    #[must_use]
    pub fn candidate(&self) -> Option<Frame> {
        self.live.as_ref().and_then(|live| live.candidate)
    }

    /// Preview layout for the current candidate.
    #[must_use]
    pub fn preview(&self) -> Option<&PositionMap> {
        self.live
            .as_ref()
            .and_then(|live| live.preview.as_ref())
            .map(|outcome| &outcome.positions)
    }

    /// Coordinate bounds of the live session.
    #[must_use]
    pub fn bounds(&self) -> Option<CoordinateSystem> {
        self.live.as_ref().map(|live| live.bounds)
    }

    /// Entry that exactly occupies the candidate frame, other than the mover.
    #[must_use]
    pub fn swap_target(&self) -> Option<&EntryId> {
        let live = self.live.as_ref()?;
        let active = &self.gesture.session()?.active_id;
        let candidate = live.candidate?;
        live.base.entry_at(candidate).filter(|id| *id != active)
    }

    /// Distance from the candidate to the nearest other entries on each side.
    #[must_use]
    pub fn neighbor_distance(&self) -> Option<NeighborDistance> {
        let live = self.live.as_ref()?;
        let active = &self.gesture.session()?.active_id;
        let candidate = live.candidate?;
        let mut distance = NeighborDistance::default();
        for (id, frame) in live.base.iter() {
            if id == active {
                continue;
            }
            if frame <= candidate {
                let d = candidate - frame;
                distance.before = Some(distance.before.map_or(d, |b| b.min(d)));
            } else {
                let d = frame - candidate;
                distance.after = Some(distance.after.map_or(d, |a| a.min(d)));
            }
        }
        Some(distance)
    }

    /// Pointer-down on entry `id`.
    pub fn begin(
        &mut self,
        id: &str,
        input: PointerInput,
        geometry: Option<TrackGeometry>,
        positions: &PositionMap,
        now: Instant,
    ) -> DragEffect {
        if self.gesture.phase() != DragPhase::Idle {
            return DragEffect::Noop(DragNoopReason::SessionAlreadyActive);
        }
        let Some(original) = positions.get(id) else {
            debug!(id, "press on entry without a position");
            return DragEffect::Noop(DragNoopReason::UnknownEntry);
        };
        let Some(geometry) = geometry.filter(|g| g.usable_width().is_some()) else {
            debug!(id, ?geometry, "press without usable track geometry");
            return DragEffect::Noop(DragNoopReason::MissingGeometry);
        };

        match self.gesture.press(EntryId::from(id), original, input, now) {
            GestureStep::Armed => {
                self.live = Some(LiveDrag {
                    geometry,
                    base: positions.clone(),
                    bounds: CoordinateSystem::from_positions(positions, self.frame_padding),
                    candidate: None,
                    preview: None,
                });
                DragEffect::Armed {
                    id: EntryId::from(id),
                }
            }
            GestureStep::Noop(reason) => DragEffect::Noop(reason),
            other => {
                debug!(?other, "unexpected press outcome");
                DragEffect::Noop(DragNoopReason::SessionAlreadyActive)
            }
        }
    }

    /// Pointer-move sample.
    pub fn pointer_move(&mut self, position: PointerPosition) -> DragEffect {
        match self.gesture.motion(position) {
            GestureStep::Started => {
                let candidate = self.refresh_preview(position);
                let Some(id) = self.active_id() else {
                    return DragEffect::Noop(DragNoopReason::NoActiveSession);
                };
                debug!(%id, ?candidate, "drag started");
                DragEffect::Started { id, candidate }
            }
            GestureStep::Moved => DragEffect::Preview {
                candidate: self.refresh_preview(position),
            },
            GestureStep::Noop(reason) => DragEffect::Noop(reason),
            other => {
                debug!(?other, "unexpected motion outcome");
                DragEffect::Noop(DragNoopReason::NoActiveSession)
            }
        }
    }

    /// Pointer-up.
    ///
    /// `positions` is the committed map at release time; the final layout is
    /// computed against it rather than the press-time snapshot.
    /// Call [`finish`](Self::finish) once the result has been handed off.
    pub fn pointer_up(&mut self, position: PointerPosition, positions: &PositionMap) -> DragEffect {
        match self.gesture.release(position) {
            GestureStep::Discarded(session) => {
                self.live = None;
                debug!(id = %session.active_id, "release below drag threshold; discarded");
                DragEffect::Discarded {
                    id: session.active_id,
                }
            }
            GestureStep::Released(session) => self.settle_release(session, position, positions),
            GestureStep::Noop(reason) => DragEffect::Noop(reason),
            other => {
                debug!(?other, "unexpected release outcome");
                DragEffect::Noop(DragNoopReason::NoActiveSession)
            }
        }
    }

    /// Close out a released session and start the release block window.
    pub fn finish(&mut self, now: Instant) {
        self.gesture.finish(now);
        self.live = None;
    }

    /// Drop any live session without committing.
    pub fn cancel(&mut self) -> Option<EntryId> {
        self.live = None;
        let session = self.gesture.cancel()?;
        debug!(id = %session.active_id, "drag canceled");
        Some(session.active_id)
    }

    fn active_id(&self) -> Option<EntryId> {
        self.gesture.session().map(|s| s.active_id.clone())
    }

    fn refresh_preview(&mut self, position: PointerPosition) -> Option<Frame> {
        let active = self.active_id()?;
        let params = self.params;
        let live = self.live.as_mut()?;

        let candidate = live.bounds.frame_at(position.x, &live.geometry);
        live.candidate = candidate;
        let Some(candidate) = candidate else {
            live.preview = None;
            return None;
        };
        if !live.bounds.contains(candidate) {
            live.bounds.extend_to(candidate);
        }

        match fluid_move(&live.base, active.as_str(), candidate, params, live.bounds) {
            Ok(outcome) => {
                trace!(%active, candidate, moved_to = outcome.moved_to, "preview updated");
                live.bounds = outcome.bounds;
                live.preview = Some(outcome);
            }
            Err(err) => {
                debug!(%err, "preview unavailable");
                live.preview = None;
            }
        }
        Some(candidate)
    }

    fn settle_release(
        &mut self,
        session: DragSession,
        position: PointerPosition,
        positions: &PositionMap,
    ) -> DragEffect {
        let id = session.active_id.clone();
        let target = self
            .refresh_preview(position)
            .or_else(|| self.candidate())
            .unwrap_or(session.original_frame);
        let bounds = self
            .bounds()
            .unwrap_or_else(|| CoordinateSystem::from_positions(positions, self.frame_padding));

        let moved = match fluid_move(positions, id.as_str(), target, self.params, bounds) {
            Ok(moved) => moved,
            Err(err) => {
                debug!(%err, "released entry no longer present");
                self.gesture.cancel();
                self.live = None;
                return DragEffect::Noop(DragNoopReason::UnknownEntry);
            }
        };

        let ConflictResolution {
            positions: settled,
            reassigned,
        } = settle(&moved.positions);
        let moved_to = settled.get(id.as_str()).unwrap_or(moved.moved_to);
        debug!(%id, target, moved_to, "drag released");
        DragEffect::Released {
            id,
            positions: settled,
            moved_to,
            reassigned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_core::Duration;

    const TRACK: TrackGeometry = TrackGeometry::new(1040.0, 20.0);

    fn controller() -> DragController {
        DragController::new(GestureConfig::default(), FluidParams::from_context(20), 0)
    }

    fn scene() -> PositionMap {
        // With zero padding the bounds are 0..=100 over 1000 usable px,
        // so one frame is 10px and frame f sits at x = 20 + 10f.
        PositionMap::from([("A", 0), ("B", 50), ("C", 100)])
    }

    fn x_for(frame: Frame) -> f64 {
        20.0 + 10.0 * frame as f64
    }

    #[test]
    fn press_requires_geometry_and_known_entry() {
        let mut drag = controller();
        let t = Instant::now();
        let map = scene();

        let effect = drag.begin("C", PointerInput::pressed(x_for(100), 5.0), None, &map, t);
        assert_eq!(effect, DragEffect::Noop(DragNoopReason::MissingGeometry));

        let bad = TrackGeometry::new(10.0, 20.0);
        let effect = drag.begin("C", PointerInput::pressed(0.0, 5.0), Some(bad), &map, t);
        assert_eq!(effect, DragEffect::Noop(DragNoopReason::MissingGeometry));

        let effect = drag.begin("Z", PointerInput::pressed(0.0, 5.0), Some(TRACK), &map, t);
        assert_eq!(effect, DragEffect::Noop(DragNoopReason::UnknownEntry));
        assert_eq!(drag.phase(), DragPhase::Idle);
    }

    #[test]
    fn sub_threshold_release_is_discarded() {
        let mut drag = controller();
        let t = Instant::now();
        let map = scene();
        drag.begin("C", PointerInput::pressed(x_for(100), 5.0), Some(TRACK), &map, t);

        let effect = drag.pointer_move(PointerPosition::new(x_for(100) - 3.0, 5.0));
        assert_eq!(effect, DragEffect::Noop(DragNoopReason::ThresholdNotReached));
        assert!(drag.preview().is_none());

        let effect = drag.pointer_up(PointerPosition::new(x_for(100) - 3.0, 5.0), &map);
        assert_eq!(effect, DragEffect::Discarded { id: EntryId::from("C") });
        assert_eq!(drag.phase(), DragPhase::Idle);
    }

    #[test]
    fn preview_follows_pointer_and_release_settles() {
        let mut drag = controller();
        let t = Instant::now();
        let map = scene();
        drag.begin("C", PointerInput::pressed(x_for(100), 5.0), Some(TRACK), &map, t);

        let effect = drag.pointer_move(PointerPosition::new(x_for(10), 5.0));
        assert_eq!(
            effect,
            DragEffect::Started {
                id: EntryId::from("C"),
                candidate: Some(10)
            }
        );
        assert_eq!(
            drag.preview(),
            Some(&PositionMap::from([("A", 0), ("C", 20), ("B", 50)]))
        );
        assert_eq!(drag.swap_target(), None);
        assert_eq!(
            drag.neighbor_distance(),
            Some(NeighborDistance {
                before: Some(10),
                after: Some(40)
            })
        );

        let effect = drag.pointer_up(PointerPosition::new(x_for(10), 5.0), &map);
        let DragEffect::Released {
            positions,
            moved_to,
            ..
        } = effect
        else {
            panic!("expected release, got {effect:?}");
        };
        // Fluid gives {A:0, C:20, B:50}; the lattice snaps that to 1, 21, 49.
        assert_eq!(positions, PositionMap::from([("A", 1), ("C", 21), ("B", 49)]));
        assert_eq!(moved_to, 21);
        assert_eq!(drag.phase(), DragPhase::Releasing);

        drag.finish(t);
        assert_eq!(drag.phase(), DragPhase::Idle);
        assert!(drag.preview().is_none());
    }

    #[test]
    fn exact_hover_reports_swap_target() {
        let mut drag = controller();
        let t = Instant::now();
        let map = scene();
        drag.begin("C", PointerInput::pressed(x_for(100), 5.0), Some(TRACK), &map, t);
        drag.pointer_move(PointerPosition::new(x_for(50), 5.0));
        assert_eq!(drag.candidate(), Some(50));
        assert_eq!(drag.swap_target(), Some(&EntryId::from("B")));
        assert_eq!(drag.neighbor_distance().unwrap().before, Some(0));
    }

    #[test]
    fn pointer_past_right_edge_grows_bounds() {
        let mut drag = controller();
        let t = Instant::now();
        let map = scene();
        drag.begin("A", PointerInput::pressed(x_for(0), 5.0), Some(TRACK), &map, t);
        let before = drag.bounds().unwrap();

        drag.pointer_move(PointerPosition::new(TRACK.width_px + 200.0, 5.0));
        let after = drag.bounds().unwrap();
        assert!(after.max > before.max);
        assert!(after.min <= before.min);
        assert!(drag.preview().is_some());
    }

    #[test]
    fn cooldown_refuses_immediate_press() {
        let mut drag = controller();
        let t = Instant::now();
        let map = scene();
        drag.begin("C", PointerInput::pressed(x_for(100), 5.0), Some(TRACK), &map, t);
        drag.pointer_move(PointerPosition::new(x_for(70), 5.0));
        drag.pointer_up(PointerPosition::new(x_for(70), 5.0), &map);
        drag.finish(t);

        let effect = drag.begin(
            "B",
            PointerInput::pressed(x_for(50), 5.0),
            Some(TRACK),
            &map,
            t + Duration::from_millis(50),
        );
        assert_eq!(effect, DragEffect::Noop(DragNoopReason::CoolingDown));

        let effect = drag.begin(
            "B",
            PointerInput::pressed(x_for(50), 5.0),
            Some(TRACK),
            &map,
            t + Duration::from_millis(150),
        );
        assert_eq!(effect, DragEffect::Armed { id: EntryId::from("B") });
    }

    #[test]
    fn cancel_drops_session() {
        let mut drag = controller();
        let t = Instant::now();
        let map = scene();
        drag.begin("C", PointerInput::pressed(x_for(100), 5.0), Some(TRACK), &map, t);
        drag.pointer_move(PointerPosition::new(x_for(30), 5.0));
        assert_eq!(drag.cancel(), Some(EntryId::from("C")));
        assert_eq!(drag.phase(), DragPhase::Idle);
        assert!(drag.preview().is_none());
        assert_eq!(drag.cancel(), None);
    }

    #[test]
    fn entry_removed_mid_drag_aborts_release() {
        let mut drag = controller();
        let t = Instant::now();
        let map = scene();
        drag.begin("C", PointerInput::pressed(x_for(100), 5.0), Some(TRACK), &map, t);
        drag.pointer_move(PointerPosition::new(x_for(30), 5.0));

        let without_c = PositionMap::from([("A", 0), ("B", 50)]);
        let effect = drag.pointer_up(PointerPosition::new(x_for(30), 5.0), &without_c);
        assert_eq!(effect, DragEffect::Noop(DragNoopReason::UnknownEntry));
        assert_eq!(drag.phase(), DragPhase::Idle);
    }
}
