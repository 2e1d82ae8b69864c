#![forbid(unsafe_code)]

//! Drag gesture tracking: pointer samples in, lifecycle transitions out.
//!
//! [`DragGesture`] owns the pointer half of a timeline drag. It knows nothing
//! about frames beyond remembering the entry's frame at press time; turning
//! pointer X into a candidate frame and laying out neighbors is the
//! controller's job.
//!
//! # State Machine
//!
//! ```text
//! Idle -> ThresholdPending -> Dragging -> Releasing -> Idle
//!              \--------------------------------------> Idle (release below threshold / cancel)
//! ```
//!
//! # Invariants
//!
//! 1. At most one session exists at a time. A press while a session is live is
//!    ignored, never queued.
//! 2. A session only reaches `Dragging` after a motion sample whose Euclidean
//!    distance from the press point strictly exceeds the threshold.
//! 3. A release from `ThresholdPending` discards the session; callers must not
//!    mutate anything for it.
//! 4. After `finish`, new presses are refused until the release block window
//!    elapses, so the tail of one physical gesture cannot start another.
//!
//! # Failure Modes
//!
//! - Motion or release with no session is a no-op with
//!   [`DragNoopReason::NoActiveSession`].
//! - Focus loss or host teardown should call [`DragGesture::cancel`], which
//!   drops the session without entering `Releasing`.

use serde::{Deserialize, Serialize};
use web_time::{Duration, Instant};

use crate::geometry::{PointerInput, PointerPosition};
use crate::position::{EntryId, Frame};

/// Default pixel distance a press must travel before it becomes a drag.
pub const DEFAULT_DRAG_THRESHOLD_PX: f64 = 5.0;

/// Default window after a release during which new presses are refused.
pub const DEFAULT_RELEASE_BLOCK: Duration = Duration::from_millis(100);

/// Thresholds for drag recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Distance (px) a press must exceed before dragging starts (default: 5).
    pub threshold_px: f64,
    /// Post-release cooldown before a new press is accepted (default: 100ms).
    pub release_block: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            release_block: DEFAULT_RELEASE_BLOCK,
        }
    }
}

/// Lifecycle phase of the drag gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragPhase {
    #[default]
    Idle,
    ThresholdPending,
    Dragging,
    Releasing,
}

/// Ephemeral state of one press → release interaction. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub active_id: EntryId,
    pub start_pointer: PointerPosition,
    pub current_pointer: PointerPosition,
    pub original_frame: Frame,
    pub passed_threshold: bool,
}

impl DragSession {
    /// Distance travelled from the press point to the latest sample.
    #[must_use]
    pub fn displacement(&self) -> f64 {
        self.start_pointer.distance(self.current_pointer)
    }
}

/// Why a pointer event was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragNoopReason {
    NoActiveSession,
    SessionAlreadyActive,
    PrimaryButtonNotHeld,
    CoolingDown,
    UnknownEntry,
    MissingGeometry,
    ThresholdNotReached,
    NoCandidate,
}

/// Result of feeding one pointer event into the gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureStep {
    /// A press armed a new session.
    Armed,
    /// This motion sample crossed the threshold; dragging has begun.
    Started,
    /// A motion sample while already dragging.
    Moved,
    /// Release after a real drag; the session is now `Releasing`.
    Released(DragSession),
    /// Release (or cancel) before the threshold; nothing may change.
    Discarded(DragSession),
    /// Event ignored.
    Noop(DragNoopReason),
}

/// Pointer-driven drag lifecycle tracker.
#[derive(Debug, Clone, Default)]
pub struct DragGesture {
    config: GestureConfig,
    phase: DragPhase,
    session: Option<DragSession>,
    blocked_until: Option<Instant>,
}

impl DragGesture {
    /// Create a tracker with the given thresholds.
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            phase: DragPhase::Idle,
            session: None,
            blocked_until: None,
        }
    }

    /// Current lifecycle phase.
    #[inline]
    #[must_use]
    pub const fn phase(&self) -> DragPhase {
        self.phase
    }

    /// The live session, if any.
    #[inline]
    #[must_use]
    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Whether the session has crossed the threshold and not yet been released.
    #[inline]
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.phase == DragPhase::Dragging
    }

    /// Whether a press at `now` would be refused by the release block window.
    #[must_use]
    pub fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Pointer-down on an entry currently at `original_frame`.
    pub fn press(
        &mut self,
        active_id: EntryId,
        original_frame: Frame,
        input: PointerInput,
        now: Instant,
    ) -> GestureStep {
        if self.phase != DragPhase::Idle {
            return GestureStep::Noop(DragNoopReason::SessionAlreadyActive);
        }
        if !input.primary_pressed {
            return GestureStep::Noop(DragNoopReason::PrimaryButtonNotHeld);
        }
        if self.is_blocked(now) {
            return GestureStep::Noop(DragNoopReason::CoolingDown);
        }
        self.blocked_until = None;
        self.session = Some(DragSession {
            active_id,
            start_pointer: input.position,
            current_pointer: input.position,
            original_frame,
            passed_threshold: false,
        });
        self.phase = DragPhase::ThresholdPending;
        GestureStep::Armed
    }

    /// Pointer-move sample. Samples apply in arrival order; the last one wins.
    pub fn motion(&mut self, position: PointerPosition) -> GestureStep {
        let threshold = self.config.threshold_px;
        let Some(session) = self.session.as_mut() else {
            return GestureStep::Noop(DragNoopReason::NoActiveSession);
        };
        session.current_pointer = position;
        match self.phase {
            DragPhase::ThresholdPending => {
                if session.displacement() > threshold {
                    session.passed_threshold = true;
                    self.phase = DragPhase::Dragging;
                    GestureStep::Started
                } else {
                    GestureStep::Noop(DragNoopReason::ThresholdNotReached)
                }
            }
            DragPhase::Dragging => GestureStep::Moved,
            DragPhase::Idle | DragPhase::Releasing => {
                GestureStep::Noop(DragNoopReason::NoActiveSession)
            }
        }
    }

    /// Pointer-up.
    ///
    /// From `Dragging` the session moves to `Releasing` and a copy is returned
    /// for the caller to commit; call [`finish`](Self::finish) once the commit
    /// has been handed off. From `ThresholdPending` the session is discarded.
    pub fn release(&mut self, position: PointerPosition) -> GestureStep {
        match self.phase {
            DragPhase::Dragging => {
                let Some(session) = self.session.as_mut() else {
                    self.phase = DragPhase::Idle;
                    return GestureStep::Noop(DragNoopReason::NoActiveSession);
                };
                session.current_pointer = position;
                let released = session.clone();
                self.phase = DragPhase::Releasing;
                GestureStep::Released(released)
            }
            DragPhase::ThresholdPending => {
                self.phase = DragPhase::Idle;
                match self.session.take() {
                    Some(session) => GestureStep::Discarded(session),
                    None => GestureStep::Noop(DragNoopReason::NoActiveSession),
                }
            }
            DragPhase::Idle | DragPhase::Releasing => {
                GestureStep::Noop(DragNoopReason::NoActiveSession)
            }
        }
    }

    /// `Releasing -> Idle`, opening the release block window.
    pub fn finish(&mut self, now: Instant) {
        if self.phase == DragPhase::Releasing {
            self.session = None;
            self.phase = DragPhase::Idle;
            self.blocked_until = Some(now + self.config.release_block);
        }
    }

    /// Drop any live session without a release. Returns the dropped session.
    pub fn cancel(&mut self) -> Option<DragSession> {
        self.phase = DragPhase::Idle;
        self.session.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_50: Duration = Duration::from_millis(50);
    const MS_150: Duration = Duration::from_millis(150);

    fn armed(t: Instant) -> DragGesture {
        let mut gesture = DragGesture::new(GestureConfig::default());
        let step = gesture.press(EntryId::from("e"), 40, PointerInput::pressed(100.0, 10.0), t);
        assert_eq!(step, GestureStep::Armed);
        gesture
    }

    #[test]
    fn press_requires_primary_button() {
        let mut gesture = DragGesture::default();
        let step = gesture.press(
            EntryId::from("e"),
            0,
            PointerInput::released(0.0, 0.0),
            Instant::now(),
        );
        assert_eq!(step, GestureStep::Noop(DragNoopReason::PrimaryButtonNotHeld));
        assert_eq!(gesture.phase(), DragPhase::Idle);
    }

    #[test]
    fn second_press_is_ignored() {
        let t = Instant::now();
        let mut gesture = armed(t);
        let step = gesture.press(EntryId::from("other"), 0, PointerInput::pressed(0.0, 0.0), t);
        assert_eq!(step, GestureStep::Noop(DragNoopReason::SessionAlreadyActive));
        assert_eq!(gesture.session().map(|s| s.active_id.as_str()), Some("e"));
    }

    #[test]
    fn threshold_is_euclidean_and_strict() {
        let t = Instant::now();
        let mut gesture = armed(t);

        // 3-4-5 triangle: exactly on the threshold does not start a drag.
        let step = gesture.motion(PointerPosition::new(103.0, 14.0));
        assert_eq!(step, GestureStep::Noop(DragNoopReason::ThresholdNotReached));
        assert_eq!(gesture.phase(), DragPhase::ThresholdPending);

        let step = gesture.motion(PointerPosition::new(104.0, 14.0));
        assert_eq!(step, GestureStep::Started);
        assert!(gesture.is_dragging());

        let step = gesture.motion(PointerPosition::new(90.0, 10.0));
        assert_eq!(step, GestureStep::Moved);
    }

    #[test]
    fn release_below_threshold_discards() {
        let t = Instant::now();
        let mut gesture = armed(t);
        gesture.motion(PointerPosition::new(102.0, 11.0));
        let step = gesture.release(PointerPosition::new(103.0, 10.0));
        let GestureStep::Discarded(session) = step else {
            panic!("expected discard, got {step:?}");
        };
        assert!(!session.passed_threshold);
        assert_eq!(gesture.phase(), DragPhase::Idle);
        assert!(gesture.session().is_none());
        // Discard does not open the block window.
        assert!(!gesture.is_blocked(t));
    }

    #[test]
    fn release_after_drag_enters_releasing_then_blocks() {
        let t = Instant::now();
        let mut gesture = armed(t);
        gesture.motion(PointerPosition::new(150.0, 10.0));
        let step = gesture.release(PointerPosition::new(160.0, 10.0));
        let GestureStep::Released(session) = step else {
            panic!("expected release, got {step:?}");
        };
        assert_eq!(session.current_pointer, PointerPosition::new(160.0, 10.0));
        assert_eq!(session.original_frame, 40);
        assert_eq!(gesture.phase(), DragPhase::Releasing);

        let finished_at = t + MS_50;
        gesture.finish(finished_at);
        assert_eq!(gesture.phase(), DragPhase::Idle);

        let step = gesture.press(
            EntryId::from("e"),
            40,
            PointerInput::pressed(0.0, 0.0),
            finished_at + MS_50,
        );
        assert_eq!(step, GestureStep::Noop(DragNoopReason::CoolingDown));

        let step = gesture.press(
            EntryId::from("e"),
            40,
            PointerInput::pressed(0.0, 0.0),
            finished_at + MS_150,
        );
        assert_eq!(step, GestureStep::Armed);
    }

    #[test]
    fn motion_without_session_is_noop() {
        let mut gesture = DragGesture::default();
        assert_eq!(
            gesture.motion(PointerPosition::new(1.0, 1.0)),
            GestureStep::Noop(DragNoopReason::NoActiveSession)
        );
        assert_eq!(
            gesture.release(PointerPosition::new(1.0, 1.0)),
            GestureStep::Noop(DragNoopReason::NoActiveSession)
        );
    }

    #[test]
    fn cancel_resets_to_idle() {
        let t = Instant::now();
        let mut gesture = armed(t);
        gesture.motion(PointerPosition::new(200.0, 10.0));
        let dropped = gesture.cancel();
        assert!(dropped.is_some_and(|s| s.passed_threshold));
        assert_eq!(gesture.phase(), DragPhase::Idle);
        assert!(gesture.cancel().is_none());
    }
}
