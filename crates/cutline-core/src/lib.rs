#![forbid(unsafe_code)]

//! Core: entry ids, position maps, pointer geometry, and drag gesture tracking.
//!
//! # Role in cutline
//! `cutline-core` holds the value types every other layer speaks in. The layout
//! solvers (`cutline-layout`) take and return [`PositionMap`]s; the runtime
//! (`cutline-runtime`) owns the authoritative map and feeds pointer samples
//! through [`DragGesture`].
//!
//! # Primary responsibilities
//! - **PositionMap**: insertion-ordered `EntryId → Frame` mapping.
//! - **Geometry**: pointer samples and track container measurements.
//! - **Gesture**: the threshold-gated press → drag → release lifecycle.

pub mod geometry;
pub mod gesture;
pub mod position;

pub use geometry::{PointerInput, PointerPosition, TrackGeometry};
pub use gesture::{
    DragGesture, DragNoopReason, DragPhase, DragSession, GestureConfig, GestureStep,
};
pub use position::{EntryId, Frame, PositionMap};

/// Re-export so downstream crates agree on the clock type.
pub use web_time::{Duration, Instant};
