#![forbid(unsafe_code)]

//! Timeline layout solvers.
//!
//! Every solver here is a pure function from one [`PositionMap`] to another.
//! None of them touch the store, the clock, or the pointer.

pub mod conflict;
pub mod coordinates;
pub mod fluid;
pub mod quantize;

pub use conflict::{ConflictResolution, Reassignment, resolve_conflicts};
pub use coordinates::{CoordinateSystem, DEFAULT_FRAME_PADDING};
pub use cutline_core::{EntryId, Frame, PositionMap, TrackGeometry};
pub use fluid::{
    ANCHOR_FRAME, DEFAULT_CONTEXT_FRAMES, FluidLayoutError, FluidOutcome, FluidParams, fluid_move,
};
pub use quantize::{LATTICE_OFFSET, LATTICE_STRIDE, is_on_lattice, nearest_lattice_point, quantize};

/// Commit-time cleanup: quantize onto the lattice, then resolve duplicates.
///
/// Quantization already yields unique frames, so the resolver only has work
/// to do if a caller hands in something the quantizer could not separate.
#[must_use]
pub fn settle(positions: &PositionMap) -> ConflictResolution {
    resolve_conflicts(&quantize(positions))
}
