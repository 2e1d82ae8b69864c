#![forbid(unsafe_code)]

//! Fluid layout: move one entry and reflow its neighbors to keep spacing.
//!
//! # Algorithm
//!
//! 1. If another entry sits exactly on the target frame, the two swap: the
//!    mover takes the target and the occupant takes the mover's old frame.
//! 2. Otherwise the mover is placed on the target directly.
//! 3. If the mover vacated [`ANCHOR_FRAME`] and nobody took it over, the
//!    remaining entry with the lowest frame is moved onto the anchor.
//! 4. The other entries are walked in frame order, each pushed forward to at
//!    least `previous + min_gap`. The mover is slotted in ahead of the first
//!    entry whose reflowed frame would reach the target, at
//!    `max(target, previous + min_gap)`.
//!
//! # Invariants
//!
//! 1. Output frames are strictly increasing in walk order, with every adjacent
//!    pair at least `min_gap` apart. Frames are therefore unique.
//! 2. Entries only ever move forward during reflow.
//! 3. No entry other than the mover ends on the target unless the mover does
//!    too, so reapplying the same move to the output is a no-op.
//! 4. Returned bounds contain every output frame.

use std::fmt;

use cutline_core::{EntryId, Frame, PositionMap};
use rustc_hash::FxHashMap;

use crate::coordinates::CoordinateSystem;

/// Distinguished slot that stays occupied whenever any entries exist.
pub const ANCHOR_FRAME: Frame = 0;

/// Default host adjacency parameter.
pub const DEFAULT_CONTEXT_FRAMES: u32 = 16;

/// Spacing parameters for a fluid move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluidParams {
    /// Minimum distance between adjacent entries. Always at least 1.
    pub min_gap: Frame,
}

impl FluidParams {
    /// Derive `min_gap` from the host's adjacency context.
    #[must_use]
    pub fn from_context(context: u32) -> Self {
        Self {
            min_gap: Frame::from(context.max(1)),
        }
    }
}

impl Default for FluidParams {
    fn default() -> Self {
        Self::from_context(DEFAULT_CONTEXT_FRAMES)
    }
}

/// Result of [`fluid_move`].
#[derive(Debug, Clone, PartialEq)]
pub struct FluidOutcome {
    pub positions: PositionMap,
    /// Input bounds, extended to cover any frame pushed outside them.
    pub bounds: CoordinateSystem,
    /// Frame the mover ended on (may exceed the target after reflow).
    pub moved_to: Frame,
    /// Entry that traded places with the mover.
    pub swapped_with: Option<EntryId>,
    /// Entry pulled onto the anchor slot after the mover left it.
    pub anchor_reassigned: Option<EntryId>,
}

/// Fluid layout failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FluidLayoutError {
    UnknownEntry { id: EntryId },
}

impl fmt::Display for FluidLayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEntry { id } => write!(f, "entry {id} has no position"),
        }
    }
}

impl std::error::Error for FluidLayoutError {}

/// Move `id` to `target` and reflow the rest of `positions`.
pub fn fluid_move(
    positions: &PositionMap,
    id: &str,
    target: Frame,
    params: FluidParams,
    bounds: CoordinateSystem,
) -> Result<FluidOutcome, FluidLayoutError> {
    let Some(old) = positions.get(id) else {
        return Err(FluidLayoutError::UnknownEntry {
            id: EntryId::from(id),
        });
    };
    if old == target {
        return Ok(FluidOutcome {
            positions: positions.clone(),
            bounds,
            moved_to: old,
            swapped_with: None,
            anchor_reassigned: None,
        });
    }

    let mut others: Vec<(EntryId, Frame)> = positions
        .iter()
        .filter(|(other, _)| other.as_str() != id)
        .map(|(other, frame)| (other.clone(), frame))
        .collect();

    let swapped_with = others
        .iter_mut()
        .find(|(_, frame)| *frame == target)
        .map(|(other, frame)| {
            *frame = old;
            other.clone()
        });

    let anchor_reassigned = if old == ANCHOR_FRAME
        && !others.iter().any(|(_, frame)| *frame == ANCHOR_FRAME)
    {
        others
            .iter_mut()
            .min_by_key(|(_, frame)| *frame)
            .map(|(other, frame)| {
                *frame = ANCHOR_FRAME;
                other.clone()
            })
    } else {
        None
    };

    // Stable: equal frames keep insertion order.
    others.sort_by_key(|(_, frame)| *frame);

    let gap = params.min_gap.max(1);
    let floor = |prev: Option<Frame>, frame: Frame| {
        prev.map_or(frame, |p| frame.max(p.saturating_add(gap)))
    };

    let mut placed: FxHashMap<EntryId, Frame> = FxHashMap::default();
    placed.reserve(positions.len());
    let mut moved_to = None;
    let mut prev = None;
    for (other, frame) in others {
        if moved_to.is_none() && floor(prev, frame) >= target {
            let slot = floor(prev, target);
            moved_to = Some(slot);
            prev = Some(slot);
        }
        let fixed = floor(prev, frame);
        placed.insert(other, fixed);
        prev = Some(fixed);
    }
    let moved_to = moved_to.unwrap_or_else(|| floor(prev, target));
    placed.insert(EntryId::from(id), moved_to);

    let out: PositionMap = positions
        .ids()
        .filter_map(|entry| placed.get(entry).map(|&frame| (entry.clone(), frame)))
        .collect();

    let mut bounds = bounds;
    for edge in [out.min_frame(), out.max_frame()].into_iter().flatten() {
        if !bounds.contains(edge) {
            bounds.extend_to(edge);
        }
    }

    Ok(FluidOutcome {
        positions: out,
        bounds,
        moved_to,
        swapped_with,
        anchor_reassigned,
    })
}
