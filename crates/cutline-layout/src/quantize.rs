#![forbid(unsafe_code)]

//! Snap positions onto the `4N+1` lattice required downstream.
//!
//! # Invariants
//!
//! 1. Every output frame satisfies `frame.rem_euclid(4) == 1`.
//! 2. Rank order is preserved: if `a < b` before, `a < b` after. Entries that
//!    shared a frame keep their insertion order.
//! 3. Output frames are unique. A collision pushes the later entry up to the
//!    next lattice point, cascading through any entries behind it.
//! 4. A map already on the lattice with unique frames is returned unchanged.

use cutline_core::{Frame, PositionMap};

/// Distance between adjacent lattice points.
pub const LATTICE_STRIDE: Frame = 4;

/// Residue every lattice point carries modulo [`LATTICE_STRIDE`].
pub const LATTICE_OFFSET: Frame = 1;

/// Whether `frame` is a lattice point.
#[inline]
#[must_use]
pub const fn is_on_lattice(frame: Frame) -> bool {
    frame.rem_euclid(LATTICE_STRIDE) == LATTICE_OFFSET
}

/// Nearest lattice point to `frame`; exact midpoints round up.
#[inline]
#[must_use]
pub fn nearest_lattice_point(frame: Frame) -> Frame {
    let half = LATTICE_STRIDE / 2;
    frame
        .saturating_sub(LATTICE_OFFSET)
        .saturating_add(half)
        .div_euclid(LATTICE_STRIDE)
        .saturating_mul(LATTICE_STRIDE)
        .saturating_add(LATTICE_OFFSET)
}

/// Quantize every frame in `positions` onto the lattice.
///
/// The output keeps the input's insertion order.
#[must_use]
pub fn quantize(positions: &PositionMap) -> PositionMap {
    let mut ranked: Vec<(usize, Frame)> = positions
        .iter()
        .enumerate()
        .map(|(index, (_, frame))| (index, frame))
        .collect();
    // Stable: ties stay in insertion order.
    ranked.sort_by_key(|&(_, frame)| frame);

    let mut assigned = vec![0; ranked.len()];
    let mut previous: Option<Frame> = None;
    for (index, frame) in ranked {
        let mut snapped = nearest_lattice_point(frame);
        if let Some(prev) = previous
            && snapped <= prev
        {
            snapped = prev.saturating_add(LATTICE_STRIDE);
        }
        assigned[index] = snapped;
        previous = Some(snapped);
    }

    positions
        .ids()
        .zip(assigned)
        .map(|(id, frame)| (id.clone(), frame))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_membership() {
        for frame in [1, 5, 9, -3, -7, 401] {
            assert!(is_on_lattice(frame), "{frame} should be on lattice");
        }
        for frame in [0, 2, 3, 4, -1, -2, 400] {
            assert!(!is_on_lattice(frame), "{frame} should be off lattice");
        }
    }

    #[test]
    fn nearest_point_rounds_half_up() {
        let cases = [
            (0, 1),
            (1, 1),
            (2, 1),
            (3, 5),
            (4, 5),
            (6, 5),
            (7, 9),
            (-1, 1),
            (-2, -3),
            (-5, -3),
            (-6, -7),
        ];
        for (frame, expected) in cases {
            assert_eq!(nearest_lattice_point(frame), expected, "frame {frame}");
        }
    }

    #[test]
    fn already_quantized_is_noop() {
        let map = PositionMap::from([("x", 1), ("y", 5), ("z", 9)]);
        assert_eq!(quantize(&map), map);
    }

    #[test]
    fn collision_shifts_later_entry_up() {
        let map = PositionMap::from([("x", 2), ("y", 3)]);
        let out = quantize(&map);
        assert_eq!(out, PositionMap::from([("x", 1), ("y", 5)]));
    }

    #[test]
    fn collision_cascades() {
        // The first three all snap to 5.
        let map = PositionMap::from([("a", 4), ("b", 5), ("c", 6), ("d", 9)]);
        let out = quantize(&map);
        assert_eq!(
            out,
            PositionMap::from([("a", 5), ("b", 9), ("c", 13), ("d", 17)])
        );
    }

    #[test]
    fn duplicates_split_in_insertion_order() {
        let map = PositionMap::from([("second", 20), ("first", 20)]);
        let out = quantize(&map);
        assert_eq!(out.get("second"), Some(21));
        assert_eq!(out.get("first"), Some(25));
    }

    #[test]
    fn output_keeps_insertion_order() {
        let map = PositionMap::from([("c", 100), ("a", 0), ("b", 50)]);
        let out = quantize(&map);
        let ids: Vec<&str> = out.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn empty_map() {
        assert!(quantize(&PositionMap::new()).is_empty());
    }
}
