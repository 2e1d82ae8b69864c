#![no_main]

use arbitrary::Arbitrary;
use cutline_layout::{
    CoordinateSystem, EntryId, FluidParams, PositionMap, fluid_move, is_on_lattice,
    resolve_conflicts, settle,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    frames: Vec<i16>,
    mover: u8,
    target: i16,
    context: u8,
    padding: u8,
}

fuzz_target!(|input: Input| {
    if input.frames.is_empty() || input.frames.len() > 64 {
        return;
    }
    let raw: PositionMap = input
        .frames
        .iter()
        .enumerate()
        .map(|(i, &frame)| (EntryId::from(format!("e{i}")), i64::from(frame)))
        .collect();
    let map = resolve_conflicts(&raw).positions;
    assert!(!map.has_duplicate_frames(), "resolver left duplicates");

    let id = format!("e{}", usize::from(input.mover) % map.len());
    let target = i64::from(input.target).max(0);
    let params = FluidParams::from_context(u32::from(input.context));
    let bounds = CoordinateSystem::from_positions(&map, i64::from(input.padding));

    let moved = fluid_move(&map, &id, target, params, bounds).expect("mover exists");
    assert_eq!(moved.positions.len(), map.len(), "fluid changed membership");
    assert!(!moved.positions.has_duplicate_frames(), "fluid produced duplicates");
    assert!(moved.bounds.range >= bounds.range, "bounds shrank");

    let again = fluid_move(&moved.positions, &id, target, params, moved.bounds)
        .expect("mover exists");
    assert_eq!(again.positions, moved.positions, "fluid not idempotent");

    let settled = settle(&moved.positions);
    assert!(!settled.positions.has_duplicate_frames(), "settle produced duplicates");
    assert!(
        settled.positions.iter().all(|(_, frame)| is_on_lattice(frame)),
        "settle left a frame off the lattice"
    );
});
