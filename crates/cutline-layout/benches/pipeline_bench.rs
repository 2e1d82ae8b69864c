//! Benchmarks for the drag-release pipeline.
//!
//! Run with: cargo bench -p cutline-layout

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use cutline_layout::{
    CoordinateSystem, DEFAULT_FRAME_PADDING, EntryId, FluidParams, PositionMap, fluid_move,
    quantize, settle,
};
use std::hint::black_box;

/// `n` entries spaced 40 frames apart, starting at the anchor.
fn make_track(n: usize) -> PositionMap {
    (0..n)
        .map(|i| (EntryId::from(format!("shot-{i}")), i as i64 * 40))
        .collect()
}

fn bench_fluid_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout/fluid_move");
    let params = FluidParams::from_context(16);

    for n in [8, 64, 512] {
        let track = make_track(n);
        let bounds = CoordinateSystem::from_positions(&track, DEFAULT_FRAME_PADDING);
        group.bench_with_input(BenchmarkId::new("last_to_front", n), &track, |b, track| {
            let last = format!("shot-{}", n - 1);
            b.iter(|| black_box(fluid_move(track, &last, 10, params, bounds)));
        });
    }

    group.finish();
}

fn bench_quantize(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout/quantize");

    for n in [8, 64, 512] {
        let track = make_track(n);
        group.bench_with_input(BenchmarkId::new("quantize", n), &track, |b, track| {
            b.iter(|| black_box(quantize(track)));
        });
        group.bench_with_input(BenchmarkId::new("settle", n), &track, |b, track| {
            b.iter(|| black_box(settle(track)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fluid_move, bench_quantize);
criterion_main!(benches);
