//! Benchmarks for the tree layout engine.
//!
//! Run with: cargo bench -p branchmap-layout

use branchmap_core::{BranchSignal, Confidence, LayoutConfig, TurnObservation};
use branchmap_layout::layout;
use branchmap_tree::build_from_observations;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// A conversation of `turns` turns where every third turn has `fan` branches.
fn make_observations(turns: usize, fan: usize) -> Vec<TurnObservation> {
    (0..turns)
        .map(|i| {
            let signal = if i % 3 == 1 {
                BranchSignal::new(fan / 2, fan, Confidence::Exact)
            } else {
                BranchSignal::single()
            };
            TurnObservation::new(i, format!("turn {i}")).with_signal(signal)
        })
        .collect()
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout/tree");
    let config = LayoutConfig::default();

    for turns in [10, 50, 200] {
        let tree = build_from_observations("bench", &make_observations(turns, 4));
        group.bench_with_input(BenchmarkId::new("turns", turns), &tree, |b, tree| {
            b.iter(|| black_box(layout(tree, &config)))
        });
    }
    group.finish();
}

fn bench_path_data(c: &mut Criterion) {
    let tree = build_from_observations("bench", &make_observations(100, 5));
    let out = layout(&tree, &LayoutConfig::default());
    c.bench_function("layout/path_data", |b| {
        b.iter(|| {
            for connector in &out.connectors {
                black_box(connector.path_data());
            }
        })
    });
}

criterion_group!(benches, bench_layout, bench_path_data);
criterion_main!(benches);
