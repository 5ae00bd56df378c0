#[macro_use]
extern crate criterion;

use criterion::{black_box, BenchmarkId, Criterion};
use fluxzero::{FluidTree, NodeId};
use std::time::Duration;

/// A complete tree of the given branching factor and depth with some
/// statistics already folded in
fn full_tree(branching_factor: usize, depth: usize) -> FluidTree {
    let mut tree = FluidTree::new();
    let mut frontier = vec![NodeId::ROOT];

    for _ in 0..depth {
        let mut next = Vec::with_capacity(frontier.len() * branching_factor);
        for &parent in &frontier {
            for _ in 0..branching_factor {
                next.push(tree.create_child(parent).unwrap());
            }
        }
        frontier = next;
    }

    for (i, &leaf) in frontier.iter().enumerate() {
        tree.backprop(leaf, (i % 7) as f64 / 7.0, 0.1);
    }
    tree
}

fn bench_select_leaf(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_leaf");
    group.measurement_time(Duration::from_secs(5));

    for bf in [2, 4, 8].iter() {
        let tree = full_tree(*bf, 5);
        group.bench_with_input(BenchmarkId::new("branching_factor", bf), bf, |b, &_| {
            b.iter(|| black_box(tree.select_leaf(NodeId::ROOT, 1.414)))
        });
    }

    group.finish();
}

fn bench_search_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_cycle");

    for &iterations in &[100, 1000, 5000] {
        group.bench_with_input(
            BenchmarkId::new("iterations", iterations),
            &iterations,
            |b, &iterations| {
                b.iter(|| {
                    let mut tree = full_tree(3, 4);
                    for i in 0..iterations {
                        let leaf = tree.select_leaf(NodeId::ROOT, 1.414);
                        tree.backprop(leaf, (i % 2) as f64, 0.1);
                    }
                    black_box(tree.get_best_child(NodeId::ROOT))
                })
            },
        );
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let tree = full_tree(4, 6);
    let bytes = tree.to_bytes();

    group.bench_function("encode", |b| b.iter(|| black_box(tree.to_bytes())));
    group.bench_function("decode", |b| {
        b.iter(|| black_box(FluidTree::from_bytes(&bytes).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_select_leaf, bench_search_cycle, bench_codec);
criterion_main!(benches);
