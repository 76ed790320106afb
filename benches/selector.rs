//! Benchmarks for coverage merging and greedy selection.
//!
//! Run with: cargo bench
//! Run specific benchmark: cargo bench -- select

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use testredundancy::core::{CancellationToken, TestId};
use testredundancy::coverage::{BlockKey, BlockSet, CoverageBlock, FunctionBounds, FunctionMap};
use testredundancy::selector::{
    select, select_targets, Candidate, CoverageAggregate, FunctionBlocks, SelectorOptions,
};

const FUNCTIONS_PER_FILE: u32 = 20;
const FILES: u32 = 25;

fn function_map() -> FunctionMap {
    let mut map = FunctionMap::new();
    for file in 0..FILES {
        let bounds = (0..FUNCTIONS_PER_FILE)
            .map(|f| FunctionBounds::new(format!("F{f}"), f * 10 + 1, f * 10 + 9))
            .collect();
        map.insert(format!("m/pkg/f{file}.go"), bounds);
    }
    map
}

/// Deterministic pseudo-random coverage: test `t` covers a block when a
/// cheap hash of (t, block) falls under the density.
fn block_set(test: u32, density: u32) -> BlockSet {
    let mut blocks = Vec::new();
    for file in 0..FILES {
        for f in 0..FUNCTIONS_PER_FILE {
            for b in 0..3 {
                let line = f * 10 + 2 + b * 2;
                let h = (test.wrapping_mul(2_654_435_761) ^ (file * 7919 + line * 31)) % 100;
                blocks.push(CoverageBlock::new(
                    BlockKey::new(format!("m/pkg/f{file}.go"), line, 2, line + 1, 10),
                    b + 1,
                    u64::from(h < density),
                ));
            }
        }
    }
    BlockSet::from_blocks(blocks)
}

fn candidates(count: u32) -> Vec<Candidate<FunctionBlocks>> {
    let map = function_map();
    (0..count)
        .map(|t| {
            let coverage = FunctionBlocks::from_block_set(&block_set(t, 15), &map);
            Candidate::new(TestId::new("m/pkg", format!("Test{t:04}")), t % 10 == 0, coverage)
        })
        .collect()
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for size in [10u32, 100] {
        let sets: Vec<BlockSet> = (0..size).map(|t| block_set(t, 30)).collect();
        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::new("tests", size), &sets, |b, sets| {
            b.iter(|| {
                let mut merged = BlockSet::new();
                for set in sets {
                    merged.merge(set);
                }
                black_box(merged.covered_statements())
            })
        });
    }
    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");
    group.sample_size(20);
    for size in [50u32, 200] {
        let candidates = candidates(size);
        let mut full = FunctionBlocks::empty();
        for candidate in &candidates {
            full.merge_from(&candidate.coverage);
        }
        let targets: BTreeSet<String> = select_targets(&full, 80.0);
        let options = SelectorOptions::default();

        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::new("tests", size), &candidates, |b, candidates| {
            b.iter(|| {
                let selection =
                    select(candidates, &targets, &options, &CancellationToken::new()).unwrap();
                black_box(selection.kept.len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_merge, bench_select);
criterion_main!(benches);
