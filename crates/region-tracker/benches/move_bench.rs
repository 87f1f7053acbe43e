// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for the region move algorithm.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use region_tracker::RegionView;

/// Builds a root view over `buf` with `fanout` children, each holding
/// `depth` nested subsections.
fn build_forest(buf: &[u8], fanout: usize, depth: usize) -> (RegionView, Vec<RegionView>) {
    let root = unsafe { RegionView::from_raw(buf.as_ptr(), buf.len()) };
    let stride = buf.len() / fanout;
    let mut descendants = Vec::new();

    for i in 0..fanout {
        let mut current = root.subsection(i * stride, stride).unwrap();
        for _ in 0..depth {
            let len = current.len();
            if len < 2 {
                break;
            }
            let next = current.subsection(0, len / 2).unwrap();
            descendants.push(current);
            current = next;
        }
        descendants.push(current);
    }

    (root, descendants)
}

fn bench_move_with_descendants(c: &mut Criterion) {
    let mut group = c.benchmark_group("move");

    for (fanout, depth) in [(4, 2), (16, 4), (64, 4)] {
        group.bench_function(format!("fanout_{fanout}_depth_{depth}"), |b| {
            b.iter_batched(
                || {
                    let src = vec![0u8; 4096].into_boxed_slice();
                    let dst = vec![0u8; 8192].into_boxed_slice();
                    let (root, descendants) = build_forest(&src, fanout, depth);
                    (src, dst, root, descendants)
                },
                |(src, dst, root, descendants)| {
                    unsafe { root.relocate(dst.as_ptr(), dst.len()) };
                    drop(descendants);
                    drop(root);
                    drop((src, dst));
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_declare_destroy(c: &mut Criterion) {
    let buf = vec![0u8; 4096].into_boxed_slice();

    c.bench_function("declare_destroy", |b| {
        b.iter(|| {
            let view = unsafe { RegionView::from_raw(buf.as_ptr(), buf.len()) };
            drop(view);
        });
    });
}

criterion_group!(benches, bench_move_with_descendants, bench_declare_destroy);
criterion_main!(benches);
