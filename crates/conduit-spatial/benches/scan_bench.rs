//! Criterion benchmarks for network scans.

use criterion::{Criterion, criterion_group, criterion_main};
use conduit_core::grid::GridWorld;
use conduit_core::node::{Color, NodeDescriptor, ResourceKind};
use conduit_core::pos::Face;
use conduit_core::test_utils::*;
use conduit_spatial::{ScanJob, ScanProgress, rescan};

/// A `size` x `size` floor of conduits with a chest under every fourth
/// cell and an exporter in one corner.
fn make_floor(size: i32) -> GridWorld {
    let mut world = GridWorld::new();
    for x in 0..size {
        for z in 0..size {
            world.place(
                pos(x, 0, z),
                NodeDescriptor::conduit(ResourceKind::Item, Color::Default),
            );
            if (x + z) % 4 == 0 {
                place_chest(&mut world, pos(x, -1, z), 27, 64);
            }
        }
    }
    world.place(
        pos(0, 0, 0),
        NodeDescriptor::exporter(ResourceKind::Item, Color::Default, Face::Down),
    );
    world
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    group.sample_size(20);

    // Benchmark: one-shot rescan over 1024 conduits.
    let world = make_floor(32);
    group.bench_function("rescan_32x32_floor", |b| {
        b.iter(|| rescan(pos(16, 0, 16), ResourceKind::Item, &world));
    });

    // Benchmark: the same scan in quanta of 25 visited positions.
    group.bench_function("stepped_32x32_floor", |b| {
        b.iter(|| {
            let mut job = ScanJob::new(pos(16, 0, 16), ResourceKind::Item, &world);
            while let ScanProgress::Pending = job.step(&world, 25) {}
        });
    });

    group.finish();
}

criterion_group!(benches, bench_scan);
criterion_main!(benches);
