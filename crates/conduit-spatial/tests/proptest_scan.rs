//! Property-based tests for network scans and pipe geometry.

use conduit_core::grid::GridWorld;
use conduit_core::item::Inventory;
use conduit_core::node::{Color, NodeDescriptor, ResourceKind};
use conduit_core::pos::Face;
use conduit_core::test_utils::*;
use conduit_spatial::{ScanJob, ScanProgress, refresh, rescan};
use proptest::prelude::*;

const SIDE: i32 = 6;

/// Exporter at the origin pulling from a chest at x=-1, and a `SIDE` x `SIDE`
/// patch east of it where each cell is empty (0), a conduit (1) or a chest (2).
fn build(cells: &[u8]) -> GridWorld {
    let mut world = GridWorld::new();
    place_filled_chest(&mut world, pos(-1, 0, 0), Inventory::new(1, 64).with_stack(0, iron(), 1));
    world.place(
        pos(0, 0, 0),
        NodeDescriptor::exporter(ResourceKind::Item, Color::Default, Face::West),
    );
    for (i, cell) in cells.iter().enumerate() {
        let at = pos(1 + i as i32 % SIDE, 0, i as i32 / SIDE);
        match cell {
            1 => place_conduits(&mut world, &[at], ResourceKind::Item, Color::Default),
            2 => {
                place_chest(&mut world, at, 1, 64);
            }
            _ => {}
        }
    }
    world
}

fn arb_cells() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..3, (SIDE * SIDE) as usize)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Snapshots list each target once and never the exporter or what it pulls from.
    #[test]
    fn snapshot_targets_are_unique_and_exclude_source(cells in arb_cells()) {
        let world = build(&cells);
        let report = rescan(pos(0, 0, 0), ResourceKind::Item, &world);
        let snapshot = &report.snapshots[&pos(0, 0, 0)];

        let mut sorted = snapshot.targets.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), snapshot.targets.len());
        prop_assert!(!snapshot.contains(pos(0, 0, 0)));
        prop_assert!(!snapshot.contains(pos(-1, 0, 0)));
    }

    // Splitting a scan into small quanta finds the same network.
    #[test]
    fn quantum_does_not_change_result(cells in arb_cells(), quantum in 1usize..8) {
        let world = build(&cells);
        let whole = rescan(pos(0, 0, 0), ResourceKind::Item, &world);

        let mut job = ScanJob::new(pos(0, 0, 0), ResourceKind::Item, &world);
        let stepped = loop {
            if let ScanProgress::Complete(report) = job.step(&world, quantum) {
                break report;
            }
        };
        prop_assert_eq!(stepped.targets, whole.targets);
        prop_assert_eq!(stepped.snapshots, whole.snapshots);
    }

    // Refreshing a conduit twice yields the same faces.
    #[test]
    fn refresh_is_idempotent(cells in arb_cells(), index in 0usize..36) {
        let mut world = build(&cells);
        let at = pos(1 + index as i32 % SIDE, 0, index as i32 / SIDE);
        let first = refresh(&mut world, at, ResourceKind::Item);
        let second = refresh(&mut world, at, ResourceKind::Item);
        prop_assert_eq!(first, second);
    }
}
