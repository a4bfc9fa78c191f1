//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::energy::EnergyBuffer;
use crate::fluid::FluidStorage;
use crate::grid::GridWorld;
use crate::id::*;
use crate::item::Inventory;
use crate::node::*;
use crate::pos::{BlockPos, Face};

// ===========================================================================
// Resource types
// ===========================================================================

pub fn iron() -> ResourceTypeId {
    ResourceTypeId(0)
}
pub fn gold() -> ResourceTypeId {
    ResourceTypeId(1)
}
pub fn coal() -> ResourceTypeId {
    ResourceTypeId(2)
}
pub fn water() -> ResourceTypeId {
    ResourceTypeId(10)
}
pub fn lava() -> ResourceTypeId {
    ResourceTypeId(11)
}

pub fn chest_type() -> BlockTypeId {
    BlockTypeId(1)
}
pub fn furnace_type() -> BlockTypeId {
    BlockTypeId(2)
}

// ===========================================================================
// Positions
// ===========================================================================

pub fn pos(x: i32, y: i32, z: i32) -> BlockPos {
    BlockPos::new(x, y, z)
}

/// Positions `start + i * face` for `i in 0..len`.
pub fn line(start: BlockPos, face: Face, len: i32) -> Vec<BlockPos> {
    (0..len).map(|i| start.offset_by(face, i)).collect()
}

// ===========================================================================
// Builders
// ===========================================================================

/// Places a run of conduits.
pub fn place_conduits(world: &mut GridWorld, at: &[BlockPos], kind: ResourceKind, color: Color) {
    for &p in at {
        world.place(p, NodeDescriptor::conduit(kind, color));
    }
}

/// Places a chest with `slots` slots of capacity `slot_capacity`.
pub fn place_chest(world: &mut GridWorld, at: BlockPos, slots: usize, slot_capacity: u32) -> EntityId {
    world.place(
        at,
        NodeDescriptor::sink(SinkKind::Container, KindSet::only(ResourceKind::Item))
            .with_block_type(chest_type()),
    );
    world.attach_inventory(at, Inventory::new(slots, slot_capacity))
}

/// Places a chest pre-filled with `inventory`.
pub fn place_filled_chest(world: &mut GridWorld, at: BlockPos, inventory: Inventory) -> EntityId {
    world.place(
        at,
        NodeDescriptor::sink(SinkKind::Container, KindSet::only(ResourceKind::Item))
            .with_block_type(chest_type()),
    );
    world.attach_inventory(at, inventory)
}

/// Places a fluid tank block with one tank.
pub fn place_tank(world: &mut GridWorld, at: BlockPos, capacity: u64) -> EntityId {
    world.place(
        at,
        NodeDescriptor::sink(SinkKind::Tank, KindSet::only(ResourceKind::Fluid)),
    );
    world.attach_tanks(at, FluidStorage::new(1, capacity))
}

/// Places an energy-consuming machine.
pub fn place_battery(world: &mut GridWorld, at: BlockPos, capacity: u64) -> EntityId {
    world.place(
        at,
        NodeDescriptor::sink(SinkKind::Machine, KindSet::only(ResourceKind::Energy)),
    );
    world.attach_energy(at, EnergyBuffer::new(capacity))
}

/// Places a generator holding `stored` energy.
pub fn place_generator(world: &mut GridWorld, at: BlockPos, stored: u64) -> EntityId {
    world.place(at, NodeDescriptor::generator());
    world.attach_energy(at, EnergyBuffer::charged(stored, stored.max(1)))
}
