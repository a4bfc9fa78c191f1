//! Bounded movement of items, fluid and energy.
//!
//! The engine never holds two host borrows at once: it reads what the
//! source offers, sizes the move against the target, extracts, inserts,
//! and hands back anything the target refused. Host errors read as "no
//! capacity" and never leave this module.

use conduit_core::filter::FilterConfig;
use conduit_core::fluid::FluidBlock;
use conduit_core::id::ResourceTypeId;
use conduit_core::item::ItemStack;
use conduit_core::node::{NodeDescriptor, NodeRole, SinkKind};
use conduit_core::pos::BlockPos;
use conduit_core::store::{KvStore, SnapshotStore};
use conduit_core::world::{HostError, World};
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// TransferBudget
// ---------------------------------------------------------------------------

/// Units one source may move in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferBudget {
    limit: u64,
    used: u64,
}

impl TransferBudget {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Charges up to `amount`. Returns what was actually charged.
    pub fn consume(&mut self, amount: u64) -> u64 {
        let charged = amount.min(self.remaining());
        self.used += charged;
        charged
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }
}

/// Logs a failed host call and reads it as "nothing there".
fn host<T>(result: Result<Option<T>, HostError>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(err) => {
            trace!(%err, "host call failed");
            None
        }
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Where items for one target actually go.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ItemSink {
    container: BlockPos,
    /// Routed slots; `None` inserts anywhere.
    slots: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Copy)]
enum FluidOrigin {
    Tank(usize),
    Block(FluidBlock),
}

// ---------------------------------------------------------------------------
// TransferEngine
// ---------------------------------------------------------------------------

pub struct TransferEngine<'a> {
    world: &'a mut dyn World,
    store: &'a dyn KvStore,
}

impl<'a> TransferEngine<'a> {
    pub fn new(world: &'a mut dyn World, store: &'a dyn KvStore) -> Self {
        Self { world, store }
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Moves items out of the container at `source` into `targets`, tried in
    /// order. Stacks rejected by `filter` stay put. Returns the total moved.
    pub fn items(
        &mut self,
        source: BlockPos,
        targets: &[BlockPos],
        filter: Option<&FilterConfig>,
        budget: &mut TransferBudget,
    ) -> u32 {
        let mut moved = 0u32;
        'units: for (slot, stack) in self.source_stacks(source) {
            if filter.is_some_and(|f| !f.permits(stack.item_type)) {
                continue;
            }
            let mut remaining = stack.quantity;
            for &target in targets {
                if budget.is_exhausted() {
                    break 'units;
                }
                if remaining == 0 {
                    break;
                }
                let Some(sink) = self.item_sink(target, stack.item_type) else {
                    continue;
                };
                if sink.container == source {
                    continue;
                }
                let room = self.item_room(&sink, stack.item_type);
                let amount = remaining.min(room).min(clamp_u32(budget.remaining()));
                if amount == 0 {
                    continue;
                }

                let taken = self.extract_items(source, slot, amount);
                if taken == 0 {
                    continue 'units;
                }
                let inserted = self.insert_items(&sink, stack.item_type, taken);
                if inserted < taken {
                    self.return_items(source, slot, stack.item_type, taken - inserted);
                }
                budget.consume(u64::from(inserted));
                remaining -= inserted;
                moved += inserted;
                trace!(from = %source, to = %sink.container, amount = inserted, "moved items");
            }
        }
        moved
    }

    fn source_stacks(&mut self, source: BlockPos) -> Vec<(usize, ItemStack)> {
        let Some(access) = host(self.world.items_at(source)) else {
            return Vec::new();
        };
        access
            .output_range
            .clone()
            .filter_map(|slot| access.container.stack(slot).map(|s| (slot, s)))
            .filter(|(_, s)| s.quantity > 0)
            .collect()
    }

    /// Resolves importers to the container in front of them and applies
    /// every filter standing between the network and that container.
    fn item_sink(&mut self, target: BlockPos, item: ResourceTypeId) -> Option<ItemSink> {
        let node = host(self.world.block_at(target))?;
        if node.role != NodeRole::Filtered {
            return self
                .target_permits(target, &node, item)
                .then_some(ItemSink {
                    container: target,
                    slots: None,
                });
        }

        let front = node.front(target)?;
        match self.store.load_filter(target) {
            Ok(Some(filter)) if !filter.permits_lenient(item) => return None,
            Ok(_) => {}
            Err(err) => {
                warn!(%target, %err, "ignoring importer with unreadable filter");
                return None;
            }
        }
        match self.store.load_routing(target) {
            Ok(None) => Some(ItemSink {
                container: front,
                slots: None,
            }),
            Ok(Some(routing)) => {
                let front_type = host(self.world.block_at(front))?.block_type;
                if !routing.applies_to(front_type) {
                    return None;
                }
                let slots = routing.slots_for(item)?.to_vec();
                Some(ItemSink {
                    container: front,
                    slots: Some(slots),
                })
            }
            Err(err) => {
                warn!(%target, %err, "ignoring importer with unreadable routing");
                None
            }
        }
    }

    /// Machines with a filter upgrade only accept what their own filter
    /// permits.
    fn target_permits(&self, target: BlockPos, node: &NodeDescriptor, ty: ResourceTypeId) -> bool {
        if !node.filter_upgrade || node.role != NodeRole::Sink(SinkKind::Machine) {
            return true;
        }
        match self.store.load_filter(target) {
            Ok(Some(filter)) => filter.permits(ty),
            Ok(None) => true,
            Err(err) => {
                warn!(%target, %err, "ignoring machine with unreadable filter");
                false
            }
        }
    }

    fn item_room(&mut self, sink: &ItemSink, item: ResourceTypeId) -> u32 {
        let Some(access) = host(self.world.items_at(sink.container)) else {
            return 0;
        };
        match &sink.slots {
            Some(slots) => slots
                .iter()
                .map(|&slot| access.container.free_in_slot(slot, item))
                .fold(0u32, u32::saturating_add),
            None => access.container.free_capacity(item),
        }
    }

    fn extract_items(&mut self, source: BlockPos, slot: usize, amount: u32) -> u32 {
        match host(self.world.items_at(source)) {
            Some(mut access) => access.container.extract(slot, amount),
            None => 0,
        }
    }

    fn insert_items(&mut self, sink: &ItemSink, item: ResourceTypeId, amount: u32) -> u32 {
        let Some(mut access) = host(self.world.items_at(sink.container)) else {
            return 0;
        };
        match &sink.slots {
            Some(slots) => {
                let mut inserted = 0;
                for &slot in slots {
                    if inserted == amount {
                        break;
                    }
                    inserted += access.container.insert_into(slot, item, amount - inserted);
                }
                inserted
            }
            None => access.container.insert(item, amount),
        }
    }

    /// Puts refused items back where they came from.
    fn return_items(&mut self, source: BlockPos, slot: usize, item: ResourceTypeId, amount: u32) {
        let Some(mut access) = host(self.world.items_at(source)) else {
            warn!(%source, amount, "source vanished while returning items");
            return;
        };
        let mut returned = access.container.insert_into(slot, item, amount);
        if returned < amount {
            returned += access.container.insert(item, amount - returned);
        }
        if returned < amount {
            warn!(%source, lost = amount - returned, "could not return items to source");
        }
    }

    // -----------------------------------------------------------------------
    // Fluids
    // -----------------------------------------------------------------------

    /// Moves fluid from the tanks or fluid block at `source` into `targets`.
    /// A finite fluid block is consumed entirely once anything moved.
    pub fn fluids(
        &mut self,
        source: BlockPos,
        targets: &[BlockPos],
        filter: Option<&FilterConfig>,
        budget: &mut TransferBudget,
    ) -> u64 {
        let Some((origin, fluid, available)) = self.fluid_source(source, filter) else {
            return 0;
        };
        let mut remaining = available;
        let mut moved = 0u64;
        for &target in targets {
            if budget.is_exhausted() || remaining == 0 {
                break;
            }
            if target == source {
                continue;
            }
            let Some(node) = host(self.world.block_at(target)) else {
                continue;
            };
            if !self.target_permits(target, &node, fluid) {
                continue;
            }
            let Some((tank, room)) = self.tank_room(target, fluid) else {
                continue;
            };
            let amount = remaining.min(room).min(budget.remaining());
            if amount == 0 {
                continue;
            }

            let taken = match origin {
                FluidOrigin::Tank(index) => self.drain_tank(source, index, amount),
                FluidOrigin::Block(_) => amount,
            };
            if taken == 0 {
                break;
            }
            let filled = self.fill_tank(target, tank, fluid, taken);
            if filled < taken {
                if let FluidOrigin::Tank(index) = origin {
                    self.fill_tank(source, index, fluid, taken - filled);
                }
            }
            budget.consume(filled);
            remaining -= filled;
            moved += filled;
            trace!(from = %source, to = %target, amount = filled, "moved fluid");
        }

        if let FluidOrigin::Block(block) = origin {
            if moved > 0 && !block.is_infinite() {
                if let Err(err) = self.world.drain_fluid_block(source) {
                    trace!(%source, %err, "could not consume fluid block");
                }
            }
        }
        moved
    }

    /// The first non-empty tank passing `filter`, or the fluid block there.
    /// Fluid blocks are not filtered.
    fn fluid_source(
        &mut self,
        source: BlockPos,
        filter: Option<&FilterConfig>,
    ) -> Option<(FluidOrigin, ResourceTypeId, u64)> {
        match self.world.fluids_at(source) {
            Ok(Some(container)) => {
                return (0..container.tank_count()).find_map(|index| {
                    let tank = container.tank(index)?;
                    let fluid = tank.fluid?;
                    (tank.amount > 0 && filter.is_none_or(|f| f.permits(fluid)))
                        .then_some((FluidOrigin::Tank(index), fluid, tank.amount))
                });
            }
            Ok(None) => {}
            Err(err) => {
                trace!(%source, %err, "host call failed");
                return None;
            }
        }
        let block = host(self.world.fluid_block_at(source))?;
        let available = block.available();
        (available > 0).then_some((FluidOrigin::Block(block), block.fluid(), available))
    }

    fn tank_room(&mut self, target: BlockPos, fluid: ResourceTypeId) -> Option<(usize, u64)> {
        let container = host(self.world.fluids_at(target))?;
        let index = container.tank_for(fluid)?;
        container.tank(index).map(|tank| (index, tank.free()))
    }

    fn drain_tank(&mut self, pos: BlockPos, index: usize, amount: u64) -> u64 {
        host(self.world.fluids_at(pos))
            .and_then(|c| c.tank_mut(index))
            .map_or(0, |tank| tank.drain(amount))
    }

    fn fill_tank(&mut self, pos: BlockPos, index: usize, fluid: ResourceTypeId, amount: u64) -> u64 {
        host(self.world.fluids_at(pos))
            .and_then(|c| c.tank_mut(index))
            .map_or(0, |tank| tank.fill(fluid, amount))
    }

    // -----------------------------------------------------------------------
    // Energy
    // -----------------------------------------------------------------------

    /// Pushes stored energy from `source` into `targets`.
    pub fn energy(&mut self, source: BlockPos, targets: &[BlockPos], budget: &mut TransferBudget) -> u64 {
        let mut moved = 0u64;
        for &target in targets {
            if budget.is_exhausted() {
                break;
            }
            if target == source {
                continue;
            }
            let available = host(self.world.energy_at(source)).map_or(0, |e| e.stored());
            if available == 0 {
                break;
            }
            let room = host(self.world.energy_at(target)).map_or(0, |e| e.free());
            let amount = available.min(room).min(budget.remaining());
            if amount == 0 {
                continue;
            }

            let taken = host(self.world.energy_at(source)).map_or(0, |e| e.extract(amount));
            let inserted = host(self.world.energy_at(target)).map_or(0, |e| e.insert(taken));
            if inserted < taken {
                let returned = host(self.world.energy_at(source)).map_or(0, |e| e.insert(taken - inserted));
                if returned < taken - inserted {
                    warn!(%source, lost = taken - inserted - returned, "could not return energy to source");
                }
            }
            budget.consume(inserted);
            moved += inserted;
            trace!(from = %source, to = %target, amount = inserted, "moved energy");
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::filter::SlotRouting;
    use conduit_core::fluid::{FluidStorage, FluidTank};
    use conduit_core::grid::GridWorld;
    use conduit_core::item::Inventory;
    use conduit_core::node::{Color, KindSet, ResourceKind};
    use conduit_core::pos::Face;
    use conduit_core::store::MemoryStore;
    use conduit_core::test_utils::*;

    fn source_chest(world: &mut GridWorld, at: BlockPos, inventory: Inventory) {
        place_filled_chest(world, at, inventory);
    }

    // Test 1: items spill over into the next target and stop when full.
    #[test]
    fn items_fill_targets_in_order() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        source_chest(&mut world, pos(0, 0, 0), Inventory::new(1, 64).with_stack(0, iron(), 10));
        place_chest(&mut world, pos(5, 0, 0), 1, 5);
        place_chest(&mut world, pos(6, 0, 0), 1, 3);

        let mut budget = TransferBudget::new(64);
        let moved = TransferEngine::new(&mut world, &store).items(
            pos(0, 0, 0),
            &[pos(5, 0, 0), pos(6, 0, 0)],
            None,
            &mut budget,
        );
        assert_eq!(moved, 8);
        assert_eq!(budget.used(), 8);
        assert_eq!(world.inventory(pos(0, 0, 0)).unwrap().count(iron()), 2);
        assert_eq!(world.inventory(pos(5, 0, 0)).unwrap().count(iron()), 5);
        assert_eq!(world.inventory(pos(6, 0, 0)).unwrap().count(iron()), 3);
    }

    // Test 2: the budget caps the move.
    #[test]
    fn items_respect_budget() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        source_chest(&mut world, pos(0, 0, 0), Inventory::new(2, 64).with_stack(0, iron(), 40).with_stack(1, gold(), 40));
        place_chest(&mut world, pos(3, 0, 0), 4, 64);

        let mut budget = TransferBudget::new(50);
        let moved =
            TransferEngine::new(&mut world, &store).items(pos(0, 0, 0), &[pos(3, 0, 0)], None, &mut budget);
        assert_eq!(moved, 50);
        assert!(budget.is_exhausted());
        assert_eq!(world.inventory(pos(0, 0, 0)).unwrap().total(), 30);
    }

    // Test 3: filtered-out stacks are skipped without charging the budget.
    #[test]
    fn source_filter_skips_stacks() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        source_chest(&mut world, pos(0, 0, 0), Inventory::new(2, 64).with_stack(0, coal(), 5).with_stack(1, iron(), 5));
        place_chest(&mut world, pos(3, 0, 0), 4, 64);

        let filter = FilterConfig::whitelist([iron()]);
        let mut budget = TransferBudget::new(64);
        let moved = TransferEngine::new(&mut world, &store).items(
            pos(0, 0, 0),
            &[pos(3, 0, 0)],
            Some(&filter),
            &mut budget,
        );
        assert_eq!(moved, 5);
        assert_eq!(world.inventory(pos(3, 0, 0)).unwrap().count(coal()), 0);
    }

    // Test 4: only the output range is pulled from.
    #[test]
    fn output_range_limits_source_slots() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        world.place(
            pos(0, 0, 0),
            NodeDescriptor::sink(SinkKind::Machine, KindSet::only(ResourceKind::Item)),
        );
        world.attach_inventory_with_output(
            pos(0, 0, 0),
            Inventory::new(3, 64).with_stack(0, coal(), 8).with_stack(2, iron(), 4),
            2..3,
        );
        place_chest(&mut world, pos(2, 0, 0), 4, 64);

        let mut budget = TransferBudget::new(64);
        let moved =
            TransferEngine::new(&mut world, &store).items(pos(0, 0, 0), &[pos(2, 0, 0)], None, &mut budget);
        assert_eq!(moved, 4);
        assert_eq!(world.inventory(pos(0, 0, 0)).unwrap().count(coal()), 8);
    }

    // Test 5: an importer redirects to the container in front and applies its filter.
    #[test]
    fn importer_redirects_and_filters() {
        let mut world = GridWorld::new();
        let mut store = MemoryStore::new();
        source_chest(&mut world, pos(0, 0, 0), Inventory::new(2, 64).with_stack(0, coal(), 5).with_stack(1, iron(), 5));
        world.place(pos(4, 0, 0), NodeDescriptor::importer(Color::Default, Face::East));
        place_chest(&mut world, pos(5, 0, 0), 4, 64);
        store.save_filter(pos(4, 0, 0), &FilterConfig::blacklist([coal()])).unwrap();

        let mut budget = TransferBudget::new(64);
        let moved =
            TransferEngine::new(&mut world, &store).items(pos(0, 0, 0), &[pos(4, 0, 0)], None, &mut budget);
        assert_eq!(moved, 5);
        let chest = world.inventory(pos(5, 0, 0)).unwrap();
        assert_eq!(chest.count(iron()), 5);
        assert_eq!(chest.count(coal()), 0);
    }

    // Test 6: slot routing sends each item type to its slots only.
    #[test]
    fn routing_targets_listed_slots() {
        let mut world = GridWorld::new();
        let mut store = MemoryStore::new();
        source_chest(&mut world, pos(0, 0, 0), Inventory::new(3, 64).with_stack(0, coal(), 5).with_stack(1, iron(), 5).with_stack(2, gold(), 5));
        world.place(pos(4, 0, 0), NodeDescriptor::importer(Color::Default, Face::East));
        place_chest(&mut world, pos(5, 0, 0), 3, 64);
        let routing = SlotRouting::new(chest_type()).route(coal(), [1]).route(iron(), [2]);
        store.save_routing(pos(4, 0, 0), &routing).unwrap();

        let mut budget = TransferBudget::new(64);
        let moved =
            TransferEngine::new(&mut world, &store).items(pos(0, 0, 0), &[pos(4, 0, 0)], None, &mut budget);
        assert_eq!(moved, 10);
        let chest = world.inventory(pos(5, 0, 0)).unwrap();
        assert_eq!(chest.slots[1].stack.map(|s| s.item_type), Some(coal()));
        assert_eq!(chest.slots[2].stack.map(|s| s.item_type), Some(iron()));
        assert_eq!(chest.count(gold()), 0);
    }

    // Test 7: routing for another block type blocks the target.
    #[test]
    fn routing_requires_matching_block_type() {
        let mut world = GridWorld::new();
        let mut store = MemoryStore::new();
        source_chest(&mut world, pos(0, 0, 0), Inventory::new(1, 64).with_stack(0, coal(), 5));
        world.place(pos(4, 0, 0), NodeDescriptor::importer(Color::Default, Face::East));
        place_chest(&mut world, pos(5, 0, 0), 3, 64);
        let routing = SlotRouting::new(furnace_type()).route(coal(), [1]);
        store.save_routing(pos(4, 0, 0), &routing).unwrap();

        let mut budget = TransferBudget::new(64);
        let moved =
            TransferEngine::new(&mut world, &store).items(pos(0, 0, 0), &[pos(4, 0, 0)], None, &mut budget);
        assert_eq!(moved, 0);
        assert_eq!(budget.used(), 0);
    }

    // Test 8: a machine with a filter upgrade uses its own filter.
    #[test]
    fn upgraded_machine_filters() {
        let mut world = GridWorld::new();
        let mut store = MemoryStore::new();
        source_chest(&mut world, pos(0, 0, 0), Inventory::new(2, 64).with_stack(0, coal(), 5).with_stack(1, iron(), 5));
        world.place(
            pos(3, 0, 0),
            NodeDescriptor::sink(SinkKind::Machine, KindSet::only(ResourceKind::Item)).with_filter_upgrade(),
        );
        world.attach_inventory(pos(3, 0, 0), Inventory::new(2, 64));
        store.save_filter(pos(3, 0, 0), &FilterConfig::whitelist([coal()])).unwrap();

        let mut budget = TransferBudget::new(64);
        let moved =
            TransferEngine::new(&mut world, &store).items(pos(0, 0, 0), &[pos(3, 0, 0)], None, &mut budget);
        assert_eq!(moved, 5);
        assert_eq!(world.inventory(pos(3, 0, 0)).unwrap().count(coal()), 5);
    }

    // Test 9: host failures read as no capacity.
    #[test]
    fn faulty_target_is_skipped() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        source_chest(&mut world, pos(0, 0, 0), Inventory::new(1, 64).with_stack(0, iron(), 6));
        place_chest(&mut world, pos(3, 0, 0), 1, 64);
        place_chest(&mut world, pos(4, 0, 0), 1, 64);
        world.set_faulty(pos(3, 0, 0), true);

        let mut budget = TransferBudget::new(64);
        let moved = TransferEngine::new(&mut world, &store).items(
            pos(0, 0, 0),
            &[pos(3, 0, 0), pos(4, 0, 0)],
            None,
            &mut budget,
        );
        assert_eq!(moved, 6);
        assert_eq!(world.inventory(pos(4, 0, 0)).unwrap().count(iron()), 6);
    }

    // Test 10: tank to tank, matching or empty tanks only.
    #[test]
    fn fluids_between_tanks() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        place_tank(&mut world, pos(0, 0, 0), 8000);
        world.attach_tanks(
            pos(0, 0, 0),
            FluidStorage::default().with_tank(FluidTank::filled(water(), 3000, 8000)),
        );
        place_tank(&mut world, pos(2, 0, 0), 4000);
        world.attach_tanks(
            pos(2, 0, 0),
            FluidStorage::default().with_tank(FluidTank::filled(lava(), 100, 4000)),
        );
        place_tank(&mut world, pos(3, 0, 0), 4000);

        let mut budget = TransferBudget::new(2000);
        let moved = TransferEngine::new(&mut world, &store).fluids(
            pos(0, 0, 0),
            &[pos(2, 0, 0), pos(3, 0, 0)],
            None,
            &mut budget,
        );
        assert_eq!(moved, 2000);
        assert_eq!(world.tanks(pos(0, 0, 0)).unwrap().amount_of(water()), 1000);
        assert_eq!(world.tanks(pos(2, 0, 0)).unwrap().amount_of(water()), 0);
        assert_eq!(world.tanks(pos(3, 0, 0)).unwrap().amount_of(water()), 2000);
    }

    // Test 11: a vanilla source block is consumed after a partial pull.
    #[test]
    fn liquid_block_is_consumed() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        world.set_fluid_block(pos(0, 0, 0), FluidBlock::Liquid { fluid: water(), depth: 0 });
        place_tank(&mut world, pos(2, 0, 0), 600);

        let mut budget = TransferBudget::new(4000);
        let moved =
            TransferEngine::new(&mut world, &store).fluids(pos(0, 0, 0), &[pos(2, 0, 0)], None, &mut budget);
        assert_eq!(moved, 600);
        assert_eq!(world.fluid_block(pos(0, 0, 0)), None);
    }

    // Test 12: crucibles yield 250 per level and drop to zero; sinks never run dry.
    #[test]
    fn crucible_and_sink_blocks() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        world.set_fluid_block(pos(0, 0, 0), FluidBlock::Crucible { fluid: lava(), level: 3 });
        world.set_fluid_block(pos(0, 5, 0), FluidBlock::Sink { fluid: water() });
        place_tank(&mut world, pos(2, 0, 0), 10_000);
        place_tank(&mut world, pos(2, 5, 0), 10_000);

        let mut budget = TransferBudget::new(4000);
        let mut engine = TransferEngine::new(&mut world, &store);
        assert_eq!(engine.fluids(pos(0, 0, 0), &[pos(2, 0, 0)], None, &mut budget), 750);
        budget.reset();
        assert_eq!(engine.fluids(pos(0, 5, 0), &[pos(2, 5, 0)], None, &mut budget), 4000);

        assert_eq!(
            world.fluid_block(pos(0, 0, 0)),
            Some(FluidBlock::Crucible { fluid: lava(), level: 0 })
        );
        assert_eq!(world.fluid_block(pos(0, 5, 0)), Some(FluidBlock::Sink { fluid: water() }));
    }

    // Test 13: the filter picks among tanks; fluid blocks pass regardless.
    #[test]
    fn fluid_filter_applies_to_tanks_only() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        place_tank(&mut world, pos(0, 0, 0), 8000);
        world.attach_tanks(
            pos(0, 0, 0),
            FluidStorage::default()
                .with_tank(FluidTank::filled(lava(), 500, 8000))
                .with_tank(FluidTank::filled(water(), 500, 8000)),
        );
        world.set_fluid_block(pos(0, 5, 0), FluidBlock::Liquid { fluid: lava(), depth: 0 });
        world.set_fluid_block(pos(0, 9, 0), FluidBlock::Sink { fluid: water() });
        place_tank(&mut world, pos(2, 0, 0), 4000);
        place_tank(&mut world, pos(2, 5, 0), 4000);
        place_tank(&mut world, pos(2, 9, 0), 4000);

        let whitelist = FilterConfig::whitelist([water()]);
        let blacklist = FilterConfig::blacklist([water()]);
        let mut budget = TransferBudget::new(4000);
        let mut engine = TransferEngine::new(&mut world, &store);
        assert_eq!(engine.fluids(pos(0, 0, 0), &[pos(2, 0, 0)], Some(&whitelist), &mut budget), 500);
        budget.reset();
        assert_eq!(engine.fluids(pos(0, 5, 0), &[pos(2, 5, 0)], Some(&whitelist), &mut budget), 1000);
        budget.reset();
        assert_eq!(engine.fluids(pos(0, 9, 0), &[pos(2, 9, 0)], Some(&blacklist), &mut budget), 4000);

        let tanks = world.tanks(pos(0, 0, 0)).unwrap();
        assert_eq!(tanks.amount_of(lava()), 500);
        assert_eq!(tanks.amount_of(water()), 0);
        assert_eq!(world.tanks(pos(2, 5, 0)).unwrap().amount_of(lava()), 1000);
        assert_eq!(world.fluid_block(pos(0, 5, 0)), None);
    }

    // Test 14: energy flows until the generator is empty.
    #[test]
    fn energy_drains_generator() {
        let mut world = GridWorld::new();
        let store = MemoryStore::new();
        place_generator(&mut world, pos(0, 0, 0), 500);
        place_battery(&mut world, pos(1, 0, 0), 300);
        place_battery(&mut world, pos(-1, 0, 0), 300);

        let mut budget = TransferBudget::new(1000);
        let moved = TransferEngine::new(&mut world, &store).energy(
            pos(0, 0, 0),
            &[pos(1, 0, 0), pos(-1, 0, 0)],
            &mut budget,
        );
        assert_eq!(moved, 500);
        assert_eq!(world.energy(pos(0, 0, 0)).unwrap().stored, 0);
        assert_eq!(world.energy(pos(1, 0, 0)).unwrap().stored, 300);
        assert_eq!(world.energy(pos(-1, 0, 0)).unwrap().stored, 200);
    }

    #[test]
    fn budget_accounting() {
        let mut budget = TransferBudget::new(10);
        assert_eq!(budget.consume(4), 4);
        assert_eq!(budget.consume(9), 6);
        assert!(budget.is_exhausted());
        budget.reset();
        assert_eq!(budget.remaining(), 10);
        assert_eq!(budget.limit(), 10);
    }
}
