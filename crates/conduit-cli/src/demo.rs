//! A small hand-built world exercising all three resource kinds.

use conduit_core::config::NetworkConfig;
use conduit_core::energy::EnergyBuffer;
use conduit_core::event::{EventQueue, ListenerPriority, TopologyEvent, WorldEvent};
use conduit_core::fluid::{FluidBlock, FluidStorage};
use conduit_core::grid::GridWorld;
use conduit_core::id::{BlockTypeId, ResourceTypeId};
use conduit_core::item::Inventory;
use conduit_core::node::{Color, KindSet, NodeDescriptor, ResourceKind, SinkKind};
use conduit_core::pos::{BlockPos, Face};
use conduit_core::registry::Registry;
use conduit_core::script::{ScriptEventBus, channels};
use conduit_core::store::MemoryStore;
use conduit_transfer::{DistributionPolicy, TickSummary, TransferSystem};
use tracing::info;

const CHEST: BlockTypeId = BlockTypeId(1);

/// Resource names used by the demo.
pub struct Resources {
    pub names: Registry<()>,
    pub iron: ResourceTypeId,
    pub gold: ResourceTypeId,
    pub coal: ResourceTypeId,
    pub water: ResourceTypeId,
}

impl Resources {
    fn new() -> Self {
        let mut names = Registry::new();
        let iron = names.intern("minecraft:iron_ingot");
        let gold = names.intern("minecraft:gold_ingot");
        let coal = names.intern("minecraft:coal");
        let water = names.intern("water");
        Self {
            names,
            iron,
            gold,
            coal,
            water,
        }
    }
}

fn p(x: i32, y: i32, z: i32) -> BlockPos {
    BlockPos::new(x, y, z)
}

fn chest() -> NodeDescriptor {
    NodeDescriptor::sink(SinkKind::Container, KindSet::only(ResourceKind::Item)).with_block_type(CHEST)
}

/// Places every block and returns the topology events the host would send.
fn build(world: &mut GridWorld, res: &Resources) -> Vec<TopologyEvent> {
    let mut placed = Vec::new();
    let mut place = |world: &mut GridWorld, pos: BlockPos, node: NodeDescriptor| {
        world.place(pos, node);
        placed.push(TopologyEvent::Placed { pos });
    };

    // Items: a stocked chest drained round-robin into two chests.
    place(world, p(-1, 0, 0), chest());
    world.attach_inventory(
        p(-1, 0, 0),
        Inventory::new(3, 64)
            .with_stack(0, res.iron, 40)
            .with_stack(1, res.gold, 20)
            .with_stack(2, res.coal, 10),
    );
    place(world, p(0, 0, 0), NodeDescriptor::exporter(ResourceKind::Item, Color::Default, Face::West));
    for x in 1..=4 {
        place(world, p(x, 0, 0), NodeDescriptor::conduit(ResourceKind::Item, Color::Default));
    }
    place(world, p(5, 0, 0), chest());
    world.attach_inventory(p(5, 0, 0), Inventory::new(1, 16));
    place(world, p(2, 1, 0), chest());
    world.attach_inventory(p(2, 1, 0), Inventory::new(27, 64));

    // Fluid: an extractor on an endless water sink feeding a tank.
    world.set_fluid_block(p(0, 0, 3), FluidBlock::Sink { fluid: res.water });
    place(world, p(1, 0, 3), NodeDescriptor::exporter(ResourceKind::Fluid, Color::Blue, Face::West));
    place(world, p(2, 0, 3), NodeDescriptor::conduit(ResourceKind::Fluid, Color::Blue));
    place(world, p(3, 0, 3), NodeDescriptor::sink(SinkKind::Tank, KindSet::only(ResourceKind::Fluid)));
    world.attach_tanks(p(3, 0, 3), FluidStorage::new(1, 16_000));

    // Energy: a generator with one adjacent battery and one behind a cable.
    place(world, p(0, 0, 6), NodeDescriptor::generator());
    world.attach_energy(p(0, 0, 6), EnergyBuffer::charged(5_000, 5_000));
    let battery = NodeDescriptor::sink(SinkKind::Machine, KindSet::only(ResourceKind::Energy));
    place(world, p(1, 0, 6), battery);
    world.attach_energy(p(1, 0, 6), EnergyBuffer::new(2_000));
    place(world, p(-1, 0, 6), NodeDescriptor::conduit(ResourceKind::Energy, Color::Default));
    place(world, p(-2, 0, 6), battery);
    world.attach_energy(p(-2, 0, 6), EnergyBuffer::new(2_000));

    placed
}

/// Final state of a demo run.
#[derive(Debug, Default)]
pub struct DemoReport {
    pub passes: Vec<TickSummary>,
    pub events_delivered: u64,
}

impl DemoReport {
    pub fn totals(&self) -> (u64, u64, u64) {
        self.passes.iter().fold((0, 0, 0), |(i, f, e), s| {
            (i + s.items, f + s.fluid, e + s.energy)
        })
    }
}

/// Builds the demo world and runs `ticks` ticks. Halfway through, a
/// conduit is broken and the network is forced to rescan over script.
pub fn run(config: NetworkConfig, ticks: u64) -> DemoReport {
    let res = Resources::new();
    let mut world = GridWorld::new();
    let mut queue = EventQueue::new();
    for event in build(&mut world, &res) {
        queue.push_topology(event);
    }

    let mut system = TransferSystem::new(config, MemoryStore::new());
    system.set_transfer_mode(p(0, 0, 0), DistributionPolicy::RoundRobin);
    queue.on_event(
        ListenerPriority::Post,
        Box::new(|event: &WorldEvent| {
            if let WorldEvent::Topology(change) = event {
                info!(affected = change.affected().len(), "topology changed");
            }
        }),
    );

    let mut bus = ScriptEventBus::new();
    let mut report = DemoReport::default();
    for tick in 0..ticks {
        if tick == ticks / 2 {
            let previous = world.remove(p(3, 0, 0));
            queue.push_topology(TopologyEvent::Broken {
                pos: p(3, 0, 0),
                previous,
            });
            bus.send(channels::UPDATE_PIPES, "item|[2,0,0]");
        }
        for event in bus.drain() {
            system.handle_script_event(&event, &mut world);
        }
        queue.push_tick(tick);
        queue.dispatch(&mut system, &mut world);
        if let Some(summary) = system.last_summary().filter(|s| s.tick == tick) {
            report.passes.push(summary);
        }
    }
    report.events_delivered = queue.total_delivered();

    for (id, name, ()) in res.names.iter() {
        let held: u32 = [p(5, 0, 0), p(2, 1, 0)]
            .iter()
            .filter_map(|&at| world.inventory(at))
            .map(|inv| inv.count(id))
            .sum();
        if held > 0 {
            info!(item = name, held, "delivered");
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::tick::TickRate;

    #[test]
    fn demo_moves_every_kind() {
        let config = NetworkConfig {
            tick_rate: TickRate::Fastest,
            ..NetworkConfig::default()
        };
        let report = run(config, 40);
        let (items, fluid, energy) = report.totals();
        assert!(items > 0);
        assert!(fluid > 0);
        assert!(energy > 0);
        assert_eq!(report.passes.len(), 20);
        assert!(report.events_delivered >= 40);
    }
}
