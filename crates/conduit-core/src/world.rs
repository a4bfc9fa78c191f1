//! The host port: everything the network needs from the game world.
//!
//! Every call may fail with a [`HostError`] (unloaded chunk, entity removed
//! mid-tick, ...). Callers treat a failed call as "nothing there" and carry
//! on; host errors never abort a scan or a transfer tick.

use std::ops::Range;

use crate::energy::EnergyContainer;
use crate::fluid::{FluidBlock, FluidContainer};
use crate::id::EntityId;
use crate::item::ItemContainer;
use crate::node::{NodeDescriptor, ResourceKind};
use crate::pos::{BlockPos, Connections};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("position {0} is not loaded")]
    Unloaded(BlockPos),
    #[error("storage at {0} is unavailable")]
    Unavailable(BlockPos),
    #[error("entity at {0} disappeared")]
    EntityGone(BlockPos),
}

/// Mutable view of an item container plus the slots sources may pull from.
pub struct ContainerAccess<'a> {
    pub container: &'a mut dyn ItemContainer,
    pub output_range: Range<usize>,
}

impl std::fmt::Debug for ContainerAccess<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerAccess")
            .field("slots", &self.container.slot_count())
            .field("output_range", &self.output_range)
            .finish()
    }
}

pub trait World {
    /// `Ok(None)` for blocks the network does not know about (air, dirt).
    fn block_at(&self, pos: BlockPos) -> Result<Option<NodeDescriptor>, HostError>;

    fn entity_at(&self, pos: BlockPos) -> Result<Option<EntityId>, HostError>;

    fn items_at(&mut self, pos: BlockPos) -> Result<Option<ContainerAccess<'_>>, HostError>;

    fn fluids_at(&mut self, pos: BlockPos) -> Result<Option<&mut dyn FluidContainer>, HostError>;

    fn fluid_block_at(&self, pos: BlockPos) -> Result<Option<FluidBlock>, HostError>;

    /// Consumes a finite fluid block entirely (vanilla source becomes air,
    /// crucible drops to level zero).
    fn drain_fluid_block(&mut self, pos: BlockPos) -> Result<(), HostError>;

    fn energy_at(&mut self, pos: BlockPos) -> Result<Option<&mut dyn EnergyContainer>, HostError>;

    fn connections(&self, pos: BlockPos, kind: ResourceKind) -> Result<Connections, HostError>;

    fn set_connections(
        &mut self,
        pos: BlockPos,
        kind: ResourceKind,
        connections: Connections,
    ) -> Result<(), HostError>;

    /// Positions of every loaded source block, in ascending order.
    fn sources(&self) -> Vec<BlockPos>;
}
