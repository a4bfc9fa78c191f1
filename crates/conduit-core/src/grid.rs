//! In-memory [`World`] used by tests, benches and the headless demo.
//!
//! Storage (inventories, tanks, energy buffers) lives on entities in a
//! [`SlotMap`], indexed by the block position they sit on. Positions can be
//! marked unloaded or faulty to exercise host-error paths.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use slotmap::SlotMap;

use crate::energy::{EnergyBuffer, EnergyContainer};
use crate::fluid::{FluidBlock, FluidContainer, FluidStorage};
use crate::id::EntityId;
use crate::item::{Inventory, ItemContainer};
use crate::node::{NodeDescriptor, ResourceKind};
use crate::pos::{BlockPos, Connections};
use crate::world::{ContainerAccess, HostError, World};

#[derive(Debug, Clone, Default)]
struct Storage {
    inventory: Option<(Inventory, Range<usize>)>,
    tanks: Option<FluidStorage>,
    energy: Option<EnergyBuffer>,
}

#[derive(Debug, Default)]
pub struct GridWorld {
    blocks: BTreeMap<BlockPos, NodeDescriptor>,
    storage: SlotMap<EntityId, Storage>,
    storage_at: HashMap<BlockPos, EntityId>,
    fluid_blocks: HashMap<BlockPos, FluidBlock>,
    connections: HashMap<(BlockPos, ResourceKind), Connections>,
    unloaded: BTreeSet<BlockPos>,
    faulty: BTreeSet<BlockPos>,
}

impl GridWorld {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    /// Places a block, returning whatever was there before.
    pub fn place(&mut self, pos: BlockPos, node: NodeDescriptor) -> Option<NodeDescriptor> {
        self.blocks.insert(pos, node)
    }

    /// Removes a block together with its storage, fluid and connection state.
    pub fn remove(&mut self, pos: BlockPos) -> Option<NodeDescriptor> {
        if let Some(id) = self.storage_at.remove(&pos) {
            self.storage.remove(id);
        }
        self.fluid_blocks.remove(&pos);
        self.connections.retain(|(p, _), _| *p != pos);
        self.blocks.remove(&pos)
    }

    /// Moves a block and its storage, as a piston does. Anything at `to` is
    /// replaced.
    pub fn move_block(&mut self, from: BlockPos, to: BlockPos) {
        self.remove(to);
        if let Some(node) = self.blocks.remove(&from) {
            self.blocks.insert(to, node);
        }
        if let Some(id) = self.storage_at.remove(&from) {
            self.storage_at.insert(to, id);
        }
        if let Some(fluid) = self.fluid_blocks.remove(&from) {
            self.fluid_blocks.insert(to, fluid);
        }
        self.connections.retain(|(p, _), _| *p != from);
    }

    pub fn node(&self, pos: BlockPos) -> Option<&NodeDescriptor> {
        self.blocks.get(&pos)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    // -----------------------------------------------------------------------
    // Storage
    // -----------------------------------------------------------------------

    fn storage_entry(&mut self, pos: BlockPos) -> (EntityId, &mut Storage) {
        let id = match self.storage_at.get(&pos) {
            Some(&id) if self.storage.contains_key(id) => id,
            _ => {
                let id = self.storage.insert(Storage::default());
                self.storage_at.insert(pos, id);
                id
            }
        };
        (id, &mut self.storage[id])
    }

    /// Attaches an inventory whose every slot can be pulled from.
    pub fn attach_inventory(&mut self, pos: BlockPos, inventory: Inventory) -> EntityId {
        let range = 0..inventory.slot_count();
        self.attach_inventory_with_output(pos, inventory, range)
    }

    /// Attaches an inventory where sources may only pull from `output_range`.
    pub fn attach_inventory_with_output(
        &mut self,
        pos: BlockPos,
        inventory: Inventory,
        output_range: Range<usize>,
    ) -> EntityId {
        let (id, storage) = self.storage_entry(pos);
        storage.inventory = Some((inventory, output_range));
        id
    }

    pub fn attach_tanks(&mut self, pos: BlockPos, tanks: FluidStorage) -> EntityId {
        let (id, storage) = self.storage_entry(pos);
        storage.tanks = Some(tanks);
        id
    }

    pub fn attach_energy(&mut self, pos: BlockPos, buffer: EnergyBuffer) -> EntityId {
        let (id, storage) = self.storage_entry(pos);
        storage.energy = Some(buffer);
        id
    }

    pub fn set_fluid_block(&mut self, pos: BlockPos, block: FluidBlock) {
        self.fluid_blocks.insert(pos, block);
    }

    fn storage(&self, pos: BlockPos) -> Option<&Storage> {
        self.storage_at.get(&pos).and_then(|&id| self.storage.get(id))
    }

    pub fn inventory(&self, pos: BlockPos) -> Option<&Inventory> {
        self.storage(pos)?.inventory.as_ref().map(|(inv, _)| inv)
    }

    pub fn tanks(&self, pos: BlockPos) -> Option<&FluidStorage> {
        self.storage(pos)?.tanks.as_ref()
    }

    pub fn energy(&self, pos: BlockPos) -> Option<&EnergyBuffer> {
        self.storage(pos)?.energy.as_ref()
    }

    pub fn fluid_block(&self, pos: BlockPos) -> Option<FluidBlock> {
        self.fluid_blocks.get(&pos).copied()
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    /// Unloaded positions fail every call.
    pub fn set_loaded(&mut self, pos: BlockPos, loaded: bool) {
        if loaded {
            self.unloaded.remove(&pos);
        } else {
            self.unloaded.insert(pos);
        }
    }

    /// Faulty positions fail storage calls only.
    pub fn set_faulty(&mut self, pos: BlockPos, faulty: bool) {
        if faulty {
            self.faulty.insert(pos);
        } else {
            self.faulty.remove(&pos);
        }
    }

    fn check_loaded(&self, pos: BlockPos) -> Result<(), HostError> {
        if self.unloaded.contains(&pos) {
            return Err(HostError::Unloaded(pos));
        }
        Ok(())
    }

    fn check_storage(&self, pos: BlockPos) -> Result<Option<EntityId>, HostError> {
        self.check_loaded(pos)?;
        if self.faulty.contains(&pos) {
            return Err(HostError::Unavailable(pos));
        }
        Ok(self.storage_at.get(&pos).copied())
    }
}

impl World for GridWorld {
    fn block_at(&self, pos: BlockPos) -> Result<Option<NodeDescriptor>, HostError> {
        self.check_loaded(pos)?;
        Ok(self.blocks.get(&pos).copied())
    }

    fn entity_at(&self, pos: BlockPos) -> Result<Option<EntityId>, HostError> {
        self.check_loaded(pos)?;
        Ok(self.storage_at.get(&pos).copied())
    }

    fn items_at(&mut self, pos: BlockPos) -> Result<Option<ContainerAccess<'_>>, HostError> {
        let Some(id) = self.check_storage(pos)? else {
            return Ok(None);
        };
        let Some(storage) = self.storage.get_mut(id) else {
            return Err(HostError::EntityGone(pos));
        };
        Ok(storage
            .inventory
            .as_mut()
            .map(|(inventory, range)| ContainerAccess {
                container: inventory,
                output_range: range.clone(),
            }))
    }

    fn fluids_at(&mut self, pos: BlockPos) -> Result<Option<&mut dyn FluidContainer>, HostError> {
        let Some(id) = self.check_storage(pos)? else {
            return Ok(None);
        };
        let Some(storage) = self.storage.get_mut(id) else {
            return Err(HostError::EntityGone(pos));
        };
        Ok(storage
            .tanks
            .as_mut()
            .map(|tanks| tanks as &mut dyn FluidContainer))
    }

    fn fluid_block_at(&self, pos: BlockPos) -> Result<Option<FluidBlock>, HostError> {
        self.check_loaded(pos)?;
        Ok(self.fluid_blocks.get(&pos).copied())
    }

    fn drain_fluid_block(&mut self, pos: BlockPos) -> Result<(), HostError> {
        self.check_loaded(pos)?;
        match self.fluid_blocks.get_mut(&pos) {
            Some(FluidBlock::Liquid { .. }) => {
                self.fluid_blocks.remove(&pos);
            }
            Some(FluidBlock::Crucible { level, .. }) => *level = 0,
            Some(FluidBlock::Sink { .. }) | None => {}
        }
        Ok(())
    }

    fn energy_at(&mut self, pos: BlockPos) -> Result<Option<&mut dyn EnergyContainer>, HostError> {
        let Some(id) = self.check_storage(pos)? else {
            return Ok(None);
        };
        let Some(storage) = self.storage.get_mut(id) else {
            return Err(HostError::EntityGone(pos));
        };
        Ok(storage
            .energy
            .as_mut()
            .map(|buffer| buffer as &mut dyn EnergyContainer))
    }

    fn connections(&self, pos: BlockPos, kind: ResourceKind) -> Result<Connections, HostError> {
        self.check_loaded(pos)?;
        Ok(self
            .connections
            .get(&(pos, kind))
            .copied()
            .unwrap_or_default())
    }

    fn set_connections(
        &mut self,
        pos: BlockPos,
        kind: ResourceKind,
        connections: Connections,
    ) -> Result<(), HostError> {
        self.check_loaded(pos)?;
        self.connections.insert((pos, kind), connections);
        Ok(())
    }

    fn sources(&self) -> Vec<BlockPos> {
        self.blocks
            .iter()
            .filter(|(pos, node)| node.role.is_source() && !self.unloaded.contains(*pos))
            .map(|(pos, _)| *pos)
            .collect()
    }
}
