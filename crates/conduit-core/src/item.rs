use crate::id::ResourceTypeId;
use serde::{Deserialize, Serialize};

/// A stack of one item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_type: ResourceTypeId,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(item_type: ResourceTypeId, quantity: u32) -> Self {
        Self {
            item_type,
            quantity,
        }
    }
}

/// A container slot holding at most one item type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub stack: Option<ItemStack>,
    pub capacity: u32,
}

impl InventorySlot {
    pub fn new(capacity: u32) -> Self {
        Self {
            stack: None,
            capacity,
        }
    }

    /// Add items. Returns the amount that didn't fit.
    #[must_use = "overflow count indicates items that did not fit"]
    pub fn add(&mut self, item_type: ResourceTypeId, quantity: u32) -> u32 {
        let to_add = quantity.min(self.free_for(item_type));
        if to_add > 0 {
            match &mut self.stack {
                Some(stack) => stack.quantity += to_add,
                None => self.stack = Some(ItemStack::new(item_type, to_add)),
            }
        }
        quantity - to_add
    }

    /// Remove items. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, quantity: u32) -> u32 {
        let Some(stack) = &mut self.stack else {
            return 0;
        };
        let to_remove = quantity.min(stack.quantity);
        stack.quantity -= to_remove;
        if stack.quantity == 0 {
            self.stack = None;
        }
        to_remove
    }

    /// Room left for `item_type`; zero when the slot holds another type.
    pub fn free_for(&self, item_type: ResourceTypeId) -> u32 {
        match self.stack {
            None => self.capacity,
            Some(stack) if stack.item_type == item_type => {
                self.capacity.saturating_sub(stack.quantity)
            }
            Some(_) => 0,
        }
    }

    pub fn quantity(&self) -> u32 {
        self.stack.map_or(0, |s| s.quantity)
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_none()
    }
}

// ---------------------------------------------------------------------------
// ItemContainer
// ---------------------------------------------------------------------------

/// Slot-addressed item storage as exposed by the host.
pub trait ItemContainer {
    fn slot_count(&self) -> usize;

    fn stack(&self, slot: usize) -> Option<ItemStack>;

    /// Room for `item_type` in one slot.
    fn free_in_slot(&self, slot: usize, item_type: ResourceTypeId) -> u32;

    /// Inserts into one slot. Returns the amount inserted.
    fn insert_into(&mut self, slot: usize, item_type: ResourceTypeId, quantity: u32) -> u32;

    /// Removes from one slot. Returns the amount removed.
    fn extract(&mut self, slot: usize, quantity: u32) -> u32;

    /// Room for `item_type` across all slots.
    fn free_capacity(&self, item_type: ResourceTypeId) -> u32 {
        (0..self.slot_count())
            .map(|slot| self.free_in_slot(slot, item_type))
            .fold(0u32, u32::saturating_add)
    }

    /// Inserts anywhere: stacks of the same type first, then empty slots.
    /// Returns the amount inserted.
    fn insert(&mut self, item_type: ResourceTypeId, quantity: u32) -> u32 {
        let slots = 0..self.slot_count();
        let (matching, empty): (Vec<usize>, Vec<usize>) = slots
            .filter(|&s| self.free_in_slot(s, item_type) > 0)
            .partition(|&s| self.stack(s).is_some());
        let mut inserted = 0;
        for slot in matching.into_iter().chain(empty) {
            if inserted == quantity {
                break;
            }
            inserted += self.insert_into(slot, item_type, quantity - inserted);
        }
        inserted
    }
}

/// Plain list of slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub slots: Vec<InventorySlot>,
}

impl Inventory {
    pub fn new(slot_count: usize, capacity: u32) -> Self {
        Self {
            slots: (0..slot_count).map(|_| InventorySlot::new(capacity)).collect(),
        }
    }

    /// Sets a slot directly, replacing its content.
    pub fn with_stack(mut self, slot: usize, item_type: ResourceTypeId, quantity: u32) -> Self {
        if let Some(s) = self.slots.get_mut(slot) {
            s.stack = (quantity > 0).then(|| ItemStack::new(item_type, quantity.min(s.capacity)));
        }
        self
    }

    /// Total of `item_type` across all slots.
    pub fn count(&self, item_type: ResourceTypeId) -> u32 {
        self.slots
            .iter()
            .filter_map(|s| s.stack)
            .filter(|s| s.item_type == item_type)
            .map(|s| s.quantity)
            .sum()
    }

    pub fn total(&self) -> u32 {
        self.slots.iter().map(InventorySlot::quantity).sum()
    }
}

impl ItemContainer for Inventory {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn stack(&self, slot: usize) -> Option<ItemStack> {
        self.slots.get(slot).and_then(|s| s.stack)
    }

    fn free_in_slot(&self, slot: usize, item_type: ResourceTypeId) -> u32 {
        self.slots.get(slot).map_or(0, |s| s.free_for(item_type))
    }

    fn insert_into(&mut self, slot: usize, item_type: ResourceTypeId, quantity: u32) -> u32 {
        match self.slots.get_mut(slot) {
            Some(s) => quantity - s.add(item_type, quantity),
            None => 0,
        }
    }

    fn extract(&mut self, slot: usize, quantity: u32) -> u32 {
        self.slots.get_mut(slot).map_or(0, |s| s.remove(quantity))
    }
}
