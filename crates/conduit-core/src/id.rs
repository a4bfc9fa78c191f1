use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a storage-bearing entity (machine, tank, container block
    /// entity) in the in-memory host.
    pub struct EntityId;
}

/// Identifies an item or fluid type in a registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceTypeId(pub u32);

/// Identifies a host block type (chest, barrel, crusher, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BlockTypeId(pub u32);
