//! Whitelist / blacklist filters and smart-importer slot routing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::id::{BlockTypeId, ResourceTypeId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Whitelist,
    Blacklist,
}

/// A set of resource types plus a mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub mode: FilterMode,
    #[serde(default)]
    pub entries: BTreeSet<ResourceTypeId>,
}

impl FilterConfig {
    pub fn whitelist(entries: impl IntoIterator<Item = ResourceTypeId>) -> Self {
        Self {
            mode: FilterMode::Whitelist,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn blacklist(entries: impl IntoIterator<Item = ResourceTypeId>) -> Self {
        Self {
            mode: FilterMode::Blacklist,
            entries: entries.into_iter().collect(),
        }
    }

    /// Strict check: an empty whitelist permits nothing.
    pub fn permits(&self, ty: ResourceTypeId) -> bool {
        self.entries.contains(&ty) == (self.mode == FilterMode::Whitelist)
    }

    /// Like [`permits`](Self::permits) but an empty list permits everything.
    pub fn permits_lenient(&self, ty: ResourceTypeId) -> bool {
        self.entries.is_empty() || self.permits(ty)
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            FilterMode::Whitelist => FilterMode::Blacklist,
            FilterMode::Blacklist => FilterMode::Whitelist,
        };
    }

    pub fn insert(&mut self, ty: ResourceTypeId) -> bool {
        self.entries.insert(ty)
    }

    pub fn remove(&mut self, ty: ResourceTypeId) -> bool {
        self.entries.remove(&ty)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Routes item types to specific slots of one block type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRouting {
    pub block_type: BlockTypeId,
    #[serde(default)]
    pub routes: BTreeMap<ResourceTypeId, Vec<usize>>,
}

impl SlotRouting {
    pub fn new(block_type: BlockTypeId) -> Self {
        Self {
            block_type,
            routes: BTreeMap::new(),
        }
    }

    pub fn route(mut self, ty: ResourceTypeId, slots: impl IntoIterator<Item = usize>) -> Self {
        self.routes.entry(ty).or_default().extend(slots);
        self
    }

    pub fn applies_to(&self, block_type: BlockTypeId) -> bool {
        self.block_type == block_type
    }

    /// Slots `ty` may go into; `None` when the type is not routed.
    pub fn slots_for(&self, ty: ResourceTypeId) -> Option<&[usize]> {
        self.routes.get(&ty).map(Vec::as_slice)
    }
}
