//! Host key/value store port and the typed layer built on it.
//!
//! The host persists two things per block: string tags and typed properties.
//! [`SnapshotStore`] maps the network's state onto those, storing structured
//! values as JSON text, and is implemented for every [`KvStore`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::filter::{FilterConfig, SlotRouting};
use crate::node::ResourceKind;
use crate::pos::BlockPos;
use crate::snapshot::NetworkSnapshot;

// ---------------------------------------------------------------------------
// Raw port
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

pub trait KvStore {
    fn add_tag(&mut self, owner: BlockPos, tag: &str);

    /// Returns `true` if the tag was present.
    fn remove_tag(&mut self, owner: BlockPos, tag: &str) -> bool;

    fn has_tag(&self, owner: BlockPos, tag: &str) -> bool;

    fn tags(&self, owner: BlockPos) -> Vec<String>;

    fn property(&self, owner: BlockPos, key: &str) -> Option<PropertyValue>;

    fn set_property(&mut self, owner: BlockPos, key: &str, value: PropertyValue);

    fn remove_property(&mut self, owner: BlockPos, key: &str) -> Option<PropertyValue>;

    /// Drops every tag and property of `owner`.
    fn clear(&mut self, owner: BlockPos);
}

/// [`KvStore`] backed by ordered maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tags: BTreeMap<BlockPos, BTreeSet<String>>,
    properties: BTreeMap<BlockPos, BTreeMap<String, PropertyValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of owners with any state.
    pub fn owner_count(&self) -> usize {
        self.tags
            .keys()
            .chain(self.properties.keys())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

impl KvStore for MemoryStore {
    fn add_tag(&mut self, owner: BlockPos, tag: &str) {
        self.tags.entry(owner).or_default().insert(tag.to_string());
    }

    fn remove_tag(&mut self, owner: BlockPos, tag: &str) -> bool {
        let Some(tags) = self.tags.get_mut(&owner) else {
            return false;
        };
        let removed = tags.remove(tag);
        if tags.is_empty() {
            self.tags.remove(&owner);
        }
        removed
    }

    fn has_tag(&self, owner: BlockPos, tag: &str) -> bool {
        self.tags.get(&owner).is_some_and(|t| t.contains(tag))
    }

    fn tags(&self, owner: BlockPos) -> Vec<String> {
        self.tags
            .get(&owner)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn property(&self, owner: BlockPos, key: &str) -> Option<PropertyValue> {
        self.properties.get(&owner)?.get(key).cloned()
    }

    fn set_property(&mut self, owner: BlockPos, key: &str, value: PropertyValue) {
        self.properties
            .entry(owner)
            .or_default()
            .insert(key.to_string(), value);
    }

    fn remove_property(&mut self, owner: BlockPos, key: &str) -> Option<PropertyValue> {
        let props = self.properties.get_mut(&owner)?;
        let removed = props.remove(key);
        if props.is_empty() {
            self.properties.remove(&owner);
        }
        removed
    }

    fn clear(&mut self, owner: BlockPos) {
        self.tags.remove(&owner);
        self.properties.remove(&owner);
    }
}

// ---------------------------------------------------------------------------
// Typed layer
// ---------------------------------------------------------------------------

pub mod keys {
    pub const FILTER: &str = "filter";
    pub const ROUTING: &str = "routing";
    pub const IS_OFF: &str = "is_off";
    pub const TRANSFER_MODE: &str = "transfer_mode";
    pub const STATUS: &str = "status";

    pub fn network(kind: crate::node::ResourceKind) -> String {
        format!("network:{kind}")
    }

    pub fn dirty_tag(kind: crate::node::ResourceKind) -> String {
        format!("update_network:{kind}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("property {key:?} of {owner} is not valid JSON: {source}")]
    Json {
        owner: BlockPos,
        key: String,
        source: serde_json::Error,
    },
    #[error("property {key:?} of {owner} has the wrong type")]
    WrongType { owner: BlockPos, key: String },
}

/// Typed access to the network state persisted per block.
pub trait SnapshotStore {
    fn load_snapshot(
        &self,
        source: BlockPos,
        kind: ResourceKind,
    ) -> Result<Option<NetworkSnapshot>, StoreError>;

    fn save_snapshot(&mut self, source: BlockPos, snapshot: &NetworkSnapshot) -> Result<(), StoreError>;

    fn remove_snapshot(&mut self, source: BlockPos, kind: ResourceKind);

    fn mark_dirty(&mut self, source: BlockPos, kind: ResourceKind);

    fn clear_dirty(&mut self, source: BlockPos, kind: ResourceKind);

    fn is_dirty(&self, source: BlockPos, kind: ResourceKind) -> bool;

    fn load_filter(&self, owner: BlockPos) -> Result<Option<FilterConfig>, StoreError>;

    fn save_filter(&mut self, owner: BlockPos, filter: &FilterConfig) -> Result<(), StoreError>;

    fn load_routing(&self, owner: BlockPos) -> Result<Option<SlotRouting>, StoreError>;

    fn save_routing(&mut self, owner: BlockPos, routing: &SlotRouting) -> Result<(), StoreError>;

    fn is_off(&self, owner: BlockPos) -> bool;

    fn set_off(&mut self, owner: BlockPos, off: bool);

    fn transfer_mode(&self, owner: BlockPos) -> Option<String>;

    fn set_transfer_mode(&mut self, owner: BlockPos, mode: &str);

    fn status(&self, owner: BlockPos) -> Option<String>;

    fn set_status(&mut self, owner: BlockPos, status: &str);
}

fn load_json<S, T>(store: &S, owner: BlockPos, key: &str) -> Result<Option<T>, StoreError>
where
    S: KvStore + ?Sized,
    T: DeserializeOwned,
{
    match store.property(owner, key) {
        None => Ok(None),
        Some(PropertyValue::Text(text)) => {
            serde_json::from_str(&text)
                .map(Some)
                .map_err(|source| StoreError::Json {
                    owner,
                    key: key.to_string(),
                    source,
                })
        }
        Some(_) => Err(StoreError::WrongType {
            owner,
            key: key.to_string(),
        }),
    }
}

fn save_json<S, T>(store: &mut S, owner: BlockPos, key: &str, value: &T) -> Result<(), StoreError>
where
    S: KvStore + ?Sized,
    T: Serialize,
{
    let text = serde_json::to_string(value).map_err(|source| StoreError::Json {
        owner,
        key: key.to_string(),
        source,
    })?;
    store.set_property(owner, key, PropertyValue::Text(text));
    Ok(())
}

fn text_property<S: KvStore + ?Sized>(store: &S, owner: BlockPos, key: &str) -> Option<String> {
    match store.property(owner, key) {
        Some(PropertyValue::Text(text)) => Some(text),
        _ => None,
    }
}

impl<S: KvStore + ?Sized> SnapshotStore for S {
    fn load_snapshot(
        &self,
        source: BlockPos,
        kind: ResourceKind,
    ) -> Result<Option<NetworkSnapshot>, StoreError> {
        load_json(self, source, &keys::network(kind))
    }

    fn save_snapshot(&mut self, source: BlockPos, snapshot: &NetworkSnapshot) -> Result<(), StoreError> {
        save_json(self, source, &keys::network(snapshot.kind), snapshot)
    }

    fn remove_snapshot(&mut self, source: BlockPos, kind: ResourceKind) {
        self.remove_property(source, &keys::network(kind));
    }

    fn mark_dirty(&mut self, source: BlockPos, kind: ResourceKind) {
        self.add_tag(source, &keys::dirty_tag(kind));
    }

    fn clear_dirty(&mut self, source: BlockPos, kind: ResourceKind) {
        self.remove_tag(source, &keys::dirty_tag(kind));
    }

    fn is_dirty(&self, source: BlockPos, kind: ResourceKind) -> bool {
        self.has_tag(source, &keys::dirty_tag(kind))
    }

    fn load_filter(&self, owner: BlockPos) -> Result<Option<FilterConfig>, StoreError> {
        load_json(self, owner, keys::FILTER)
    }

    fn save_filter(&mut self, owner: BlockPos, filter: &FilterConfig) -> Result<(), StoreError> {
        save_json(self, owner, keys::FILTER, filter)
    }

    fn load_routing(&self, owner: BlockPos) -> Result<Option<SlotRouting>, StoreError> {
        load_json(self, owner, keys::ROUTING)
    }

    fn save_routing(&mut self, owner: BlockPos, routing: &SlotRouting) -> Result<(), StoreError> {
        save_json(self, owner, keys::ROUTING, routing)
    }

    fn is_off(&self, owner: BlockPos) -> bool {
        matches!(self.property(owner, keys::IS_OFF), Some(PropertyValue::Bool(true)))
    }

    fn set_off(&mut self, owner: BlockPos, off: bool) {
        self.set_property(owner, keys::IS_OFF, PropertyValue::Bool(off));
    }

    fn transfer_mode(&self, owner: BlockPos) -> Option<String> {
        text_property(self, owner, keys::TRANSFER_MODE)
    }

    fn set_transfer_mode(&mut self, owner: BlockPos, mode: &str) {
        self.set_property(owner, keys::TRANSFER_MODE, PropertyValue::Text(mode.to_string()));
    }

    fn status(&self, owner: BlockPos) -> Option<String> {
        text_property(self, owner, keys::STATUS)
    }

    fn set_status(&mut self, owner: BlockPos, status: &str) {
        self.set_property(owner, keys::STATUS, PropertyValue::Text(status.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ResourceTypeId;
    use crate::node::Color;

    fn owner() -> BlockPos {
        BlockPos::new(1, 2, 3)
    }

    #[test]
    fn tags_round_trip() {
        let mut store = MemoryStore::new();
        store.add_tag(owner(), "a");
        store.add_tag(owner(), "b");
        assert!(store.has_tag(owner(), "a"));
        assert_eq!(store.tags(owner()), vec!["a".to_string(), "b".to_string()]);
        assert!(store.remove_tag(owner(), "a"));
        assert!(!store.remove_tag(owner(), "a"));
        assert_eq!(store.owner_count(), 1);
        store.clear(owner());
        assert_eq!(store.owner_count(), 0);
    }

    #[test]
    fn snapshot_persists_as_json() {
        let mut store = MemoryStore::new();
        let snap = NetworkSnapshot::new(ResourceKind::Item, Color::Red, vec![BlockPos::new(0, 0, 1)]);
        store.save_snapshot(owner(), &snap).unwrap();
        assert_eq!(store.load_snapshot(owner(), ResourceKind::Item).unwrap(), Some(snap));
        assert_eq!(store.load_snapshot(owner(), ResourceKind::Fluid).unwrap(), None);
        store.remove_snapshot(owner(), ResourceKind::Item);
        assert_eq!(store.load_snapshot(owner(), ResourceKind::Item).unwrap(), None);
    }

    #[test]
    fn dirty_tag_per_kind() {
        let mut store = MemoryStore::new();
        store.mark_dirty(owner(), ResourceKind::Energy);
        assert!(store.is_dirty(owner(), ResourceKind::Energy));
        assert!(!store.is_dirty(owner(), ResourceKind::Item));
        assert!(store.has_tag(owner(), "update_network:energy"));
        store.clear_dirty(owner(), ResourceKind::Energy);
        assert!(!store.is_dirty(owner(), ResourceKind::Energy));
    }

    #[test]
    fn malformed_filter_is_an_error() {
        let mut store = MemoryStore::new();
        store.set_property(owner(), keys::FILTER, PropertyValue::Text("{nope".into()));
        assert!(matches!(store.load_filter(owner()), Err(StoreError::Json { .. })));
        store.set_property(owner(), keys::FILTER, PropertyValue::Int(3));
        assert!(matches!(store.load_filter(owner()), Err(StoreError::WrongType { .. })));
    }

    #[test]
    fn filter_and_switches() {
        let mut store = MemoryStore::new();
        let filter = FilterConfig::whitelist([ResourceTypeId(4)]);
        store.save_filter(owner(), &filter).unwrap();
        assert_eq!(store.load_filter(owner()).unwrap(), Some(filter));

        assert!(!store.is_off(owner()));
        store.set_off(owner(), true);
        assert!(store.is_off(owner()));

        assert_eq!(store.transfer_mode(owner()), None);
        store.set_transfer_mode(owner(), "round");
        assert_eq!(store.transfer_mode(owner()).as_deref(), Some("round"));
        store.set_status(owner(), "active");
        assert_eq!(store.status(owner()).as_deref(), Some("active"));
    }
}
