//! Per-source network snapshots with lazy invalidation.
//!
//! Invalidating only sets a dirty marker; the owner rebuilds on the next
//! access. Replacing a snapshot is a single map insert, so a transfer pass
//! never sees a half-built network.

use std::collections::{BTreeMap, BTreeSet};

use conduit_core::node::{KindSet, ResourceKind};
use conduit_core::pos::BlockPos;
use conduit_core::snapshot::NetworkSnapshot;
use conduit_core::store::{SnapshotStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying an exported network cache.
pub const CACHE_MAGIC: u32 = 0xC0D0_0001;

/// Current export format version.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", CACHE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported cache version {0} (this build reads {CACHE_VERSION})")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Export format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick at which the cache was exported.
    pub tick: u64,
}

impl CacheHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CACHE_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.magic != CACHE_MAGIC {
            return Err(CacheError::InvalidMagic(self.magic));
        }
        if self.version != CACHE_VERSION {
            return Err(CacheError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CacheExport {
    header: CacheHeader,
    snapshots: Vec<(BlockPos, NetworkSnapshot)>,
    dirty: Vec<(BlockPos, ResourceKind)>,
}

// ---------------------------------------------------------------------------
// NetworkCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct NetworkCache {
    snapshots: BTreeMap<(BlockPos, ResourceKind), NetworkSnapshot>,
    dirty: BTreeSet<(BlockPos, ResourceKind)>,
}

impl NetworkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot of `source`, or `None` when missing or dirty.
    pub fn get(&self, source: BlockPos, kind: ResourceKind) -> Option<&NetworkSnapshot> {
        if self.is_dirty(source, kind) {
            return None;
        }
        self.snapshots.get(&(source, kind))
    }

    pub fn get_mut(&mut self, source: BlockPos, kind: ResourceKind) -> Option<&mut NetworkSnapshot> {
        if self.is_dirty(source, kind) {
            return None;
        }
        self.snapshots.get_mut(&(source, kind))
    }

    /// The stored snapshot regardless of the dirty marker.
    pub fn peek(&self, source: BlockPos, kind: ResourceKind) -> Option<&NetworkSnapshot> {
        self.snapshots.get(&(source, kind))
    }

    pub fn is_dirty(&self, source: BlockPos, kind: ResourceKind) -> bool {
        self.dirty.contains(&(source, kind))
    }

    /// Marks a snapshot for rebuild. Returns `false` if it was already dirty.
    pub fn invalidate(&mut self, source: BlockPos, kind: ResourceKind) -> bool {
        self.dirty.insert((source, kind))
    }

    /// Replaces the snapshot of `source` and clears its dirty marker. The
    /// round-robin cursor of the previous snapshot carries over.
    pub fn store(&mut self, source: BlockPos, mut snapshot: NetworkSnapshot) {
        let key = (source, snapshot.kind);
        if let Some(previous) = self.snapshots.get(&key) {
            snapshot.cursor = match snapshot.len() {
                0 => 0,
                len => previous.cursor % len,
            };
        }
        self.dirty.remove(&key);
        self.snapshots.insert(key, snapshot);
    }

    /// Forgets every snapshot of `source`.
    pub fn remove(&mut self, source: BlockPos) -> usize {
        let before = self.snapshots.len();
        self.snapshots.retain(|(pos, _), _| *pos != source);
        self.dirty.retain(|(pos, _)| *pos != source);
        before - self.snapshots.len()
    }

    /// Cached `(source, kind)` pairs of `kinds` whose source sits next to
    /// `pos` or whose snapshot has a target next to it.
    pub fn sources_near(&self, pos: BlockPos, kinds: KindSet) -> Vec<(BlockPos, ResourceKind)> {
        self.snapshots
            .iter()
            .filter(|((source, kind), snapshot)| {
                kinds.contains(*kind) && (source.touches(pos) || snapshot.touches(pos))
            })
            .map(|(key, _)| *key)
            .collect()
    }

    /// Marks every entry returned by [`sources_near`](Self::sources_near).
    /// Returns how many were newly dirtied.
    pub fn invalidate_near(&mut self, pos: BlockPos, kinds: KindSet) -> usize {
        let mut count = 0;
        for (source, kind) in self.sources_near(pos, kinds) {
            if self.invalidate(source, kind) {
                count += 1;
            }
        }
        if count > 0 {
            debug!(%pos, count, "invalidated networks");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockPos, &NetworkSnapshot)> {
        self.snapshots.iter().map(|((pos, _), snap)| (*pos, snap))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Writes one snapshot and its dirty state through the host store.
    pub fn persist<S: SnapshotStore + ?Sized>(
        &self,
        store: &mut S,
        source: BlockPos,
        kind: ResourceKind,
    ) -> Result<(), StoreError> {
        match self.snapshots.get(&(source, kind)) {
            Some(snapshot) => store.save_snapshot(source, snapshot)?,
            None => store.remove_snapshot(source, kind),
        }
        if self.is_dirty(source, kind) {
            store.mark_dirty(source, kind);
        } else {
            store.clear_dirty(source, kind);
        }
        Ok(())
    }

    /// Loads a clean snapshot from the host store. Returns `true` if one
    /// was loaded.
    pub fn restore<S: SnapshotStore + ?Sized>(
        &mut self,
        store: &S,
        source: BlockPos,
        kind: ResourceKind,
    ) -> Result<bool, StoreError> {
        if store.is_dirty(source, kind) {
            return Ok(false);
        }
        match store.load_snapshot(source, kind)? {
            Some(snapshot) if snapshot.kind == kind => {
                self.dirty.remove(&(source, kind));
                self.snapshots.insert((source, kind), snapshot);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Serializes the whole cache with a versioned header.
    pub fn export(&self, tick: u64) -> Result<Vec<u8>, CacheError> {
        let export = CacheExport {
            header: CacheHeader::new(tick),
            snapshots: self.snapshots.iter().map(|((pos, _), s)| (*pos, s.clone())).collect(),
            dirty: self.dirty.iter().copied().collect(),
        };
        bitcode::serialize(&export).map_err(|e| CacheError::Encode(e.to_string()))
    }

    /// Inverse of [`export`](Self::export). Returns the cache and the tick
    /// it was exported at.
    pub fn import(data: &[u8]) -> Result<(Self, u64), CacheError> {
        let export: CacheExport =
            bitcode::deserialize(data).map_err(|e| CacheError::Decode(e.to_string()))?;
        export.header.validate()?;
        let cache = Self {
            snapshots: export
                .snapshots
                .into_iter()
                .map(|(pos, s)| ((pos, s.kind), s))
                .collect(),
            dirty: export.dirty.into_iter().collect(),
        };
        Ok((cache, export.header.tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::node::Color;
    use conduit_core::store::MemoryStore;

    const ITEM: ResourceKind = ResourceKind::Item;

    fn p(x: i32) -> BlockPos {
        BlockPos::new(x, 0, 0)
    }

    fn snap(targets: &[i32]) -> NetworkSnapshot {
        NetworkSnapshot::new(ITEM, Color::Default, targets.iter().map(|&x| p(x)).collect())
    }

    #[test]
    fn dirty_hides_snapshot() {
        let mut cache = NetworkCache::new();
        cache.store(p(0), snap(&[5]));
        assert!(cache.get(p(0), ITEM).is_some());
        assert!(cache.invalidate(p(0), ITEM));
        assert!(!cache.invalidate(p(0), ITEM));
        assert!(cache.get(p(0), ITEM).is_none());
        assert!(cache.peek(p(0), ITEM).is_some());
        cache.store(p(0), snap(&[6]));
        assert_eq!(cache.get(p(0), ITEM).unwrap().targets, vec![p(6)]);
    }

    #[test]
    fn store_carries_cursor() {
        let mut cache = NetworkCache::new();
        cache.store(p(0), snap(&[1, 2, 3]));
        cache.get_mut(p(0), ITEM).unwrap().cursor = 2;
        cache.store(p(0), snap(&[1, 2]));
        assert_eq!(cache.get(p(0), ITEM).unwrap().cursor, 0);
        cache.get_mut(p(0), ITEM).unwrap().cursor = 1;
        cache.store(p(0), snap(&[1, 2, 3, 4]));
        assert_eq!(cache.get(p(0), ITEM).unwrap().cursor, 1);
    }

    #[test]
    fn invalidate_near_hits_sources_and_targets() {
        let mut cache = NetworkCache::new();
        cache.store(p(0), snap(&[10]));
        cache.store(p(20), snap(&[30]));
        cache.store(
            p(40),
            NetworkSnapshot::new(ResourceKind::Fluid, Color::Default, vec![p(11)]),
        );

        assert_eq!(cache.sources_near(p(11), KindSet::ALL).len(), 2);
        assert_eq!(cache.invalidate_near(p(11), KindSet::only(ITEM)), 1);
        assert!(cache.is_dirty(p(0), ITEM));
        assert!(cache.get(p(20), ITEM).is_some());
        assert!(cache.get(p(40), ResourceKind::Fluid).is_some());

        assert_eq!(cache.invalidate_near(p(21), KindSet::ALL), 1);
        assert_eq!(cache.invalidate_near(p(21), KindSet::ALL), 0);
        assert_eq!(cache.dirty_count(), 2);
    }

    #[test]
    fn remove_forgets_all_kinds() {
        let mut cache = NetworkCache::new();
        cache.store(p(0), snap(&[1]));
        cache.store(p(0), NetworkSnapshot::new(ResourceKind::Fluid, Color::Red, vec![]));
        cache.invalidate(p(0), ITEM);
        assert_eq!(cache.remove(p(0)), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.dirty_count(), 0);
    }

    #[test]
    fn persist_and_restore_through_store() {
        let mut store = MemoryStore::new();
        let mut cache = NetworkCache::new();
        cache.store(p(0), snap(&[3, 4]));
        cache.persist(&mut store, p(0), ITEM).unwrap();

        let mut fresh = NetworkCache::new();
        assert!(fresh.restore(&store, p(0), ITEM).unwrap());
        assert_eq!(fresh.get(p(0), ITEM), cache.get(p(0), ITEM));

        cache.invalidate(p(0), ITEM);
        cache.persist(&mut store, p(0), ITEM).unwrap();
        assert!(store.is_dirty(p(0), ITEM));
        let mut fresh = NetworkCache::new();
        assert!(!fresh.restore(&store, p(0), ITEM).unwrap());
    }

    #[test]
    fn export_import() {
        let mut cache = NetworkCache::new();
        cache.store(p(0), snap(&[3]));
        cache.store(p(9), snap(&[8, 7]));
        cache.invalidate(p(9), ITEM);
        let bytes = cache.export(120).unwrap();

        let (back, tick) = NetworkCache::import(&bytes).unwrap();
        assert_eq!(tick, 120);
        assert_eq!(back.len(), 2);
        assert!(back.is_dirty(p(9), ITEM));
        assert_eq!(back.get(p(0), ITEM), cache.get(p(0), ITEM));
    }

    #[test]
    fn header_validation() {
        assert!(CacheHeader::new(0).validate().is_ok());
        let bad = CacheHeader {
            magic: 1,
            version: CACHE_VERSION,
            tick: 0,
        };
        assert!(matches!(bad.validate(), Err(CacheError::InvalidMagic(1))));
        let future = CacheHeader {
            version: CACHE_VERSION + 1,
            ..CacheHeader::new(0)
        };
        assert!(matches!(future.validate(), Err(CacheError::UnsupportedVersion(_))));
        assert!(NetworkCache::import(&[1, 2, 3]).is_err());
    }
}
