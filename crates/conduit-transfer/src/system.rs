//! The transfer system: reacts to topology changes, drives pending scans,
//! and runs one bounded transfer per active source on due ticks.

use std::collections::VecDeque;

use conduit_core::config::NetworkConfig;
use conduit_core::event::{TopologyEvent, WorldObserver};
use conduit_core::filter::{FilterConfig, FilterMode};
use conduit_core::node::{KindSet, NodeDescriptor, NodeRole, ResourceKind, SourceKind};
use conduit_core::pos::BlockPos;
use conduit_core::script::{ScriptEvent, ScriptEventBus, channels};
use conduit_core::snapshot::NetworkSnapshot;
use conduit_core::store::{KvStore, SnapshotStore, StoreError};
use conduit_core::tick::TickRate;
use conduit_core::world::World;
use conduit_spatial::{ScanJob, ScanProgress, ScanReport, refresh_around};
use tracing::{debug, info, warn};

use crate::cache::{CacheError, NetworkCache};
use crate::engine::{TransferBudget, TransferEngine};
use crate::policy::{DistributionPolicy, advance, order};

/// Status values written to each source after a pass.
pub mod status {
    pub const ACTIVE: &str = "active";
    pub const IDLE: &str = "idle";
    /// Exporter without a front face to pull from.
    pub const UNCONFIGURED: &str = "unconfigured";
}

/// What one transfer pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: u64,
    /// Sources considered, including switched-off ones.
    pub sources: usize,
    /// Sources that moved anything.
    pub active: usize,
    pub items: u64,
    pub fluid: u64,
    pub energy: u64,
}

#[derive(Debug)]
struct PendingScan {
    job: ScanJob,
    /// Scans scheduled by one `update_pipes` call share a batch.
    batch: u64,
    /// The seed held a source when the scan was scheduled.
    seeded_at_source: bool,
}

fn is_source(world: &dyn World, pos: BlockPos) -> bool {
    matches!(world.block_at(pos), Ok(Some(node)) if node.role.is_source())
}

/// Kind a source moves: an exporter's own kind, energy for generators.
fn source_kind(node: &NodeDescriptor) -> Option<ResourceKind> {
    match node.role {
        NodeRole::Source(SourceKind::Generator) => Some(ResourceKind::Energy),
        NodeRole::Source(SourceKind::Exporter) => node.kinds.iter().next(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// TransferSystem
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TransferSystem<S: KvStore> {
    config: NetworkConfig,
    cache: NetworkCache,
    store: S,
    pending: VecDeque<PendingScan>,
    next_batch: u64,
    last_summary: Option<TickSummary>,
}

impl<S: KvStore> TransferSystem<S> {
    pub fn new(config: NetworkConfig, store: S) -> Self {
        Self {
            config,
            cache: NetworkCache::new(),
            store,
            pending: VecDeque::new(),
            next_batch: 0,
            last_summary: None,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn tick_rate(&self) -> TickRate {
        self.config.tick_rate
    }

    pub fn cache(&self) -> &NetworkCache {
        &self.cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Number of scans still in progress.
    pub fn pending_scans(&self) -> usize {
        self.pending.len()
    }

    pub fn last_summary(&self) -> Option<TickSummary> {
        self.last_summary
    }

    /// The clean snapshot of `source`, if any.
    pub fn snapshot(&self, source: BlockPos, kind: ResourceKind) -> Option<&NetworkSnapshot> {
        self.cache.get(source, kind)
    }

    // -----------------------------------------------------------------------
    // Admin
    // -----------------------------------------------------------------------

    /// Changes the pass frequency and broadcasts it to the host.
    pub fn set_tick_rate(&mut self, rate: TickRate, bus: &mut ScriptEventBus) {
        self.config.tick_rate = rate;
        rate.apply(bus);
    }

    pub fn set_transfer_mode(&mut self, source: BlockPos, policy: DistributionPolicy) {
        self.store.set_transfer_mode(source, policy.name());
    }

    pub fn set_off(&mut self, source: BlockPos, off: bool) {
        self.store.set_off(source, off);
    }

    pub fn set_filter(&mut self, owner: BlockPos, filter: &FilterConfig) -> Result<(), StoreError> {
        self.store.save_filter(owner, filter)
    }

    /// Flips whitelist/blacklist, creating an empty whitelist first if the
    /// owner has no filter yet. Returns the new mode.
    pub fn toggle_filter_mode(&mut self, owner: BlockPos) -> Result<FilterMode, StoreError> {
        let mut filter = self.store.load_filter(owner)?.unwrap_or_default();
        filter.toggle_mode();
        self.store.save_filter(owner, &filter)?;
        Ok(filter.mode)
    }

    pub fn export_cache(&self, tick: u64) -> Result<Vec<u8>, CacheError> {
        self.cache.export(tick)
    }

    /// Replaces the cache with an exported one. Returns its export tick.
    pub fn import_cache(&mut self, data: &[u8]) -> Result<u64, CacheError> {
        let (cache, tick) = NetworkCache::import(data)?;
        self.cache = cache;
        Ok(tick)
    }

    // -----------------------------------------------------------------------
    // Invalidation and scans
    // -----------------------------------------------------------------------

    fn next_batch(&mut self) -> u64 {
        self.next_batch += 1;
        self.next_batch
    }

    /// Queues a scan from `start`. A pending scan from the same seed is
    /// replaced by a fresh one so the result reflects the current world.
    fn schedule(&mut self, start: BlockPos, kind: ResourceKind, batch: u64, world: &dyn World) {
        let scan = PendingScan {
            job: ScanJob::new(start, kind, world),
            batch,
            seeded_at_source: is_source(world, start),
        };
        match self
            .pending
            .iter_mut()
            .find(|p| p.job.start() == start && p.job.kind() == kind)
        {
            Some(existing) => *existing = scan,
            None => self.pending.push_back(scan),
        }
    }

    /// Restarts pending scans that already looked at `pos`.
    fn restart_stale(&mut self, pos: BlockPos, kind: ResourceKind, world: &dyn World) -> usize {
        let mut restarted = 0;
        for scan in self.pending.iter_mut() {
            if scan.job.kind() == kind && scan.job.has_visited(pos) {
                scan.job = ScanJob::new(scan.job.start(), kind, world);
                restarted += 1;
            }
        }
        restarted
    }

    /// Invalidates every network around `pos`, schedules rescans from `pos`
    /// and its neighbours, and refreshes pipe geometry there.
    pub fn update_pipes(&mut self, world: &mut dyn World, pos: BlockPos, kind: ResourceKind) {
        for (source, k) in self.cache.sources_near(pos, KindSet::only(kind)) {
            self.cache.invalidate(source, k);
            self.store.mark_dirty(source, k);
        }
        let restarted = self.restart_stale(pos, kind, world);

        let batch = self.next_batch();
        let seeds = std::iter::once(pos).chain(pos.neighbors().map(|(_, p)| p));
        for seed in seeds {
            let starts_walk = match world.block_at(seed) {
                Ok(Some(node)) => node.carries(kind) && (node.role.relays() || node.role.is_source()),
                _ => false,
            };
            if starts_walk {
                if is_source(world, seed) {
                    self.cache.invalidate(seed, kind);
                    self.store.mark_dirty(seed, kind);
                }
                self.schedule(seed, kind, batch, world);
            }
        }

        let refreshed = refresh_around(world, pos, kind);
        debug!(%pos, %kind, pending = self.pending.len(), restarted, refreshed, "pipes updated");
    }

    /// Advances every pending scan by one quantum, in FIFO order.
    fn advance_scans(&mut self, world: &dyn World) {
        let quantum = self.config.scan_quantum;
        let mut still_pending = VecDeque::with_capacity(self.pending.len());
        let mut covered: Vec<(u64, ResourceKind, Vec<BlockPos>)> = Vec::new();
        let is_covered = |covered: &[(u64, ResourceKind, Vec<BlockPos>)], scan: &PendingScan| {
            covered.iter().any(|(batch, kind, members)| {
                *batch == scan.batch && *kind == scan.job.kind() && members.contains(&scan.job.start())
            })
        };

        while let Some(mut scan) = self.pending.pop_front() {
            if is_covered(&covered, &scan) {
                continue;
            }
            match scan.job.step(world, quantum) {
                ScanProgress::Pending => still_pending.push_back(scan),
                ScanProgress::Complete(report) => {
                    covered.push((scan.batch, report.kind, report.members.clone()));
                    self.apply_report(report, scan.seeded_at_source, world);
                }
            }
        }
        still_pending.retain(|scan| !is_covered(&covered, scan));
        self.pending = still_pending;
    }

    /// Installs the snapshots of a finished scan for positions that still
    /// hold a source.
    fn apply_report(&mut self, report: ScanReport, seeded_at_source: bool, world: &dyn World) {
        if seeded_at_source && !is_source(world, report.start) {
            debug!(start = %report.start, "discarding scan of a removed source");
            return;
        }
        let kind = report.kind;
        for (source, snapshot) in report.snapshots {
            if !is_source(world, source) {
                continue;
            }
            self.cache.store(source, snapshot);
            if let Err(err) = self.cache.persist(&mut self.store, source, kind) {
                warn!(%source, %err, "could not persist network");
            }
        }
    }

    /// Makes sure `source` has a clean snapshot, restoring it from the
    /// store or scanning. Returns `false` while a scan is still running.
    fn ensure_snapshot(&mut self, source: BlockPos, kind: ResourceKind, world: &dyn World) -> bool {
        if self.cache.get(source, kind).is_some() {
            return true;
        }
        if !self.cache.is_dirty(source, kind) {
            match self.cache.restore(&self.store, source, kind) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => warn!(%source, %err, "ignoring unreadable stored network"),
            }
        }
        if self.pending.iter().any(|p| p.job.start() == source && p.job.kind() == kind) {
            return false;
        }

        let mut job = ScanJob::new(source, kind, world);
        match job.step(world, self.config.scan_quantum) {
            ScanProgress::Complete(report) => {
                self.apply_report(report, true, world);
                self.cache.get(source, kind).is_some()
            }
            ScanProgress::Pending => {
                let batch = self.next_batch();
                self.pending.push_back(PendingScan {
                    job,
                    batch,
                    seeded_at_source: true,
                });
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    /// Runs one bounded transfer for every loaded source that is not
    /// switched off.
    pub fn run_transfers(&mut self, tick: u64, world: &mut dyn World) -> TickSummary {
        let mut summary = TickSummary {
            tick,
            ..TickSummary::default()
        };
        for source in world.sources() {
            summary.sources += 1;
            if self.store.is_off(source) {
                continue;
            }
            let Ok(Some(node)) = world.block_at(source) else {
                continue;
            };
            let Some(kind) = source_kind(&node) else {
                continue;
            };
            if !self.ensure_snapshot(source, kind, world) {
                continue;
            }
            let Some(snapshot) = self.cache.get(source, kind) else {
                continue;
            };

            let policy = self.policy(source);
            let ordered = order(&snapshot.targets, policy, snapshot.cursor);
            let Some(moved) = self.transfer(world, source, &node, kind, &ordered.targets) else {
                self.write_status(source, status::UNCONFIGURED);
                continue;
            };

            if moved > 0 {
                summary.active += 1;
                match kind {
                    ResourceKind::Item => summary.items += moved,
                    ResourceKind::Fluid => summary.fluid += moved,
                    ResourceKind::Energy => summary.energy += moved,
                }
                if policy == DistributionPolicy::RoundRobin {
                    if let Some(snapshot) = self.cache.get_mut(source, kind) {
                        snapshot.cursor = advance(ordered.cursor, ordered.targets.len());
                    }
                    if let Err(err) = self.cache.persist(&mut self.store, source, kind) {
                        warn!(%source, %err, "could not persist cursor");
                    }
                }
            }
            self.write_status(source, if moved > 0 { status::ACTIVE } else { status::IDLE });
        }
        self.last_summary = Some(summary);
        summary
    }

    fn policy(&self, source: BlockPos) -> DistributionPolicy {
        match self.store.transfer_mode(source) {
            None => DistributionPolicy::default(),
            Some(mode) => mode.parse().unwrap_or_else(|err| {
                warn!(%source, %err, "falling back to nearest");
                DistributionPolicy::default()
            }),
        }
    }

    /// `None` when the source has nothing to pull from.
    fn transfer(
        &self,
        world: &mut dyn World,
        source: BlockPos,
        node: &NodeDescriptor,
        kind: ResourceKind,
        targets: &[BlockPos],
    ) -> Option<u64> {
        let filter = if node.filter_upgrade {
            self.store.load_filter(source).unwrap_or_else(|err| {
                warn!(%source, %err, "ignoring unreadable source filter");
                None
            })
        } else {
            None
        };
        let mut engine = TransferEngine::new(world, &self.store);
        let moved = match kind {
            ResourceKind::Item => {
                let from = node.front(source)?;
                let mut budget = TransferBudget::new(u64::from(self.config.item_budget));
                u64::from(engine.items(from, targets, filter.as_ref(), &mut budget))
            }
            ResourceKind::Fluid => {
                let from = node.front(source)?;
                let mut budget = TransferBudget::new(self.config.fluid_budget);
                engine.fluids(from, targets, filter.as_ref(), &mut budget)
            }
            ResourceKind::Energy => {
                let mut budget = TransferBudget::new(self.config.energy_budget);
                engine.energy(source, targets, &mut budget)
            }
        };
        Some(moved)
    }

    fn write_status(&mut self, source: BlockPos, status: &str) {
        if self.store.status(source).as_deref() != Some(status) {
            self.store.set_status(source, status);
        }
    }

    // -----------------------------------------------------------------------
    // Script events
    // -----------------------------------------------------------------------

    /// Handles the channels this system listens on. Returns `false` for
    /// other channels; malformed payloads are logged and ignored.
    pub fn handle_script_event(&mut self, event: &ScriptEvent, world: &mut dyn World) -> bool {
        match event.channel.as_str() {
            channels::SET_TICK_SPEED => {
                match event.payload.trim().parse::<u32>().map(TickRate::custom) {
                    Ok(Ok(rate)) => {
                        self.config.tick_rate = rate;
                        info!(ticks = rate.ticks(), "tick speed set by script");
                    }
                    Ok(Err(err)) => warn!(payload = %event.payload, %err, "ignoring tick speed"),
                    Err(err) => warn!(payload = %event.payload, %err, "ignoring tick speed"),
                }
                true
            }
            channels::UPDATE_PIPES => {
                match parse_update_pipes(&event.payload) {
                    Some((kind, pos)) => self.update_pipes(world, pos, kind),
                    None => warn!(payload = %event.payload, "ignoring malformed update_pipes"),
                }
                true
            }
            _ => false,
        }
    }
}

/// Parses `"<kind>|[x,y,z]"`.
fn parse_update_pipes(payload: &str) -> Option<(ResourceKind, BlockPos)> {
    let (kind, pos) = payload.split_once('|')?;
    Some((kind.trim().parse().ok()?, pos.trim().parse().ok()?))
}

impl<S: KvStore> WorldObserver for TransferSystem<S> {
    fn on_topology_change(&mut self, event: &TopologyEvent, world: &mut dyn World) {
        let kinds = match event {
            TopologyEvent::Placed { pos } => match world.block_at(*pos) {
                Ok(Some(node)) => node.kinds,
                _ => KindSet::ALL,
            },
            TopologyEvent::Broken { pos, previous } => {
                if self.cache.remove(*pos) > 0 || previous.is_some_and(|n| n.role.is_source()) {
                    for kind in ResourceKind::all() {
                        self.store.remove_snapshot(*pos, kind);
                        self.store.clear_dirty(*pos, kind);
                    }
                }
                previous.map_or(KindSet::ALL, |n| n.kinds)
            }
            TopologyEvent::PistonMoved { positions, .. } => {
                for &moved in positions {
                    self.cache.remove(moved);
                }
                KindSet::ALL
            }
        };
        for pos in event.affected() {
            for kind in kinds.iter() {
                self.update_pipes(world, pos, kind);
            }
        }
    }

    fn on_tick(&mut self, tick: u64, world: &mut dyn World) {
        self.advance_scans(world);
        if self.config.tick_rate.is_due(tick) {
            let summary = self.run_transfers(tick, world);
            debug!(
                tick,
                sources = summary.sources,
                active = summary.active,
                pending = self.pending.len(),
                "transfer pass"
            );
        }
    }
}
