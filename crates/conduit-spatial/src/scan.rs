//! Breadth-first network discovery.
//!
//! A scan starts at one position and walks orthogonal neighbours that carry
//! the scanned [`ResourceKind`]. Relaying nodes (conduits, exporters,
//! importers) of the network colour are expanded; sinks are recorded as
//! targets; generators are collected and each gets a second, localized walk
//! seeded at its own position. Everything else stops the walk.
//!
//! Scans are cooperative: [`ScanJob::step`] visits at most `quantum`
//! positions and returns [`ScanProgress::Pending`] until the job is done.
//! [`rescan`] runs a job to completion in one call.

use std::collections::{BTreeMap, HashSet, VecDeque};

use conduit_core::node::{Color, NodeRole, ResourceKind, SinkKind, SourceKind};
use conduit_core::pos::BlockPos;
use conduit_core::snapshot::NetworkSnapshot;
use conduit_core::world::World;
use tracing::debug;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Result of a finished scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub start: BlockPos,
    pub kind: ResourceKind,
    /// Colour of the main walk.
    pub color: Color,
    /// One snapshot per exporter and generator found.
    pub snapshots: BTreeMap<BlockPos, NetworkSnapshot>,
    /// Targets of the main walk in discovery order, before exclusion.
    pub targets: Vec<BlockPos>,
    /// Relaying nodes of the main walk.
    pub members: Vec<BlockPos>,
    /// Positions visited across all walks.
    pub visited: usize,
}

impl ScanReport {
    fn empty(start: BlockPos, kind: ResourceKind, color: Color) -> Self {
        Self {
            start,
            kind,
            color,
            snapshots: BTreeMap::new(),
            targets: Vec::new(),
            members: Vec::new(),
            visited: 0,
        }
    }

    pub fn has_member(&self, pos: BlockPos) -> bool {
        self.members.contains(&pos)
    }

    pub fn sources(&self) -> impl Iterator<Item = BlockPos> + '_ {
        self.snapshots.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanProgress {
    Pending,
    Complete(ScanReport),
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

/// A single BFS over one colour.
#[derive(Debug)]
struct Walk {
    color: Color,
    queue: VecDeque<BlockPos>,
    visited: HashSet<BlockPos>,
    targets: Vec<BlockPos>,
    recorded: HashSet<BlockPos>,
    members: Vec<BlockPos>,
    /// `(exporter, front)` pairs.
    exporters: Vec<(BlockPos, BlockPos)>,
    generators: Vec<BlockPos>,
    collect_generators: bool,
    visited_count: usize,
}

impl Walk {
    fn new(color: Color, collect_generators: bool) -> Self {
        Self {
            color,
            queue: VecDeque::new(),
            visited: HashSet::new(),
            targets: Vec::new(),
            recorded: HashSet::new(),
            members: Vec::new(),
            exporters: Vec::new(),
            generators: Vec::new(),
            collect_generators,
            visited_count: 0,
        }
    }

    fn main(start: BlockPos, color: Color) -> Self {
        let mut walk = Self::new(color, true);
        walk.queue.push_back(start);
        walk
    }

    /// Seeds at the neighbours of `origin`; `origin` itself is never visited.
    fn localized(origin: BlockPos, color: Color) -> Self {
        let mut walk = Self::new(color, false);
        walk.visited.insert(origin);
        walk.queue.extend(origin.neighbors().map(|(_, p)| p));
        walk
    }

    fn is_done(&self) -> bool {
        self.queue.is_empty()
    }

    fn record(&mut self, pos: BlockPos) {
        if self.recorded.insert(pos) {
            self.targets.push(pos);
        }
    }

    /// Visits up to `quantum` new positions. Returns how many were visited.
    fn advance(&mut self, world: &dyn World, kind: ResourceKind, quantum: usize) -> usize {
        let mut visited = 0;
        while visited < quantum {
            let Some(pos) = self.queue.pop_front() else {
                break;
            };
            if !self.visited.insert(pos) {
                continue;
            }
            visited += 1;
            self.visit(world, kind, pos);
        }
        self.visited_count += visited;
        visited
    }

    fn visit(&mut self, world: &dyn World, kind: ResourceKind, pos: BlockPos) {
        let node = match world.block_at(pos) {
            Ok(Some(node)) if node.carries(kind) => node,
            _ => return,
        };
        match node.role {
            role if role.relays() => {
                if kind.is_colored() && node.color != self.color {
                    return;
                }
                self.members.push(pos);
                let mut blocked = None;
                match role {
                    NodeRole::Filtered => {
                        self.record(pos);
                        blocked = node.front(pos);
                    }
                    NodeRole::Source(SourceKind::Exporter) => {
                        if let Some(front) = node.front(pos) {
                            self.exporters.push((pos, front));
                        }
                    }
                    _ => {}
                }
                for (_, next) in pos.neighbors() {
                    if Some(next) != blocked && !self.visited.contains(&next) {
                        self.queue.push_back(next);
                    }
                }
            }
            NodeRole::Sink(SinkKind::Port { controller }) => self.record(controller),
            NodeRole::Sink(SinkKind::Machine) => {
                if matches!(world.entity_at(pos), Ok(Some(_))) {
                    self.record(pos);
                }
            }
            NodeRole::Sink(_) => self.record(pos),
            NodeRole::Source(SourceKind::Generator) => {
                if self.collect_generators {
                    self.generators.push(pos);
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// ScanJob
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Phase {
    Discover,
    Localized { index: usize, walk: Walk },
    Done,
}

/// A resumable scan.
#[derive(Debug)]
pub struct ScanJob {
    start: BlockPos,
    kind: ResourceKind,
    main: Walk,
    phase: Phase,
    /// Positions visited by finished localized walks.
    seen: HashSet<BlockPos>,
    report: ScanReport,
}

impl ScanJob {
    /// The network colour is the seed's colour when the seed relays,
    /// `Default` otherwise. Energy networks are always `Default`.
    pub fn new(start: BlockPos, kind: ResourceKind, world: &dyn World) -> Self {
        let color = match world.block_at(start) {
            Ok(Some(node)) if kind.is_colored() && node.role.relays() => node.color,
            _ => Color::Default,
        };
        Self {
            start,
            kind,
            main: Walk::main(start, color),
            phase: Phase::Discover,
            seen: HashSet::new(),
            report: ScanReport::empty(start, kind, color),
        }
    }

    pub fn start(&self) -> BlockPos {
        self.start
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// `true` once any walk of this job has looked at `pos`. A change there
    /// is not reflected in the report.
    pub fn has_visited(&self, pos: BlockPos) -> bool {
        let localized = match &self.phase {
            Phase::Localized { walk, .. } => walk.visited.contains(&pos),
            _ => false,
        };
        localized || self.main.visited.contains(&pos) || self.seen.contains(&pos)
    }

    /// Advances by at most `quantum` visited positions (at least one).
    /// After [`ScanProgress::Complete`] has been returned, further calls
    /// return an empty report.
    pub fn step(&mut self, world: &dyn World, quantum: usize) -> ScanProgress {
        let mut budget = quantum.max(1);
        loop {
            match &mut self.phase {
                Phase::Done => {
                    let empty = ScanReport::empty(self.start, self.kind, self.report.color);
                    return ScanProgress::Complete(std::mem::replace(&mut self.report, empty));
                }
                Phase::Discover => {
                    budget -= self.main.advance(world, self.kind, budget);
                    if !self.main.is_done() {
                        return ScanProgress::Pending;
                    }
                    self.finish_discovery(world);
                    self.phase = self.next_localized(0);
                }
                Phase::Localized { index, walk } => {
                    budget -= walk.advance(world, self.kind, budget);
                    if !walk.is_done() {
                        return ScanProgress::Pending;
                    }
                    let index = *index;
                    let generator = self.main.generators[index];
                    let snapshot = NetworkSnapshot::nearest_first(
                        generator,
                        self.kind,
                        walk.color,
                        std::mem::take(&mut walk.targets),
                    );
                    self.report.visited += walk.visited_count;
                    self.seen.extend(walk.visited.drain());
                    self.report.snapshots.insert(generator, snapshot);
                    self.phase = self.next_localized(index + 1);
                }
            }
            if budget == 0 && !self.is_finished() {
                return ScanProgress::Pending;
            }
        }
    }

    fn next_localized(&self, index: usize) -> Phase {
        match self.main.generators.get(index) {
            Some(&generator) => Phase::Localized {
                index,
                walk: Walk::localized(generator, self.main.color),
            },
            None => {
                debug!(
                    start = %self.start,
                    kind = %self.kind,
                    visited = self.report.visited + self.main.visited_count,
                    sources = self.report.snapshots.len(),
                    targets = self.main.targets.len(),
                    "scan complete"
                );
                Phase::Done
            }
        }
    }

    /// Builds exporter snapshots once the main walk is exhausted.
    fn finish_discovery(&mut self, world: &dyn World) {
        let walk = &self.main;
        self.report.visited += walk.visited_count;
        self.report.targets = walk.targets.clone();
        self.report.members = walk.members.clone();
        if walk.members.is_empty() {
            return;
        }

        let mut excluded = HashSet::new();
        for &(_, front) in &walk.exporters {
            excluded.insert(front);
            if let Ok(Some(node)) = world.block_at(front) {
                if let NodeRole::Sink(SinkKind::Port { controller }) = node.role {
                    excluded.insert(controller);
                }
            }
        }

        for &(exporter, _) in &walk.exporters {
            let targets = walk
                .targets
                .iter()
                .copied()
                .filter(|t| *t != exporter && !excluded.contains(t))
                .collect();
            self.report.snapshots.insert(
                exporter,
                NetworkSnapshot::nearest_first(exporter, self.kind, walk.color, targets),
            );
        }
    }
}

/// Runs a full scan in one call.
pub fn rescan(start: BlockPos, kind: ResourceKind, world: &dyn World) -> ScanReport {
    let mut job = ScanJob::new(start, kind, world);
    loop {
        if let ScanProgress::Complete(report) = job.step(world, usize::MAX) {
            return report;
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
