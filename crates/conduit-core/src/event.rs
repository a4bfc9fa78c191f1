//! World events and their delivery.
//!
//! The host pushes [`WorldEvent`]s into an [`EventQueue`]. A single call to
//! [`EventQueue::dispatch`] drains the queue in FIFO order: passive
//! listeners see every event first (lower priorities run first), then the
//! [`WorldObserver`] reacts with mutable access to the world.

use std::collections::VecDeque;

use crate::node::NodeDescriptor;
use crate::pos::{BlockPos, Face};
use crate::world::World;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A change to the block grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    Placed {
        pos: BlockPos,
    },
    /// `previous` is what stood there, when the host still knows it.
    Broken {
        pos: BlockPos,
        previous: Option<NodeDescriptor>,
    },
    /// `positions` are the blocks attached to the piston before the move.
    PistonMoved {
        positions: Vec<BlockPos>,
        direction: Face,
        expanding: bool,
    },
}

impl TopologyEvent {
    /// Every position whose neighbourhood changed.
    pub fn affected(&self) -> Vec<BlockPos> {
        match self {
            TopologyEvent::Placed { pos } | TopologyEvent::Broken { pos, .. } => vec![*pos],
            TopologyEvent::PistonMoved {
                positions,
                direction,
                expanding,
            } => {
                let step = if *expanding { 1 } else { -1 };
                positions
                    .iter()
                    .flat_map(|p| [*p, p.offset_by(*direction, step)])
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    Topology(TopologyEvent),
    Tick(u64),
}

/// Reacts to world events. Implemented by the transfer system.
pub trait WorldObserver {
    fn on_topology_change(&mut self, event: &TopologyEvent, world: &mut dyn World);

    fn on_tick(&mut self, tick: u64, world: &mut dyn World);
}

/// Anything that yields world events in order.
pub trait WorldEventSource {
    fn poll(&mut self) -> Option<WorldEvent>;
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&WorldEvent)>;

/// Priority level for listeners. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct ListenerEntry {
    listener: PassiveListener,
    priority: ListenerPriority,
}

// ---------------------------------------------------------------------------
// EventQueue
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct EventQueue {
    pending: VecDeque<WorldEvent>,
    listeners: Vec<ListenerEntry>,
    total_delivered: u64,
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.pending)
            .field("listeners", &self.listeners.len())
            .field("total_delivered", &self.total_delivered)
            .finish()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: WorldEvent) {
        self.pending.push_back(event);
    }

    pub fn push_topology(&mut self, event: TopologyEvent) {
        self.push(WorldEvent::Topology(event));
    }

    pub fn push_tick(&mut self, tick: u64) {
        self.push(WorldEvent::Tick(tick));
    }

    /// Registers a passive listener. Equal priorities keep insertion order.
    pub fn on_event(&mut self, priority: ListenerPriority, listener: PassiveListener) {
        let at = self.listeners.partition_point(|e| e.priority <= priority);
        self.listeners.insert(at, ListenerEntry { listener, priority });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn total_delivered(&self) -> u64 {
        self.total_delivered
    }

    /// Delivers every pending event, including events pushed by listeners
    /// during delivery. Returns the number delivered.
    pub fn dispatch(&mut self, observer: &mut dyn WorldObserver, world: &mut dyn World) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.poll() {
            for entry in &mut self.listeners {
                (entry.listener)(&event);
            }
            match &event {
                WorldEvent::Topology(change) => observer.on_topology_change(change, world),
                WorldEvent::Tick(tick) => observer.on_tick(*tick, world),
            }
            delivered += 1;
        }
        self.total_delivered += delivered as u64;
        delivered
    }
}

impl WorldEventSource for EventQueue {
    fn poll(&mut self) -> Option<WorldEvent> {
        self.pending.pop_front()
    }
}
