//! Conduit Core -- shared model for block-grid transfer networks.
//!
//! Exporters, extractors and generators push items, fluid and energy
//! through coloured pipe networks into containers, tanks and machines. This
//! crate holds everything the network crates share: positions and faces,
//! the typed node model that replaces host tags, filters, container traits,
//! the host ports ([`world::World`], [`store::KvStore`]) with an in-memory
//! implementation, and the event and script buses.
//!
//! # Key Types
//!
//! - [`pos::BlockPos`] / [`pos::Face`] -- grid cells and the six directions.
//! - [`node::NodeDescriptor`] -- role, kinds, colour and facing of a block.
//! - [`world::World`] -- host port; [`grid::GridWorld`] implements it in memory.
//! - [`store::SnapshotStore`] -- typed persistence over any [`store::KvStore`].
//! - [`snapshot::NetworkSnapshot`] -- cached sink list of one source.
//! - [`event::EventQueue`] -- FIFO of world events delivered to a
//!   [`event::WorldObserver`].
//! - [`tick::TickRate`] -- admin-controlled pass frequency.

pub mod config;
pub mod energy;
pub mod event;
pub mod filter;
pub mod fluid;
pub mod grid;
pub mod id;
pub mod item;
pub mod node;
pub mod pos;
pub mod registry;
pub mod script;
pub mod snapshot;
pub mod store;
pub mod tick;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
