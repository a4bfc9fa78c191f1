//! Face-connection flags used to render pipes.
//!
//! A relaying node connects on a face when the neighbour there carries the
//! same resource kind and either does not relay (container, machine, tank,
//! generator) or relays with the same colour. Energy cables join across
//! colours.

use conduit_core::node::ResourceKind;
use conduit_core::pos::{BlockPos, Connections};
use conduit_core::world::World;
use tracing::debug;

/// Computes the flags for the node at `pos`. `None` when `pos` does not
/// hold a relaying node of `kind`.
pub fn connections_for(world: &dyn World, pos: BlockPos, kind: ResourceKind) -> Option<Connections> {
    let node = match world.block_at(pos) {
        Ok(Some(node)) if node.carries(kind) && node.role.relays() => node,
        _ => return None,
    };
    let mut connections = Connections::NONE;
    for (face, neighbor) in pos.neighbors() {
        let connected = match world.block_at(neighbor) {
            Ok(Some(other)) if other.carries(kind) => {
                !other.role.relays() || !kind.is_colored() || other.color == node.color
            }
            _ => false,
        };
        connections.set(face, connected);
    }
    Some(connections)
}

/// Recomputes and stores the flags for `pos`, writing only on change.
/// Returns the flags now in effect.
pub fn refresh(world: &mut dyn World, pos: BlockPos, kind: ResourceKind) -> Option<Connections> {
    let connections = connections_for(world, pos, kind)?;
    let current = world.connections(pos, kind).ok();
    if current != Some(connections) {
        if let Err(err) = world.set_connections(pos, kind, connections) {
            debug!(%pos, %kind, %err, "could not store pipe geometry");
        }
    }
    Some(connections)
}

/// Refreshes `pos` and its six neighbours.
pub fn refresh_around(world: &mut dyn World, pos: BlockPos, kind: ResourceKind) -> usize {
    std::iter::once(pos)
        .chain(pos.neighbors().map(|(_, p)| p))
        .filter(|p| refresh(world, *p, kind).is_some())
        .count()
}
