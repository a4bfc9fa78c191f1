use serde::{Deserialize, Serialize};

use crate::node::{Color, ResourceKind};
use crate::pos::BlockPos;

/// The sinks one source can reach for one resource kind, nearest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub kind: ResourceKind,
    pub color: Color,
    pub targets: Vec<BlockPos>,
    /// Round-robin position; survives snapshot replacement.
    #[serde(default)]
    pub cursor: usize,
}

impl NetworkSnapshot {
    pub fn new(kind: ResourceKind, color: Color, targets: Vec<BlockPos>) -> Self {
        Self {
            kind,
            color,
            targets,
            cursor: 0,
        }
    }

    /// Builds a snapshot for `source`, ordering `targets` by squared distance.
    /// The sort is stable so discovery order breaks ties.
    pub fn nearest_first(
        source: BlockPos,
        kind: ResourceKind,
        color: Color,
        mut targets: Vec<BlockPos>,
    ) -> Self {
        targets.sort_by_key(|t| t.distance_squared(source));
        Self::new(kind, color, targets)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.targets.contains(&pos)
    }

    /// Whether any target is at or next to `pos`.
    pub fn touches(&self, pos: BlockPos) -> bool {
        self.targets.iter().any(|t| t.touches(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_first_is_stable() {
        let source = BlockPos::new(0, 0, 0);
        let far = BlockPos::new(5, 0, 0);
        let east = BlockPos::new(1, 0, 0);
        let west = BlockPos::new(-1, 0, 0);
        let snap = NetworkSnapshot::nearest_first(
            source,
            ResourceKind::Item,
            Color::Default,
            vec![far, west, east],
        );
        assert_eq!(snap.targets, vec![west, east, far]);
        assert_eq!(snap.cursor, 0);
    }

    #[test]
    fn touches_neighbours() {
        let snap = NetworkSnapshot::new(
            ResourceKind::Fluid,
            Color::Red,
            vec![BlockPos::new(4, 4, 4)],
        );
        assert!(snap.touches(BlockPos::new(4, 5, 4)));
        assert!(!snap.touches(BlockPos::new(5, 5, 4)));
        assert!(snap.contains(BlockPos::new(4, 4, 4)));
    }
}
