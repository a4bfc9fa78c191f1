//! Typed description of a block as seen by the transfer network.
//!
//! A [`NodeDescriptor`] is derived from host state every time a block is
//! inspected and is never persisted. It replaces the string tags the host
//! attaches to blocks (`dorios:item`, `color.red`, ...) with enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::BlockTypeId;
use crate::pos::{BlockPos, Face};

// ---------------------------------------------------------------------------
// Resource kinds
// ---------------------------------------------------------------------------

/// The three things a network can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Energy,
    Item,
    Fluid,
}

impl ResourceKind {
    pub const fn all() -> [ResourceKind; 3] {
        [ResourceKind::Energy, ResourceKind::Item, ResourceKind::Fluid]
    }

    pub const fn name(self) -> &'static str {
        match self {
            ResourceKind::Energy => "energy",
            ResourceKind::Item => "item",
            ResourceKind::Fluid => "fluid",
        }
    }

    /// Energy cables ignore colour; item and fluid networks split on it.
    pub const fn is_colored(self) -> bool {
        !matches!(self, ResourceKind::Energy)
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for unknown kind or colour names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what}: {name:?}")]
pub struct ParseNodeError {
    pub what: &'static str,
    pub name: String,
}

impl FromStr for ResourceKind {
    type Err = ParseNodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::all()
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseNodeError {
                what: "resource kind",
                name: s.to_string(),
            })
    }
}

/// Small set of [`ResourceKind`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindSet(u8);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);
    pub const ALL: KindSet = KindSet(0b111);

    pub const fn only(kind: ResourceKind) -> Self {
        KindSet(kind.bit())
    }

    pub const fn with(self, kind: ResourceKind) -> Self {
        KindSet(self.0 | kind.bit())
    }

    pub const fn contains(self, kind: ResourceKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn union(self, other: KindSet) -> Self {
        KindSet(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = ResourceKind> {
        ResourceKind::all().into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<ResourceKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = ResourceKind>>(iter: I) -> Self {
        iter.into_iter().fold(KindSet::EMPTY, KindSet::with)
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// Network colour. Relaying nodes only join networks of their own colour;
/// `Default` is a colour of its own, not a wildcard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Default,
    Green,
    Blue,
    Yellow,
    Red,
}

impl Color {
    pub const fn all() -> [Color; 5] {
        [
            Color::Default,
            Color::Green,
            Color::Blue,
            Color::Yellow,
            Color::Red,
        ]
    }

    pub const fn name(self) -> &'static str {
        match self {
            Color::Default => "default",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Yellow => "yellow",
            Color::Red => "red",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color {
    type Err = ParseNodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::all()
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseNodeError {
                what: "color",
                name: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Pipe segment that pulls from the block in front of it.
    Exporter,
    /// Energy-producing machine with its own localized network.
    Generator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SinkKind {
    Container,
    Drawer,
    Machine,
    Tank,
    /// Multiblock port; transfers go to the controller.
    Port { controller: BlockPos },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    Conduit,
    Source(SourceKind),
    Sink(SinkKind),
    /// Importer: relays except through its front face and proxies the
    /// container in front of it.
    Filtered,
}

impl NodeRole {
    /// Whether a scan continues through this node.
    pub fn relays(self) -> bool {
        matches!(
            self,
            NodeRole::Conduit | NodeRole::Source(SourceKind::Exporter) | NodeRole::Filtered
        )
    }

    pub fn is_source(self) -> bool {
        matches!(self, NodeRole::Source(_))
    }
}

// ---------------------------------------------------------------------------
// NodeDescriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub block_type: BlockTypeId,
    pub role: NodeRole,
    pub kinds: KindSet,
    pub color: Color,
    /// Front face for exporters and importers.
    pub facing: Option<Face>,
    pub filter_upgrade: bool,
}

impl NodeDescriptor {
    pub fn new(role: NodeRole, kinds: KindSet) -> Self {
        Self {
            block_type: BlockTypeId::default(),
            role,
            kinds,
            color: Color::Default,
            facing: None,
            filter_upgrade: false,
        }
    }

    pub fn conduit(kind: ResourceKind, color: Color) -> Self {
        Self::new(NodeRole::Conduit, KindSet::only(kind)).with_color(color)
    }

    pub fn exporter(kind: ResourceKind, color: Color, facing: Face) -> Self {
        Self::new(NodeRole::Source(SourceKind::Exporter), KindSet::only(kind))
            .with_color(color)
            .with_facing(facing)
    }

    pub fn importer(color: Color, facing: Face) -> Self {
        Self::new(NodeRole::Filtered, KindSet::only(ResourceKind::Item))
            .with_color(color)
            .with_facing(facing)
    }

    pub fn generator() -> Self {
        Self::new(
            NodeRole::Source(SourceKind::Generator),
            KindSet::only(ResourceKind::Energy),
        )
    }

    pub fn sink(sink: SinkKind, kinds: KindSet) -> Self {
        Self::new(NodeRole::Sink(sink), kinds)
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_facing(mut self, facing: Face) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn with_block_type(mut self, block_type: BlockTypeId) -> Self {
        self.block_type = block_type;
        self
    }

    pub fn with_filter_upgrade(mut self) -> Self {
        self.filter_upgrade = true;
        self
    }

    pub fn carries(&self, kind: ResourceKind) -> bool {
        self.kinds.contains(kind)
    }

    /// The position in front of a directional node at `pos`.
    pub fn front(&self, pos: BlockPos) -> Option<BlockPos> {
        self.facing.map(|face| pos.offset(face))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_set_membership() {
        let set = KindSet::only(ResourceKind::Item).with(ResourceKind::Fluid);
        assert!(set.contains(ResourceKind::Item));
        assert!(set.contains(ResourceKind::Fluid));
        assert!(!set.contains(ResourceKind::Energy));
        assert_eq!(set.iter().count(), 2);
        assert_eq!(KindSet::ALL.iter().count(), 3);
        assert!(KindSet::EMPTY.is_empty());
    }

    #[test]
    fn kind_set_from_iter() {
        let set: KindSet = [ResourceKind::Energy, ResourceKind::Energy].into_iter().collect();
        assert_eq!(set, KindSet::only(ResourceKind::Energy));
    }

    #[test]
    fn relaying_roles() {
        assert!(NodeRole::Conduit.relays());
        assert!(NodeRole::Filtered.relays());
        assert!(NodeRole::Source(SourceKind::Exporter).relays());
        assert!(!NodeRole::Source(SourceKind::Generator).relays());
        assert!(!NodeRole::Sink(SinkKind::Container).relays());
    }

    #[test]
    fn names_parse_back() {
        for color in Color::all() {
            assert_eq!(color.name().parse::<Color>(), Ok(color));
        }
        for kind in ResourceKind::all() {
            assert_eq!(kind.to_string().parse::<ResourceKind>(), Ok(kind));
        }
        assert!("purple".parse::<Color>().is_err());
    }

    #[test]
    fn front_follows_facing() {
        let pos = BlockPos::new(0, 0, 0);
        let exporter = NodeDescriptor::exporter(ResourceKind::Item, Color::Default, Face::East);
        assert_eq!(exporter.front(pos), Some(BlockPos::new(1, 0, 0)));
        assert_eq!(NodeDescriptor::conduit(ResourceKind::Item, Color::Red).front(pos), None);
    }
}
