//! Integer block positions, the six faces of a block, and per-face
//! connection flags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BlockPos
// ---------------------------------------------------------------------------

/// A cell of the 3D block grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The adjacent cell on the given face.
    pub fn offset(self, face: Face) -> Self {
        let (dx, dy, dz) = face.offset();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The cell `steps` blocks away along `face`. Negative steps go backwards.
    pub fn offset_by(self, face: Face, steps: i32) -> Self {
        let (dx, dy, dz) = face.offset();
        Self::new(
            self.x + dx * steps,
            self.y + dy * steps,
            self.z + dz * steps,
        )
    }

    /// The six orthogonal neighbours, in [`Face::all`] order.
    pub fn neighbors(self) -> [(Face, BlockPos); 6] {
        Face::all().map(|face| (face, self.offset(face)))
    }

    /// Squared euclidean distance.
    pub fn distance_squared(self, other: BlockPos) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dy * dy + dz * dz
    }

    /// Manhattan distance.
    pub fn manhattan_distance(self, other: BlockPos) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
            .saturating_add(self.z.abs_diff(other.z))
    }

    /// `true` when `other` shares a face with `self` or is `self`.
    pub fn touches(self, other: BlockPos) -> bool {
        self.manhattan_distance(other) <= 1
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

/// Error returned when a `[x,y,z]` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid block position: {0:?}")]
pub struct ParsePosError(pub String);

impl FromStr for BlockPos {
    type Err = ParsePosError;

    /// Parses `[x,y,z]`; the brackets are optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePosError(s.to_string());
        let inner = s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']');
        let mut parts = inner.split(',').map(|p| p.trim().parse::<i32>());
        let x = parts.next().ok_or_else(err)?.map_err(|_| err())?;
        let y = parts.next().ok_or_else(err)?.map_err(|_| err())?;
        let z = parts.next().ok_or_else(err)?.map_err(|_| err())?;
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self::new(x, y, z))
    }
}

// ---------------------------------------------------------------------------
// Face
// ---------------------------------------------------------------------------

/// One of the six faces of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Up,
    Down,
    North,
    South,
    East,
    West,
}

impl Face {
    pub const fn all() -> [Face; 6] {
        [
            Face::Up,
            Face::Down,
            Face::North,
            Face::South,
            Face::East,
            Face::West,
        ]
    }

    /// Unit offset `(dx, dy, dz)`. North is `-z`, east is `+x`.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Face::Up => (0, 1, 0),
            Face::Down => (0, -1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::East => (1, 0, 0),
            Face::West => (-1, 0, 0),
        }
    }

    pub const fn opposite(self) -> Face {
        match self {
            Face::Up => Face::Down,
            Face::Down => Face::Up,
            Face::North => Face::South,
            Face::South => Face::North,
            Face::East => Face::West,
            Face::West => Face::East,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Face::Up => "up",
            Face::Down => "down",
            Face::North => "north",
            Face::South => "south",
            Face::East => "east",
            Face::West => "west",
        }
    }

    /// Bit used by [`Connections`].
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Maps the host's placement face (the face the block was placed
    /// against) to the direction of the block it is attached to.
    pub fn from_block_face(name: &str) -> Option<Face> {
        name.parse::<Face>().ok().map(Face::opposite)
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Face {
    type Err = ParsePosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Face::all()
            .into_iter()
            .find(|face| face.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParsePosError(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// Visual connection flag per face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connections(u8);

impl Connections {
    pub const NONE: Connections = Connections(0);

    pub fn set(&mut self, face: Face, connected: bool) {
        if connected {
            self.0 |= face.bit();
        } else {
            self.0 &= !face.bit();
        }
    }

    pub fn with(mut self, face: Face, connected: bool) -> Self {
        self.set(face, connected);
        self
    }

    pub fn is_connected(self, face: Face) -> bool {
        self.0 & face.bit() != 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Connected faces in [`Face::all`] order.
    pub fn faces(self) -> impl Iterator<Item = Face> {
        Face::all().into_iter().filter(move |f| self.is_connected(*f))
    }
}
