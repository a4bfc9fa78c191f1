//! Order in which a source tries its targets.

use std::fmt;
use std::str::FromStr;

use conduit_core::pos::BlockPos;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionPolicy {
    /// Snapshot order, which is nearest first.
    #[default]
    Nearest,
    Farthest,
    /// Rotated by a cursor that advances after each successful pass.
    #[serde(rename = "round")]
    RoundRobin,
}

impl DistributionPolicy {
    pub const fn name(self) -> &'static str {
        match self {
            DistributionPolicy::Nearest => "nearest",
            DistributionPolicy::Farthest => "farthest",
            DistributionPolicy::RoundRobin => "round",
        }
    }
}

impl fmt::Display for DistributionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transfer mode {0:?}")]
pub struct ParsePolicyError(pub String);

impl FromStr for DistributionPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(DistributionPolicy::Nearest),
            "farthest" => Ok(DistributionPolicy::Farthest),
            "round" | "round_robin" | "roundrobin" => Ok(DistributionPolicy::RoundRobin),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// Targets in the order to try them, plus the cursor the rotation used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordered {
    pub targets: Vec<BlockPos>,
    pub cursor: usize,
}

/// Orders `targets` (stored nearest first). An empty list leaves the cursor
/// untouched.
pub fn order(targets: &[BlockPos], policy: DistributionPolicy, cursor: usize) -> Ordered {
    if targets.is_empty() {
        return Ordered {
            targets: Vec::new(),
            cursor,
        };
    }
    match policy {
        DistributionPolicy::Nearest => Ordered {
            targets: targets.to_vec(),
            cursor,
        },
        DistributionPolicy::Farthest => Ordered {
            targets: targets.iter().rev().copied().collect(),
            cursor,
        },
        DistributionPolicy::RoundRobin => {
            let cursor = cursor % targets.len();
            let mut rotated = targets.to_vec();
            rotated.rotate_left(cursor);
            Ordered {
                targets: rotated,
                cursor,
            }
        }
    }
}

/// The cursor after one successful pass over `len` targets.
pub fn advance(cursor: usize, len: usize) -> usize {
    if len == 0 { cursor } else { (cursor + 1) % len }
}
