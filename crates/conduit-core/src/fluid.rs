//! Fluid tanks and fluid-bearing blocks.
//!
//! Amounts are in millibuckets (mB). A tank holds one fluid type at a time;
//! it forgets its type when drained to zero.

use serde::{Deserialize, Serialize};

use crate::id::ResourceTypeId;

/// Amount held by a full vanilla source block.
pub const BUCKET: u64 = 1000;
/// Amount per crucible level.
pub const CRUCIBLE_LEVEL: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidTank {
    pub fluid: Option<ResourceTypeId>,
    pub amount: u64,
    pub capacity: u64,
}

impl FluidTank {
    pub fn new(capacity: u64) -> Self {
        Self {
            fluid: None,
            amount: 0,
            capacity,
        }
    }

    pub fn filled(fluid: ResourceTypeId, amount: u64, capacity: u64) -> Self {
        Self {
            fluid: (amount > 0).then_some(fluid),
            amount: amount.min(capacity),
            capacity,
        }
    }

    /// Empty tanks accept anything; others only their own fluid.
    pub fn accepts(&self, fluid: ResourceTypeId) -> bool {
        self.fluid.is_none_or(|f| f == fluid)
    }

    pub fn free(&self) -> u64 {
        self.capacity.saturating_sub(self.amount)
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }

    /// Returns the amount accepted.
    pub fn fill(&mut self, fluid: ResourceTypeId, amount: u64) -> u64 {
        if !self.accepts(fluid) {
            return 0;
        }
        let accepted = amount.min(self.free());
        if accepted > 0 {
            self.fluid = Some(fluid);
            self.amount += accepted;
        }
        accepted
    }

    /// Returns the amount drained.
    pub fn drain(&mut self, amount: u64) -> u64 {
        let drained = amount.min(self.amount);
        self.amount -= drained;
        if self.amount == 0 {
            self.fluid = None;
        }
        drained
    }
}

/// Tank-addressed fluid storage as exposed by the host.
pub trait FluidContainer {
    fn tank_count(&self) -> usize;

    fn tank(&self, index: usize) -> Option<&FluidTank>;

    fn tank_mut(&mut self, index: usize) -> Option<&mut FluidTank>;

    /// Index of the first tank that can take `fluid` and has room: tanks
    /// already holding it are preferred over empty ones.
    fn tank_for(&self, fluid: ResourceTypeId) -> Option<usize> {
        let open = |i: &usize| self.tank(*i).is_some_and(|t| t.accepts(fluid) && t.free() > 0);
        let same = (0..self.tank_count())
            .filter(open)
            .find(|i| self.tank(*i).is_some_and(|t| t.fluid == Some(fluid)));
        same.or_else(|| (0..self.tank_count()).find(open))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidStorage {
    pub tanks: Vec<FluidTank>,
}

impl FluidStorage {
    pub fn new(tank_count: usize, capacity: u64) -> Self {
        Self {
            tanks: (0..tank_count).map(|_| FluidTank::new(capacity)).collect(),
        }
    }

    pub fn with_tank(mut self, tank: FluidTank) -> Self {
        self.tanks.push(tank);
        self
    }

    pub fn amount_of(&self, fluid: ResourceTypeId) -> u64 {
        self.tanks
            .iter()
            .filter(|t| t.fluid == Some(fluid))
            .map(|t| t.amount)
            .sum()
    }
}

impl FluidContainer for FluidStorage {
    fn tank_count(&self) -> usize {
        self.tanks.len()
    }

    fn tank(&self, index: usize) -> Option<&FluidTank> {
        self.tanks.get(index)
    }

    fn tank_mut(&mut self, index: usize) -> Option<&mut FluidTank> {
        self.tanks.get_mut(index)
    }
}

// ---------------------------------------------------------------------------
// Fluid blocks
// ---------------------------------------------------------------------------

/// A block that yields fluid without having tanks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FluidBlock {
    /// Vanilla liquid. Only full source blocks (`depth == 0`) yield.
    Liquid { fluid: ResourceTypeId, depth: u8 },
    Crucible { fluid: ResourceTypeId, level: u8 },
    /// Never runs dry.
    Sink { fluid: ResourceTypeId },
}

impl FluidBlock {
    pub fn fluid(&self) -> ResourceTypeId {
        match *self {
            FluidBlock::Liquid { fluid, .. }
            | FluidBlock::Crucible { fluid, .. }
            | FluidBlock::Sink { fluid } => fluid,
        }
    }

    /// Amount that can be pulled this tick. `u64::MAX` for infinite blocks.
    pub fn available(&self) -> u64 {
        match *self {
            FluidBlock::Liquid { depth: 0, .. } => BUCKET,
            FluidBlock::Liquid { .. } => 0,
            FluidBlock::Crucible { level, .. } => CRUCIBLE_LEVEL * u64::from(level),
            FluidBlock::Sink { .. } => u64::MAX,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, FluidBlock::Sink { .. })
    }
}
