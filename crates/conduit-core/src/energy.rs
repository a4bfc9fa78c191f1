use serde::{Deserialize, Serialize};

/// Energy storage as exposed by the host.
pub trait EnergyContainer {
    fn stored(&self) -> u64;

    fn capacity(&self) -> u64;

    /// Returns the amount accepted.
    fn insert(&mut self, amount: u64) -> u64;

    /// Returns the amount removed.
    fn extract(&mut self, amount: u64) -> u64;

    fn free(&self) -> u64 {
        self.capacity().saturating_sub(self.stored())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyBuffer {
    pub stored: u64,
    pub capacity: u64,
}

impl EnergyBuffer {
    pub fn new(capacity: u64) -> Self {
        Self {
            stored: 0,
            capacity,
        }
    }

    pub fn charged(stored: u64, capacity: u64) -> Self {
        Self {
            stored: stored.min(capacity),
            capacity,
        }
    }
}

impl EnergyContainer for EnergyBuffer {
    fn stored(&self) -> u64 {
        self.stored
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn insert(&mut self, amount: u64) -> u64 {
        let accepted = amount.min(self.free());
        self.stored += accepted;
        accepted
    }

    fn extract(&mut self, amount: u64) -> u64 {
        let removed = amount.min(self.stored);
        self.stored -= removed;
        removed
    }
}
