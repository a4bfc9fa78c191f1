use serde::{Deserialize, Serialize};

use crate::tick::TickRate;

/// Tunables for the whole transfer system. Every field has a default, so a
/// config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub tick_rate: TickRate,
    /// Items one exporter may move per pass.
    pub item_budget: u32,
    /// Millibuckets one extractor may move per pass.
    pub fluid_budget: u64,
    /// Energy one generator may push per pass.
    pub energy_budget: u64,
    /// Positions a pending scan visits per tick before yielding.
    pub scan_quantum: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tick_rate: TickRate::default(),
            item_budget: 64,
            fluid_budget: 4000,
            energy_budget: 1000,
            scan_quantum: 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: NetworkConfig = serde_json::from_str(r#"{"item_budget": 8}"#).unwrap();
        assert_eq!(cfg.item_budget, 8);
        assert_eq!(cfg.fluid_budget, 4000);
        assert_eq!(cfg.scan_quantum, 25);
        assert_eq!(cfg.tick_rate, TickRate::Low);
    }
}
