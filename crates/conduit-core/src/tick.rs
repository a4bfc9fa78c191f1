//! How often the network runs, in game ticks between transfer passes.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::script::{ScriptEventBus, channels};

/// Rates at or below this many ticks are flagged as heavy.
pub const AGGRESSIVE_THRESHOLD: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TickRate {
    Lowest,
    #[default]
    Low,
    Normal,
    Fast,
    Fastest,
    /// Always even and non-zero; build it with [`TickRate::custom`].
    Custom(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickRateError {
    #[error("tick rate must be at least 2 ticks, got {0}")]
    TooSmall(u32),
    #[error("unknown tick speed mode {0:?}")]
    UnknownMode(String),
    #[error("custom tick speed needs a value")]
    MissingValue,
}

impl TickRate {
    pub const fn presets() -> [TickRate; 5] {
        [
            TickRate::Lowest,
            TickRate::Low,
            TickRate::Normal,
            TickRate::Fast,
            TickRate::Fastest,
        ]
    }

    /// Rounds down to an even number of ticks.
    pub fn custom(ticks: u32) -> Result<Self, TickRateError> {
        let even = ticks / 2 * 2;
        if even == 0 {
            return Err(TickRateError::TooSmall(ticks));
        }
        Ok(TickRate::presets()
            .into_iter()
            .find(|p| p.ticks() == even)
            .unwrap_or(TickRate::Custom(even)))
    }

    /// Parses an admin command: a preset name, or `custom` plus a value.
    pub fn from_mode(mode: &str, value: Option<u32>) -> Result<Self, TickRateError> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "lowest" => Ok(TickRate::Lowest),
            "low" => Ok(TickRate::Low),
            "normal" => Ok(TickRate::Normal),
            "fast" => Ok(TickRate::Fast),
            "fastest" => Ok(TickRate::Fastest),
            "custom" => TickRate::custom(value.ok_or(TickRateError::MissingValue)?),
            other => Err(TickRateError::UnknownMode(other.to_string())),
        }
    }

    pub const fn ticks(self) -> u32 {
        match self {
            TickRate::Lowest => 40,
            TickRate::Low => 20,
            TickRate::Normal => 10,
            TickRate::Fast => 4,
            TickRate::Fastest => 2,
            TickRate::Custom(n) => n,
        }
    }

    pub fn is_aggressive(self) -> bool {
        self.ticks() <= AGGRESSIVE_THRESHOLD
    }

    /// Whether transfers run on `tick`.
    pub fn is_due(self, tick: u64) -> bool {
        tick % u64::from(self.ticks().max(1)) == 0
    }

    /// Broadcasts the rate to the host.
    pub fn apply(self, bus: &mut ScriptEventBus) {
        bus.send(channels::SET_TICK_SPEED, self.ticks().to_string());
        info!(ticks = self.ticks(), rate = %self, "tick speed changed");
        if self.is_aggressive() {
            warn!(ticks = self.ticks(), "very fast tick speed may cause lag");
        }
    }
}

impl fmt::Display for TickRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickRate::Lowest => f.write_str("lowest"),
            TickRate::Low => f.write_str("low"),
            TickRate::Normal => f.write_str("normal"),
            TickRate::Fast => f.write_str("fast"),
            TickRate::Fastest => f.write_str("fastest"),
            TickRate::Custom(n) => write!(f, "custom({n})"),
        }
    }
}

impl TryFrom<u32> for TickRate {
    type Error = TickRateError;

    fn try_from(ticks: u32) -> Result<Self, Self::Error> {
        TickRate::custom(ticks)
    }
}

impl From<TickRate> for u32 {
    fn from(rate: TickRate) -> u32 {
        rate.ticks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_ticks() {
        let ticks: Vec<u32> = TickRate::presets().iter().map(|r| r.ticks()).collect();
        assert_eq!(ticks, vec![40, 20, 10, 4, 2]);
        assert_eq!(TickRate::default().ticks(), 20);
    }

    #[test]
    fn custom_rounds_down_to_even() {
        assert_eq!(TickRate::custom(7), Ok(TickRate::Custom(6)));
        assert_eq!(TickRate::custom(3), Ok(TickRate::Fastest));
        assert_eq!(TickRate::custom(20), Ok(TickRate::Low));
        assert_eq!(TickRate::custom(1), Err(TickRateError::TooSmall(1)));
        assert_eq!(TickRate::custom(0), Err(TickRateError::TooSmall(0)));
    }

    #[test]
    fn from_mode_parses_commands() {
        assert_eq!(TickRate::from_mode("Fast", None), Ok(TickRate::Fast));
        assert_eq!(TickRate::from_mode("custom", Some(15)), Ok(TickRate::Custom(14)));
        assert_eq!(TickRate::from_mode("custom", None), Err(TickRateError::MissingValue));
        assert!(matches!(
            TickRate::from_mode("ludicrous", None),
            Err(TickRateError::UnknownMode(_))
        ));
    }

    #[test]
    fn apply_broadcasts() {
        let mut bus = ScriptEventBus::new();
        TickRate::Normal.apply(&mut bus);
        let events = bus.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].channel, channels::SET_TICK_SPEED);
        assert_eq!(events[0].payload, "10");
    }

    #[test]
    fn due_ticks() {
        assert!(TickRate::Normal.is_due(0));
        assert!(!TickRate::Normal.is_due(5));
        assert!(TickRate::Normal.is_due(30));
        assert!(TickRate::Fastest.is_aggressive());
        assert!(!TickRate::Normal.is_aggressive());
    }

    #[test]
    fn serde_as_plain_number() {
        let json = serde_json::to_string(&TickRate::Fast).unwrap();
        assert_eq!(json, "4");
        let back: TickRate = serde_json::from_str("12").unwrap();
        assert_eq!(back, TickRate::Custom(12));
        assert!(serde_json::from_str::<TickRate>("1").is_err());
    }
}
