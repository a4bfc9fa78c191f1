//! String-channel messages exchanged with the host's scripting layer.
//!
//! Payloads are free-form text. Receivers parse best-effort and ignore
//! anything malformed.

use std::collections::VecDeque;

/// Well-known channel ids.
pub mod channels {
    pub const SET_TICK_SPEED: &str = "conduit:set_tick_speed";
    /// Payload `"<kind>|[x,y,z]"`.
    pub const UPDATE_PIPES: &str = "conduit:update_pipes";
    pub const REGISTER_FLUID_CONTAINER: &str = "conduit:register_fluid_container";
    pub const REGISTER_FLUID_OUTPUT: &str = "conduit:register_fluid_output";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEvent {
    pub channel: String,
    pub payload: String,
}

impl ScriptEvent {
    pub fn new(channel: &str, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.to_string(),
            payload: payload.into(),
        }
    }
}

/// FIFO of outgoing/incoming script events.
#[derive(Debug, Default)]
pub struct ScriptEventBus {
    queue: VecDeque<ScriptEvent>,
    total_sent: u64,
}

impl ScriptEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, channel: &str, payload: impl Into<String>) {
        self.queue.push_back(ScriptEvent::new(channel, payload));
        self.total_sent += 1;
    }

    /// Takes every queued event in send order.
    pub fn drain(&mut self) -> Vec<ScriptEvent> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn total_sent(&self) -> u64 {
        self.total_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_drain_in_order() {
        let mut bus = ScriptEventBus::new();
        bus.send(channels::SET_TICK_SPEED, "20");
        bus.send(channels::UPDATE_PIPES, "item|[0,0,0]");
        assert_eq!(bus.len(), 2);

        let events = bus.drain();
        assert_eq!(events[0], ScriptEvent::new(channels::SET_TICK_SPEED, "20"));
        assert_eq!(events[1].payload, "item|[0,0,0]");
        assert!(bus.is_empty());
        assert_eq!(bus.total_sent(), 2);
    }
}
