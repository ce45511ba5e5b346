/// Acceptance filter applied to every incoming MIDI event.
/// Stages run in a fixed order (type, channel, control) and the first
/// rejection short-circuits the rest.

use crate::event::MidiEvent;

/// User-selected subset of events. `None` matches anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub channel: Option<u8>,
    pub controller: Option<u8>,
}

impl FilterSpec {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn controller(mut self, controller: u8) -> Self {
        self.controller = Some(controller);
        self
    }
}

/// One stage of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Control change messages only
    MessageType,
    Channel(u8),
    Control(u8),
}

impl Gate {
    pub fn accepts(&self, event: &MidiEvent) -> bool {
        match *self {
            Gate::MessageType => event.is_control_change(),
            Gate::Channel(channel) => event.channel == channel,
            Gate::Control(controller) => event.controller == controller,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    gates: Vec<Gate>,
}

impl FilterChain {
    /// Build the chain. `kind_aware` is false for sources that cannot tell
    /// message kinds apart, in which case the type gate is left out.
    pub fn new(spec: &FilterSpec, kind_aware: bool) -> Self {
        let mut gates = Vec::with_capacity(3);
        if kind_aware {
            gates.push(Gate::MessageType);
        }
        if let Some(channel) = spec.channel {
            gates.push(Gate::Channel(channel));
        }
        if let Some(controller) = spec.controller {
            gates.push(Gate::Control(controller));
        }
        Self { gates }
    }

    pub fn accepts(&self, event: &MidiEvent) -> bool {
        self.gates.iter().all(|gate| gate.accepts(event))
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }
}
