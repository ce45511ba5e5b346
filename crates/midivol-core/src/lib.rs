pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod event_loop;
pub mod filter;
pub mod mapper;
pub mod mixer;
pub mod session;
pub mod source;

pub use config::{ControllerConfig, DeviceSelector};
pub use controller::VolumeController;
pub use error::{Error, Result};
pub use event::{MessageKind, MidiEvent, MidiParser};
pub use event_loop::{EventLoop, LoopExit, StopHandle};
pub use filter::{FilterChain, FilterSpec};
pub use mixer::{MixerBackend, MixerSink};
pub use session::Session;
pub use source::{Delivery, DeviceInfo, EventSource, MidiBackend, Next};

/// Highest volume level the mapper can produce
pub const MAX_VOLUME_LEVEL: u8 = 99;

/// Default volume ceiling
pub const DEFAULT_MAX_VOLUME: u8 = 30;

/// Highest MIDI data byte value
pub const MAX_MIDI_VALUE: u8 = 127;

/// Number of MIDI channels
pub const NUM_CHANNELS: u8 = 16;

/// Poll-based sources sleep this long between iterations
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5;
