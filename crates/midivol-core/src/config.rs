/// Run configuration for one volume controller.

use std::fmt;

use crate::filter::FilterSpec;
use crate::DEFAULT_MAX_VOLUME;

/// Which MIDI input to open.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// First available input
    #[default]
    Default,
    /// Position in the enumerated device list
    Index(usize),
    /// Exact device name
    Name(String),
}

impl DeviceSelector {
    /// Blank text selects the default device, an unsigned integer an index,
    /// anything else a name. Names are kept verbatim for exact matching.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            DeviceSelector::Default
        } else if let Ok(index) = trimmed.parse::<usize>() {
            DeviceSelector::Index(index)
        } else {
            DeviceSelector::Name(text.to_string())
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Default => f.write_str("<first available>"),
            DeviceSelector::Index(index) => write!(f, "{}", index),
            DeviceSelector::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub device: DeviceSelector,
    /// Volume ceiling, 0-99
    pub max_volume: u8,
    pub filter: FilterSpec,
    /// Log every accepted event
    pub verbose: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device: DeviceSelector::Default,
            max_volume: DEFAULT_MAX_VOLUME,
            filter: FilterSpec::default(),
            verbose: false,
        }
    }
}
