/// Optional TOML configuration file. Every key is optional; command line
/// flags take precedence over anything set here.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use midivol_device::MixerOptions;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub midi: MidiSection,
    pub volume: VolumeSection,
    pub mixer: MixerSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MidiSection {
    /// Device name or index
    pub device: Option<String>,
    pub channel: Option<u8>,
    pub control: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VolumeSection {
    pub max: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MixerSection {
    pub card: Option<String>,
    pub control: Option<String>,
    /// Path to nircmd / osascript
    pub command: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub verbose: bool,
    /// Service-mode log directory
    pub dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn mixer_options(&self) -> MixerOptions {
        let defaults = MixerOptions::default();
        MixerOptions {
            card: self.mixer.card.clone().unwrap_or(defaults.card),
            control: self.mixer.control.clone().unwrap_or(defaults.control),
            command: self.mixer.command.clone(),
        }
    }
}
