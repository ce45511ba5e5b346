/// Platform adapters for midivol: MIDI input backends and system mixers.
///
/// Linux reads raw MIDI through ALSA and drives the ALSA simple mixer.
/// Other platforms read MIDI through midir and set the volume with an
/// external command (nircmd on Windows, osascript on macOS).

pub mod platform;

use midivol_core::{MidiBackend, MixerBackend, Result};

/// Which mixer control the volume is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerOptions {
    /// ALSA card name
    pub card: String,
    /// ALSA simple mixer control
    pub control: String,
    /// Override for the external volume command (nircmd / osascript)
    pub command: Option<String>,
}

impl Default for MixerOptions {
    fn default() -> Self {
        Self {
            card: "default".to_string(),
            control: "Master".to_string(),
            command: None,
        }
    }
}

/// Create the platform MIDI input backend.
pub fn create_midi_backend() -> Box<dyn MidiBackend> {
    #[cfg(target_os = "linux")]
    {
        Box::new(platform::linux::AlsaMidi::new())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Box::new(platform::midir_input::MidirMidi::new())
    }
}

/// Create the platform mixer. Fails when the mixer cannot be reached.
pub fn create_mixer_backend(options: &MixerOptions) -> Result<Box<dyn MixerBackend>> {
    #[cfg(target_os = "linux")]
    {
        let mixer = platform::linux::AlsaMixer::open(&options.card, &options.control)?;
        Ok(Box::new(mixer))
    }

    #[cfg(target_os = "windows")]
    {
        let mut mixer = platform::command::CommandMixer::nircmd();
        if let Some(program) = &options.command {
            mixer = mixer.with_program(program);
        }
        Ok(Box::new(mixer))
    }

    #[cfg(target_os = "macos")]
    {
        let mut mixer = platform::command::CommandMixer::osascript();
        if let Some(program) = &options.command {
            mixer = mixer.with_program(program);
        }
        Ok(Box::new(mixer))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = options;
        Ok(Box::new(UnsupportedMixer))
    }
}

/// Mixer for platforms without a volume backend. Every write fails.
pub struct UnsupportedMixer;

impl MixerBackend for UnsupportedMixer {
    fn name(&self) -> &str {
        "unsupported"
    }

    fn get_level(&mut self) -> Result<u8> {
        tracing::warn!("System volume control not supported on this platform");
        Ok(0)
    }

    fn set_level(&mut self, _level: u8) -> Result<()> {
        Err(midivol_core::Error::mixer("no volume backend for this platform"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mixer_options() {
        let options = MixerOptions::default();
        assert_eq!(options.card, "default");
        assert_eq!(options.control, "Master");
        assert!(options.command.is_none());
    }

    #[test]
    fn test_unsupported_mixer_rejects_writes() {
        let mut mixer = UnsupportedMixer;
        assert_eq!(mixer.get_level().unwrap(), 0);
        let err = mixer.set_level(10).unwrap_err();
        assert!(matches!(err, midivol_core::Error::MixerUnavailable(_)));
    }
}
