/// Command line surface and the merge of flags, config file and defaults.
///
/// Numeric flags are taken as text so a bad value can be reported and
/// skipped instead of aborting the whole run. A value flag followed by
/// another flag, or by nothing, gets an empty value; only negative numbers
/// may start with a hyphen, so `-m -v` still turns on verbose.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

use midivol_core::{
    ControllerConfig, DeviceSelector, Error, FilterSpec, DEFAULT_MAX_VOLUME, MAX_MIDI_VALUE,
    MAX_VOLUME_LEVEL, NUM_CHANNELS,
};
use midivol_device::MixerOptions;

use crate::config::FileConfig;

#[derive(Parser, Debug)]
#[command(
    name = "midivol",
    version,
    about = "Control the system master volume with MIDI control change messages"
)]
pub struct Args {
    /// MIDI device name or index (default: first available input)
    #[arg(
        short = 'n',
        long = "device",
        visible_short_alias = 'd',
        value_name = "DEVICE",
        num_args = 0..=1,
        default_missing_value = ""
    )]
    pub device: Option<String>,

    /// List available MIDI devices and exit
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// MIDI channel to listen to, 0-15 (default: all; also -ch)
    #[arg(
        long = "channel",
        value_name = "CH",
        num_args = 0..=1,
        default_missing_value = "",
        allow_negative_numbers = true
    )]
    pub channel: Option<String>,

    /// MIDI control id to process, 0-127 (default: all; also -ct)
    #[arg(
        long = "control",
        value_name = "CT",
        num_args = 0..=1,
        default_missing_value = "",
        allow_negative_numbers = true
    )]
    pub control: Option<String>,

    /// Max volume threshold, 0-99 (default: 30)
    #[arg(
        short = 'm',
        long = "max-volume",
        value_name = "MAX",
        num_args = 0..=1,
        default_missing_value = "",
        allow_negative_numbers = true
    )]
    pub max_volume: Option<String>,

    /// Log every accepted MIDI message
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// TOML file with default settings
    #[arg(short = 'c', long = "config", env = "MIDIVOL_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run under the background service host
    #[arg(long = "service")]
    pub service: bool,
}

/// Rewrite the two-letter legacy flags to their long forms.
pub fn normalize_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some("-ch") => OsString::from("--channel"),
            Some("-ct") => OsString::from("--control"),
            _ => arg,
        })
        .collect()
}

/// Everything a run needs after flags and config file are merged.
#[derive(Debug, Clone)]
pub struct Settings {
    pub controller: ControllerConfig,
    pub mixer: MixerOptions,
}

/// Merge flags over the config file over defaults. Invalid values are
/// logged and skipped.
pub fn resolve(args: &Args, file: &FileConfig) -> Settings {
    let channel = args
        .channel
        .as_deref()
        .and_then(|raw| parse_bounded("-ch", raw, NUM_CHANNELS - 1))
        .or_else(|| checked("midi.channel", file.midi.channel, NUM_CHANNELS - 1));
    let controller = args
        .control
        .as_deref()
        .and_then(|raw| parse_bounded("-ct", raw, MAX_MIDI_VALUE))
        .or_else(|| checked("midi.control", file.midi.control, MAX_MIDI_VALUE));
    let max_volume = args
        .max_volume
        .as_deref()
        .and_then(|raw| parse_bounded("-m", raw, MAX_VOLUME_LEVEL))
        .or_else(|| checked("volume.max", file.volume.max, MAX_VOLUME_LEVEL))
        .unwrap_or(DEFAULT_MAX_VOLUME);

    let device = args
        .device
        .as_deref()
        .or(file.midi.device.as_deref())
        .map_or(DeviceSelector::Default, DeviceSelector::parse);

    Settings {
        controller: ControllerConfig {
            device,
            max_volume,
            filter: FilterSpec {
                channel,
                controller,
            },
            verbose: args.verbose || file.log.verbose,
        },
        mixer: file.mixer_options(),
    }
}

fn parse_bounded(flag: &str, raw: &str, max: u8) -> Option<u8> {
    match raw.trim().parse::<u8>() {
        Ok(value) if value <= max => Some(value),
        _ => {
            let err = Error::InvalidArgument {
                flag: flag.to_string(),
                value: raw.to_string(),
            };
            warn!("{}", err);
            None
        }
    }
}

fn checked(key: &str, value: Option<u8>, max: u8) -> Option<u8> {
    let value = value?;
    if value <= max {
        return Some(value);
    }
    let err = Error::InvalidArgument {
        flag: key.to_string(),
        value: value.to_string(),
    };
    warn!("{}", err);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["midivol"];
        full.extend_from_slice(argv);
        Args::try_parse_from(normalize_args(full)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = resolve(&parse(&[]), &FileConfig::default());
        assert_eq!(settings.controller.device, DeviceSelector::Default);
        assert_eq!(settings.controller.max_volume, 30);
        assert_eq!(settings.controller.filter, FilterSpec::any());
        assert!(!settings.controller.verbose);
        assert_eq!(settings.mixer, MixerOptions::default());
    }

    #[test]
    fn test_legacy_two_letter_flags() {
        let args = parse(&["-ch", "3", "-ct", "7", "-m", "80", "-v"]);
        let settings = resolve(&args, &FileConfig::default());
        assert_eq!(settings.controller.filter.channel, Some(3));
        assert_eq!(settings.controller.filter.controller, Some(7));
        assert_eq!(settings.controller.max_volume, 80);
        assert!(settings.controller.verbose);
    }

    #[test]
    fn test_device_aliases() {
        let by_n = resolve(&parse(&["-n", "2"]), &FileConfig::default());
        assert_eq!(by_n.controller.device, DeviceSelector::Index(2));
        let by_d = resolve(&parse(&["-d", "Launch Control"]), &FileConfig::default());
        assert_eq!(
            by_d.controller.device,
            DeviceSelector::Name("Launch Control".to_string())
        );
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let args = parse(&["-m", "abc", "-ch", "16", "-ct", "-1"]);
        let settings = resolve(&args, &FileConfig::default());
        assert_eq!(settings.controller.max_volume, 30);
        assert_eq!(settings.controller.filter, FilterSpec::any());
    }

    #[test]
    fn test_value_flag_does_not_swallow_next_flag() {
        let args = parse(&["-ch", "3", "-m", "-v"]);
        assert!(args.verbose);
        assert_eq!(args.max_volume.as_deref(), Some(""));

        let settings = resolve(&args, &FileConfig::default());
        assert_eq!(settings.controller.filter.channel, Some(3));
        assert_eq!(settings.controller.max_volume, 30);
        assert!(settings.controller.verbose);
    }

    #[test]
    fn test_trailing_value_flag_keeps_default() {
        let settings = resolve(&parse(&["-m"]), &FileConfig::default());
        assert_eq!(settings.controller.max_volume, 30);

        let settings = resolve(&parse(&["-v", "-ch"]), &FileConfig::default());
        assert_eq!(settings.controller.filter.channel, None);
        assert!(settings.controller.verbose);

        let args = parse(&["-l", "-n"]);
        assert!(args.list);
        let settings = resolve(&args, &FileConfig::default());
        assert_eq!(settings.controller.device, DeviceSelector::Default);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let argv = normalize_args(["midivol", "-x"]);
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let file: FileConfig = toml::from_str(
            "[midi]\ndevice = \"Knob\"\nchannel = 2\n[volume]\nmax = 60\n",
        )
        .unwrap();

        let settings = resolve(&parse(&[]), &file);
        assert_eq!(settings.controller.device, DeviceSelector::Name("Knob".to_string()));
        assert_eq!(settings.controller.filter.channel, Some(2));
        assert_eq!(settings.controller.max_volume, 60);

        let settings = resolve(&parse(&["-m", "10", "-ch", "x"]), &file);
        assert_eq!(settings.controller.max_volume, 10);
        // Bad flag falls back to the file value
        assert_eq!(settings.controller.filter.channel, Some(2));
    }

    #[test]
    fn test_out_of_range_file_values_ignored() {
        let file: FileConfig = toml::from_str("[midi]\nchannel = 20\n[volume]\nmax = 150\n").unwrap();
        let settings = resolve(&parse(&[]), &file);
        assert_eq!(settings.controller.filter.channel, None);
        assert_eq!(settings.controller.max_volume, 30);
    }
}
