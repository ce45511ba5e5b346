/// Linux ALSA adapters: rawmidi capture ports as event sources and the ALSA
/// simple mixer as the volume sink.
///
/// Rawmidi delivers the controller's wire bytes unchanged, so message framing
/// (running status, SysEx, realtime bytes) is done here with `MidiParser`.
/// Reads wait on the port's poll descriptors with a short timeout so the loop
/// still sees its stop flag while the controller is idle.

use std::collections::VecDeque;
use std::ffi::CString;
use std::io::{ErrorKind, Read};

use alsa::card;
use alsa::ctl::Ctl;
use alsa::mixer::{Mixer, Selem, SelemChannelId, SelemId};
use alsa::rawmidi::{self, Rawmidi};
use alsa::{Direction, PollDescriptors};
use tracing::{debug, info, warn};

use midivol_core::{
    Delivery, DeviceInfo, Error, EventSource, MidiBackend, MidiEvent, MidiParser, MixerBackend,
    Next, Result, MAX_VOLUME_LEVEL,
};

/// How long one `try_next` waits for input before reporting idle
const WAIT_TIMEOUT_MS: i32 = 50;

const READ_BUF_SIZE: usize = 256;

pub struct AlsaMidi;

impl AlsaMidi {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AlsaMidi {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiBackend for AlsaMidi {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut devices = Vec::new();

        for card in card::Iter::new() {
            let card = match card {
                Ok(card) => card,
                Err(e) => {
                    warn!("Skipping sound card: {}", e);
                    continue;
                }
            };
            let ctl = match Ctl::from_card(&card, false) {
                Ok(ctl) => ctl,
                Err(e) => {
                    warn!(card = card.get_index(), "Cannot open card control: {}", e);
                    continue;
                }
            };

            for info in take_until_error(card.get_index(), rawmidi::Iter::new(&ctl)) {
                let address = format!(
                    "hw:{},{},{}",
                    card.get_index(),
                    info.get_device(),
                    info.get_subdevice()
                );
                let name = info
                    .get_subdevice_name()
                    .ok()
                    .filter(|n| !n.is_empty())
                    .or_else(|| info.get_id().ok().filter(|n| !n.is_empty()))
                    .unwrap_or_else(|| address.clone());

                devices.push(DeviceInfo {
                    index: devices.len(),
                    name,
                    is_input: matches!(info.get_stream(), Direction::Capture),
                    address,
                });
            }
        }

        debug!(count = devices.len(), "Enumerated rawmidi ports");
        Ok(devices)
    }

    fn open(&self, device: &DeviceInfo) -> Result<Box<dyn EventSource>> {
        let address = CString::new(device.address.as_str())
            .map_err(|e| Error::source(format!("Invalid port address '{}': {}", device.address, e)))?;
        let rawmidi = Rawmidi::open(&address, Direction::Capture, true)
            .map_err(|e| Error::source(format!("Failed to open '{}': {}", device.address, e)))?;

        info!(address = %device.address, name = %device.name, "MIDI input opened");
        Ok(Box::new(RawmidiSource {
            address: device.address.clone(),
            rawmidi: Some(rawmidi),
            parser: MidiParser::new(),
            pending: VecDeque::new(),
            buf: [0; READ_BUF_SIZE],
        }))
    }
}

/// Collect a card's ports up to the first lookup error. The rawmidi iterator
/// does not advance past a failed lookup, so every later call would repeat
/// the same error.
fn take_until_error<T, E: std::fmt::Display>(
    card: i32,
    ports: impl IntoIterator<Item = std::result::Result<T, E>>,
) -> Vec<T> {
    let mut found = Vec::new();
    for port in ports {
        match port {
            Ok(port) => found.push(port),
            Err(e) => {
                warn!(card, "Skipping rest of card's rawmidi ports: {}", e);
                break;
            }
        }
    }
    found
}

/// Push source over a non-blocking rawmidi capture handle.
pub struct RawmidiSource {
    address: String,
    rawmidi: Option<Rawmidi>,
    parser: MidiParser,
    /// Events decoded from one read but not yet handed out
    pending: VecDeque<MidiEvent>,
    buf: [u8; READ_BUF_SIZE],
}

impl EventSource for RawmidiSource {
    fn delivery(&self) -> Delivery {
        Delivery::Push
    }

    fn try_next(&mut self) -> Result<Next> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Next::Event(event));
        }
        let Some(rawmidi) = self.rawmidi.as_ref() else {
            return Ok(Next::Closed);
        };

        let mut fds = rawmidi
            .get()
            .map_err(|e| Error::source(format!("Poll setup failed on '{}': {}", self.address, e)))?;
        match alsa::poll::poll(&mut fds, WAIT_TIMEOUT_MS) {
            Ok(0) => return Ok(Next::Idle),
            Ok(_) => {}
            // Usually EINTR. The read below reports real failures.
            Err(e) => {
                debug!("poll interrupted: {}", e);
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }

        match rawmidi.io().read(&mut self.buf) {
            Ok(0) => Ok(Next::Idle),
            Ok(n) => {
                for &byte in &self.buf[..n] {
                    if let Some(event) = self.parser.push(byte) {
                        self.pending.push_back(event);
                    }
                }
                Ok(self.pending.pop_front().map_or(Next::Idle, Next::Event))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(Next::Idle),
            Err(e) => Err(Error::source(format!("Read failed on '{}': {}", self.address, e))),
        }
    }

    fn close(&mut self) {
        if self.rawmidi.take().is_some() {
            debug!(address = %self.address, "MIDI input closed");
        }
        self.pending.clear();
        self.parser.reset();
    }
}

/// ALSA simple mixer element, addressed by card and control name.
pub struct AlsaMixer {
    mixer: Mixer,
    card: String,
    control: String,
}

impl AlsaMixer {
    pub fn open(card: &str, control: &str) -> Result<Self> {
        let mixer = Mixer::new(card, false)
            .map_err(|e| Error::mixer(format!("Failed to open mixer '{}': {}", card, e)))?;
        let this = Self {
            mixer,
            card: card.to_string(),
            control: control.to_string(),
        };
        // Fail early when the control does not exist
        this.with_selem(|_| Ok(()))?;

        info!(card, control, "ALSA mixer opened");
        Ok(this)
    }

    fn with_selem<T>(&self, f: impl FnOnce(&Selem<'_>) -> alsa::Result<T>) -> Result<T> {
        let id = SelemId::new(&self.control, 0);
        let selem = self.mixer.find_selem(&id).ok_or_else(|| {
            Error::mixer(format!(
                "Mixer control '{}' not found on '{}'",
                self.control, self.card
            ))
        })?;
        f(&selem).map_err(|e| Error::mixer(format!("Mixer '{}': {}", self.control, e)))
    }
}

impl MixerBackend for AlsaMixer {
    fn name(&self) -> &str {
        "alsa"
    }

    fn get_level(&mut self) -> Result<u8> {
        // Pick up changes made by other applications
        if let Err(e) = self.mixer.handle_events() {
            debug!("Mixer event refresh failed: {}", e);
        }
        self.with_selem(|selem| {
            let (min, max) = selem.get_playback_volume_range();
            let raw = selem.get_playback_volume(SelemChannelId::FrontLeft)?;
            Ok(raw_to_level(raw, min, max))
        })
    }

    fn set_level(&mut self, level: u8) -> Result<()> {
        self.with_selem(|selem| {
            let (min, max) = selem.get_playback_volume_range();
            selem.set_playback_volume_all(level_to_raw(level, min, max))
        })
    }
}

/// Percent level to a raw value in the control's range, rounded to nearest.
fn level_to_raw(level: u8, min: i64, max: i64) -> i64 {
    let span = (max - min).max(0);
    min + (span * i64::from(level.min(100)) + 50) / 100
}

/// Raw control value to a percent level, capped at the highest level.
fn raw_to_level(raw: i64, min: i64, max: i64) -> u8 {
    let span = max - min;
    if span <= 0 {
        return 0;
    }
    let percent = ((raw - min).clamp(0, span) * 100 + span / 2) / span;
    percent.min(i64::from(MAX_VOLUME_LEVEL)) as u8
}
