/// Cross-platform MIDI input through midir (CoreMIDI, WinMM).
///
/// midir hands each complete message to a callback on its own thread. The
/// callback forwards decoded events into a channel and the loop polls that
/// channel, so this source uses `Delivery::Poll`.

use std::sync::mpsc;

use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, info};

use midivol_core::source::ChannelSource;
use midivol_core::{Delivery, DeviceInfo, Error, EventSource, MidiBackend, MidiEvent, Next, Result};

const CLIENT_NAME: &str = "midivol";

pub struct MidirMidi;

impl MidirMidi {
    pub fn new() -> Self {
        Self
    }

    fn client() -> Result<MidiInput> {
        let mut input = MidiInput::new(CLIENT_NAME)
            .map_err(|e| Error::source(format!("Failed to create MIDI input: {}", e)))?;
        // SysEx, clock and active sensing never carry volume changes
        input.ignore(Ignore::All);
        Ok(input)
    }
}

impl Default for MidirMidi {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiBackend for MidirMidi {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let input = Self::client()?;
        let devices = input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index));
                DeviceInfo {
                    index,
                    address: name.clone(),
                    name,
                    is_input: true,
                }
            })
            .collect::<Vec<_>>();
        debug!(count = devices.len(), "Enumerated MIDI inputs");
        Ok(devices)
    }

    fn open(&self, device: &DeviceInfo) -> Result<Box<dyn EventSource>> {
        let input = Self::client()?;
        let ports = input.ports();
        let port = ports
            .get(device.index)
            .ok_or_else(|| Error::DeviceNotFound(device.name.clone()))?;

        let (tx, rx) = mpsc::channel();
        let connection = input
            .connect(
                port,
                "midivol-input",
                move |_timestamp, message, _| {
                    if let Some(event) = MidiEvent::from_bytes(message) {
                        // Receiver gone means the source was closed
                        let _ = tx.send(event);
                    }
                },
                (),
            )
            .map_err(|e| Error::source(format!("Failed to connect to '{}': {}", device.name, e)))?;

        info!(name = %device.name, "MIDI input opened");
        Ok(Box::new(MidirSource {
            events: ChannelSource::new(rx),
            connection: Some(connection),
        }))
    }
}

/// Poll source backed by a live midir connection.
pub struct MidirSource {
    events: ChannelSource,
    connection: Option<MidiInputConnection<()>>,
}

impl EventSource for MidirSource {
    fn delivery(&self) -> Delivery {
        Delivery::Poll
    }

    fn try_next(&mut self) -> Result<Next> {
        self.events.try_next()
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            debug!("MIDI input closed");
        }
        self.events.close();
    }
}
