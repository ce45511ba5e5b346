/// MIDI input collaborators: device enumeration, device resolution and the
/// unified event source the loop drives.
///
/// Blocking-stream and poll/read style inputs both sit behind `EventSource`;
/// `delivery()` tells the loop whether it has to pace itself.

use std::sync::mpsc::{Receiver, TryRecvError};

use tracing::debug;

use crate::config::DeviceSelector;
use crate::error::{Error, Result};
use crate::event::MidiEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position in the enumerated list
    pub index: usize,
    pub name: String,
    pub is_input: bool,
    /// Backend-specific port address (e.g. "hw:1,0,0")
    pub address: String,
}

/// How a source delivers events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// `try_next` waits for the next event
    Push,
    /// `try_next` never blocks; the loop sleeps between iterations
    Poll,
}

/// Result of asking a source for its next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Event(MidiEvent),
    /// Nothing ready yet
    Idle,
    /// The source is exhausted and will never produce again
    Closed,
}

pub trait EventSource {
    fn delivery(&self) -> Delivery;

    /// False when the adapter cannot tell message kinds apart and tags
    /// everything as control change.
    fn reports_kind(&self) -> bool {
        true
    }

    fn try_next(&mut self) -> Result<Next>;

    /// Release the underlying device. Called once by the event loop.
    fn close(&mut self);
}

pub trait MidiBackend {
    /// Enumerate devices in a stable order.
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    fn open(&self, device: &DeviceInfo) -> Result<Box<dyn EventSource>>;
}

/// Pick the device a selector refers to. Only inputs can be selected.
pub fn resolve_device(devices: &[DeviceInfo], selector: &DeviceSelector) -> Result<DeviceInfo> {
    if devices.is_empty() {
        return Err(Error::NoDevicesAvailable);
    }

    let by_name = |name: &str| {
        devices
            .iter()
            .find(|d| d.is_input && d.name == name)
            .cloned()
    };

    match selector {
        DeviceSelector::Default => devices
            .iter()
            .find(|d| d.is_input)
            .cloned()
            .ok_or(Error::NoDevicesAvailable),
        DeviceSelector::Index(index) => devices
            .get(*index)
            .filter(|d| d.is_input)
            .cloned()
            // A device may literally be called "1"
            .or_else(|| by_name(&index.to_string()))
            .ok_or_else(|| Error::DeviceNotFound(selector.to_string())),
        DeviceSelector::Name(name) => {
            by_name(name).ok_or_else(|| Error::DeviceNotFound(name.clone()))
        }
    }
}

/// Push-stream adapter over any blocking iterator of events. The source is
/// closed when the iterator ends.
pub struct StreamSource<I> {
    events: Option<I>,
    kind_aware: bool,
}

impl<I: Iterator<Item = MidiEvent>> StreamSource<I> {
    pub fn new(events: I) -> Self {
        Self {
            events: Some(events),
            kind_aware: true,
        }
    }

    pub fn kind_unaware(mut self) -> Self {
        self.kind_aware = false;
        self
    }
}

impl<I: Iterator<Item = MidiEvent>> EventSource for StreamSource<I> {
    fn delivery(&self) -> Delivery {
        Delivery::Push
    }

    fn reports_kind(&self) -> bool {
        self.kind_aware
    }

    fn try_next(&mut self) -> Result<Next> {
        let Some(events) = self.events.as_mut() else {
            return Ok(Next::Closed);
        };
        match events.next() {
            Some(event) => Ok(Next::Event(event)),
            None => {
                self.events = None;
                Ok(Next::Closed)
            }
        }
    }

    fn close(&mut self) {
        self.events = None;
    }
}

/// Poll-based adapter over a channel fed by a callback-style MIDI API.
/// `try_next` is a non-blocking "ready? then read" step.
pub struct ChannelSource {
    rx: Option<Receiver<MidiEvent>>,
    kind_aware: bool,
}

impl ChannelSource {
    pub fn new(rx: Receiver<MidiEvent>) -> Self {
        Self {
            rx: Some(rx),
            kind_aware: true,
        }
    }

    pub fn kind_unaware(mut self) -> Self {
        self.kind_aware = false;
        self
    }
}

impl EventSource for ChannelSource {
    fn delivery(&self) -> Delivery {
        Delivery::Poll
    }

    fn reports_kind(&self) -> bool {
        self.kind_aware
    }

    fn try_next(&mut self) -> Result<Next> {
        let Some(rx) = self.rx.as_ref() else {
            return Ok(Next::Closed);
        };
        match rx.try_recv() {
            Ok(event) => Ok(Next::Event(event)),
            Err(TryRecvError::Empty) => Ok(Next::Idle),
            Err(TryRecvError::Disconnected) => {
                debug!("MIDI channel disconnected");
                self.rx = None;
                Ok(Next::Closed)
            }
        }
    }

    fn close(&mut self) {
        self.rx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn device(index: usize, name: &str, is_input: bool) -> DeviceInfo {
        DeviceInfo {
            index,
            name: name.to_string(),
            is_input,
            address: format!("hw:{},0,0", index),
        }
    }

    #[test]
    fn test_empty_list() {
        let err = resolve_device(&[], &DeviceSelector::Default).unwrap_err();
        assert!(matches!(err, Error::NoDevicesAvailable));
    }

    #[test]
    fn test_default_is_first_input() {
        let devices = vec![device(0, "Out", false), device(1, "Knob", true), device(2, "Pad", true)];
        let d = resolve_device(&devices, &DeviceSelector::Default).unwrap();
        assert_eq!(d.name, "Knob");
    }

    #[test]
    fn test_default_without_inputs() {
        let devices = vec![device(0, "Out", false)];
        let err = resolve_device(&devices, &DeviceSelector::Default).unwrap_err();
        assert!(matches!(err, Error::NoDevicesAvailable));
    }

    #[test]
    fn test_index_selector() {
        let devices = vec![device(0, "A", true), device(1, "B", true)];
        let d = resolve_device(&devices, &DeviceSelector::parse("1")).unwrap();
        assert_eq!(d.name, "B");

        let err = resolve_device(&devices, &DeviceSelector::parse("2")).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(ref s) if s == "2"));
    }

    #[test]
    fn test_index_pointing_at_output() {
        let devices = vec![device(0, "A", true), device(1, "Out", false)];
        let err = resolve_device(&devices, &DeviceSelector::Index(1)).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }

    #[test]
    fn test_numeric_name_fallback() {
        let devices = vec![device(0, "7", true)];
        let d = resolve_device(&devices, &DeviceSelector::Index(7)).unwrap();
        assert_eq!(d.index, 0);
    }

    #[test]
    fn test_name_selector_exact() {
        let devices = vec![device(0, "Launch Control MIDI 1", true)];
        assert!(resolve_device(&devices, &DeviceSelector::parse("Launch Control MIDI 1")).is_ok());
        let err = resolve_device(&devices, &DeviceSelector::parse("Launch Control")).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }

    #[test]
    fn test_stream_source_closes_at_end() {
        let mut source = StreamSource::new(vec![MidiEvent::control_change(0, 7, 1)].into_iter());
        assert_eq!(source.delivery(), Delivery::Push);
        assert!(matches!(source.try_next().unwrap(), Next::Event(_)));
        assert_eq!(source.try_next().unwrap(), Next::Closed);
        assert_eq!(source.try_next().unwrap(), Next::Closed);
    }

    #[test]
    fn test_channel_source_poll_semantics() {
        let (tx, rx) = mpsc::channel();
        let mut source = ChannelSource::new(rx);
        assert_eq!(source.delivery(), Delivery::Poll);
        assert_eq!(source.try_next().unwrap(), Next::Idle);

        tx.send(MidiEvent::control_change(0, 7, 1)).unwrap();
        assert!(matches!(source.try_next().unwrap(), Next::Event(_)));

        drop(tx);
        assert_eq!(source.try_next().unwrap(), Next::Closed);
    }

    #[test]
    fn test_close_stops_delivery() {
        let (tx, rx) = mpsc::channel();
        let mut source = ChannelSource::new(rx).kind_unaware();
        assert!(!source.reports_kind());
        tx.send(MidiEvent::control_change(0, 7, 1)).unwrap();
        source.close();
        assert_eq!(source.try_next().unwrap(), Next::Closed);
    }
}
