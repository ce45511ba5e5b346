/// MIDI events as seen by the volume engine, and a byte-stream decoder that
/// produces them from raw MIDI wire data.
///
/// Only control change messages can move the volume. Everything else is
/// tagged `MessageKind::Other` so the type gate can drop it.

use std::fmt;

/// Message-kind tag. Sources that cannot tell kinds apart tag every event
/// `ControlChange` and report that through `EventSource::reports_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    ControlChange,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// MIDI channel, 0-15
    pub channel: u8,
    /// Controller number (first data byte)
    pub controller: u8,
    /// Controller value (second data byte)
    pub value: u8,
    pub kind: MessageKind,
}

impl MidiEvent {
    pub fn new(kind: MessageKind, channel: u8, controller: u8, value: u8) -> Self {
        Self {
            channel,
            controller,
            value,
            kind,
        }
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(MessageKind::ControlChange, channel, controller, value)
    }

    pub fn is_control_change(&self) -> bool {
        self.kind == MessageKind::ControlChange
    }

    /// Decode one complete MIDI message (as delivered by callback-style APIs).
    /// Returns None for system messages, SysEx and truncated input.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let mut parser = MidiParser::new();
        data.iter().find_map(|&b| parser.push(b))
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MessageKind::ControlChange => write!(
                f,
                "control_change channel={} control={} value={}",
                self.channel, self.controller, self.value
            ),
            MessageKind::Other => write!(
                f,
                "other channel={} data={} {}",
                self.channel, self.controller, self.value
            ),
        }
    }
}

/// Streaming decoder for raw MIDI bytes (rawmidi ports deliver an unframed
/// byte stream). Handles running status, skips SysEx and system common
/// messages, and ignores realtime bytes wherever they appear.
#[derive(Debug, Default)]
pub struct MidiParser {
    status: Option<u8>,
    data: [u8; 2],
    len: usize,
    in_sysex: bool,
}

impl MidiParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns an event when it completes a channel message.
    pub fn push(&mut self, byte: u8) -> Option<MidiEvent> {
        // Realtime (clock, start, stop, active sensing...) may interleave anything
        if byte >= 0xF8 {
            return None;
        }

        if byte & 0x80 != 0 {
            self.len = 0;
            match byte {
                0xF0 => {
                    self.in_sysex = true;
                    self.status = None;
                }
                0xF7 => {
                    self.in_sysex = false;
                    self.status = None;
                }
                // System common cancels running status; its data bytes are skipped
                0xF4..=0xF6 => {
                    self.in_sysex = false;
                    self.status = None;
                }
                _ => {
                    self.in_sysex = false;
                    self.status = Some(byte);
                }
            }
            return None;
        }

        if self.in_sysex {
            return None;
        }
        let status = self.status?;

        self.data[self.len] = byte;
        self.len += 1;
        if self.len < data_len(status) {
            return None;
        }
        self.len = 0;

        if status >= 0xF0 {
            // Completed a system common message, nothing to report
            self.status = None;
            return None;
        }

        let kind = if status & 0xF0 == 0xB0 {
            MessageKind::ControlChange
        } else {
            MessageKind::Other
        };
        let (controller, value) = match data_len(status) {
            1 => (0, self.data[0]),
            _ => (self.data[0], self.data[1]),
        };
        Some(MidiEvent::new(kind, status & 0x0F, controller, value))
    }

    /// Drop any partial message (e.g. after a port is reopened).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Number of data bytes following a status byte.
fn data_len(status: u8) -> usize {
    match status {
        0xF1 | 0xF3 => 1,
        _ => match status & 0xF0 {
            0xC0 | 0xD0 => 1,
            _ => 2,
        },
    }
}
