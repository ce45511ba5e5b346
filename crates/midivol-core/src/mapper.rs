/// Controller value (0-127) to volume level (0-99): floor(value / 1.28).
///
/// Computed as value * 25 / 32 so the result is exact (1.28 has no exact
/// binary representation and float division lands on 49 for value 64).
/// Out-of-range input maps to 0 and is logged, never raised.

use tracing::warn;

use crate::MAX_MIDI_VALUE;

pub fn midi_to_volume(value: u8) -> u8 {
    if value > MAX_MIDI_VALUE {
        warn!(value, "MIDI value out of range, mapping to volume 0");
        return 0;
    }
    (value as u16 * 25 / 32) as u8
}
