/// Volume controller: gate, map, apply.

use tracing::info;

use crate::config::ControllerConfig;
use crate::error::Result;
use crate::event::MidiEvent;
use crate::filter::FilterChain;
use crate::mapper::midi_to_volume;
use crate::mixer::MixerSink;

pub struct VolumeController {
    filter: FilterChain,
    mixer: MixerSink,
    verbose: bool,
}

impl VolumeController {
    /// `kind_aware` comes from the event source and decides whether the
    /// message-type gate is part of the chain.
    pub fn new(config: &ControllerConfig, mixer: MixerSink, kind_aware: bool) -> Self {
        Self {
            filter: FilterChain::new(&config.filter, kind_aware),
            mixer,
            verbose: config.verbose,
        }
    }

    /// Process one event. Rejected events leave no trace at all (no mixer
    /// call, no log line). Only mixer failures are returned.
    pub fn handle(&mut self, event: &MidiEvent) -> Result<()> {
        if !self.filter.accepts(event) {
            return Ok(());
        }

        let level = midi_to_volume(event.value);
        self.mixer.apply(level)?;
        if self.verbose {
            info!("{}", event);
        }
        Ok(())
    }

    pub fn filter(&self) -> &FilterChain {
        &self.filter
    }

    pub fn mixer(&self) -> &MixerSink {
        &self.mixer
    }
}
