/// One run of the volume driver: a resolved device, an owned mixer and the
/// loop that connects them.
///
/// `prepare` does everything that can fail before the loop starts (device
/// resolution, mixer access, opening the port) so those failures are reported
/// up front and the loop never begins with an unresolved device.

use tracing::info;

use crate::config::ControllerConfig;
use crate::controller::VolumeController;
use crate::error::Result;
use crate::event_loop::{EventLoop, LoopExit, StopHandle};
use crate::mixer::{MixerBackend, MixerSink};
use crate::source::{resolve_device, DeviceInfo, MidiBackend};

pub struct Session {
    device: DeviceInfo,
    controller: VolumeController,
    event_loop: EventLoop,
}

impl Session {
    pub fn prepare(
        config: &ControllerConfig,
        midi: &dyn MidiBackend,
        mixer: Box<dyn MixerBackend>,
        stop: StopHandle,
    ) -> Result<Self> {
        let devices = midi.list_devices()?;
        let device = resolve_device(&devices, &config.device)?;

        let mixer = MixerSink::new(mixer, config.max_volume)?;
        let source = midi.open(&device)?;
        let event_loop = EventLoop::new(source, stop);
        let controller = VolumeController::new(config, mixer, event_loop.reports_kind());

        info!(
            "Running using MIDI device: {}, max_vol: {}, filters: channel {} control {}",
            device.name,
            controller.mixer().max_volume(),
            display_opt(config.filter.channel),
            display_opt(config.filter.controller),
        );
        info!(
            address = %device.address,
            mixer = controller.mixer().backend_name(),
            delivery = ?event_loop.delivery(),
            type_gate = event_loop.reports_kind(),
            "Session ready"
        );

        Ok(Self {
            device,
            controller,
            event_loop,
        })
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn controller(&self) -> &VolumeController {
        &self.controller
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.event_loop.stop_handle()
    }

    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.event_loop = self.event_loop.with_poll_interval(interval);
        self
    }

    /// Run the loop to completion. Returns the final mixer level along with
    /// the exit reason.
    pub fn run(self) -> Result<(LoopExit, u8)> {
        let Session {
            mut controller,
            event_loop,
            ..
        } = self;
        let exit = event_loop.run(&mut controller)?;
        Ok((exit, controller.mixer().current_level()))
    }
}

fn display_opt(value: Option<u8>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}
