/// Interactive mode: one session in the foreground until Ctrl-C, the device
/// goes away, or the mixer fails.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{error, info};

use midivol_core::StopHandle;

use crate::cli::Settings;
use crate::service;

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let stop = StopHandle::new();
    let worker_stop = stop.clone();
    let factory = service::device_session_factory(settings.mixer);
    let config = settings.controller;

    // Backends and the session stay on the blocking thread that runs the loop
    let worker = tokio::task::spawn_blocking(move || factory(&config, worker_stop)?.run());

    let (exit, level) = supervise(worker, tokio::signal::ctrl_c(), stop).await?;
    info!(?exit, level, "midivol stopped");
    Ok(())
}

/// Wait for the worker, raising the stop flag when `interrupt` fires. If the
/// interrupt cannot be listened for, the session runs until it ends itself.
async fn supervise<T>(
    mut worker: JoinHandle<midivol_core::Result<T>>,
    interrupt: impl Future<Output = std::io::Result<()>>,
    stop: StopHandle,
) -> anyhow::Result<T> {
    tokio::select! {
        joined = &mut worker => return Ok(joined??),
        signal = interrupt => match signal {
            Ok(()) => {
                info!("Interrupt received, stopping");
                stop.stop();
            }
            Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
        },
    }
    Ok(worker.await??)
}

/// Print the enumerated MIDI devices to stdout.
pub fn list_devices() -> anyhow::Result<()> {
    let midi = midivol_device::create_midi_backend();
    let devices = midi.list_devices()?;

    println!("List of available MIDI devices:");
    for device in &devices {
        let direction = if device.is_input { "input" } else { "output" };
        println!("  {}: {} ({}, {})", device.index, device.name, direction, device.address);
    }
    if devices.is_empty() {
        println!("  (none)");
    }
    Ok(())
}
