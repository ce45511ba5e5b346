/// Event loop driving a `VolumeController` from an `EventSource`.
///
/// One implementation serves both delivery models: push sources wait inside
/// `try_next`, poll sources are paced by a fixed sleep after every iteration.
/// Processing is strictly sequential. Cancellation is cooperative: the stop
/// flag is checked before each iteration, so an in-flight `handle` always
/// completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::controller::VolumeController;
use crate::error::Result;
use crate::source::{Delivery, EventSource, Next};
use crate::DEFAULT_POLL_INTERVAL_MS;

/// Externally settable stop flag. Cheap to clone and safe to raise from any
/// thread (signal handler task, service control handler).
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Stop flag raised
    Stopped,
    /// The source reported end of stream
    SourceClosed,
}

pub struct EventLoop {
    source: Box<dyn EventSource>,
    poll_interval: Duration,
    stop: StopHandle,
}

impl EventLoop {
    pub fn new(source: Box<dyn EventSource>, stop: StopHandle) -> Self {
        Self {
            source,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stop,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn delivery(&self) -> Delivery {
        self.source.delivery()
    }

    pub fn reports_kind(&self) -> bool {
        self.source.reports_kind()
    }

    /// Run until stopped, the source closes, or an error occurs. The source
    /// is closed exactly once on every path.
    pub fn run(mut self, controller: &mut VolumeController) -> Result<LoopExit> {
        let delivery = self.source.delivery();
        debug!(?delivery, "Event loop started");

        let result = self.drive(controller, delivery);
        self.source.close();

        match &result {
            Ok(exit) => info!(?exit, "Event loop finished"),
            Err(e) => info!(error = %e, "Event loop aborted"),
        }
        result
    }

    fn drive(&mut self, controller: &mut VolumeController, delivery: Delivery) -> Result<LoopExit> {
        loop {
            if self.stop.is_stopped() {
                return Ok(LoopExit::Stopped);
            }

            match self.source.try_next()? {
                Next::Event(event) => controller.handle(&event)?,
                Next::Idle => {}
                Next::Closed => return Ok(LoopExit::SourceClosed),
            }

            if delivery == Delivery::Poll {
                std::thread::sleep(self.poll_interval);
            }
        }
    }
}
