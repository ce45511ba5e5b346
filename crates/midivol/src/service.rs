/// Background service host.
///
/// `MidivolService` owns one worker thread that builds a `Session` and runs
/// the event loop. The platform runner drives it through `on_start` /
/// `on_stop`: Windows through the Service Control Manager, everything else as
/// a foreground daemon (systemd, launchd) that stops on SIGTERM or Ctrl-C.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use midivol_core::{ControllerConfig, LoopExit, Session, StopHandle};
use midivol_device::MixerOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Where service lifecycle messages end up (event log, journal, file).
pub trait ServiceHost {
    fn report(&self, severity: Severity, message: &str);
}

/// Host that forwards reports to tracing.
pub struct LogHost;

impl ServiceHost for LogHost {
    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!(target: "midivol::service", "{}", message),
            Severity::Warning => warn!(target: "midivol::service", "{}", message),
            Severity::Error => error!(target: "midivol::service", "{}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    /// The platform asked the service to stop
    StopRequested,
    /// The worker ended on its own (error or source closed)
    WorkerExited,
}

/// Builds a ready session on the worker thread. Sessions are not `Send`,
/// so only the factory crosses threads.
pub type SessionFactory =
    Arc<dyn Fn(&ControllerConfig, StopHandle) -> midivol_core::Result<Session> + Send + Sync>;

/// Factory over the platform MIDI and mixer backends.
pub fn device_session_factory(mixer: MixerOptions) -> SessionFactory {
    Arc::new(move |config: &ControllerConfig, stop: StopHandle| {
        let midi = midivol_device::create_midi_backend();
        let mixer = midivol_device::create_mixer_backend(&mixer)?;
        Session::prepare(config, midi.as_ref(), mixer, stop)
    })
}

/// How the worker ended, as seen by `on_stop`.
#[derive(Debug)]
pub enum StopOutcome {
    NotRunning,
    Clean(LoopExit),
    Failed(String),
}

struct Worker {
    stop: StopHandle,
    thread: JoinHandle<midivol_core::Result<LoopExit>>,
}

pub struct MidivolService {
    config: ControllerConfig,
    factory: SessionFactory,
    worker: Option<Worker>,
}

impl MidivolService {
    pub fn new(config: ControllerConfig, factory: SessionFactory) -> Self {
        Self {
            config,
            factory,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawn the worker. `events` receives `WorkerExited` when the worker
    /// ends without being asked to.
    pub fn on_start(
        &mut self,
        host: &dyn ServiceHost,
        events: mpsc::UnboundedSender<ServiceEvent>,
    ) -> anyhow::Result<()> {
        if self.is_running() {
            host.report(Severity::Warning, "Midivol service already running");
            return Ok(());
        }

        let stop = StopHandle::new();
        let worker_stop = stop.clone();
        let config = self.config.clone();
        let factory = Arc::clone(&self.factory);

        let thread = std::thread::Builder::new()
            .name("midivol-worker".to_string())
            .spawn(move || {
                let result = factory(&config, worker_stop).and_then(Session::run);
                let _ = events.send(ServiceEvent::WorkerExited);
                result.map(|(exit, _level)| exit)
            })?;

        self.worker = Some(Worker { stop, thread });
        host.report(Severity::Info, "Midivol service started");
        Ok(())
    }

    /// Stop and join the worker, then report how it ended. Safe to call
    /// more than once.
    pub fn on_stop(&mut self, host: &dyn ServiceHost) -> StopOutcome {
        let Some(worker) = self.worker.take() else {
            return StopOutcome::NotRunning;
        };

        worker.stop.stop();
        let outcome = match worker.thread.join() {
            Ok(Ok(exit)) => StopOutcome::Clean(exit),
            Ok(Err(e)) => StopOutcome::Failed(e.to_string()),
            Err(_) => StopOutcome::Failed("worker thread panicked".to_string()),
        };

        match &outcome {
            StopOutcome::Failed(reason) => {
                host.report(Severity::Error, &format!("Midivol service failed: {}", reason))
            }
            StopOutcome::Clean(exit) => host.report(
                Severity::Info,
                &format!("Midivol service stopped ({:?})", exit),
            ),
            StopOutcome::NotRunning => {}
        }
        outcome
    }
}

/// Run as a foreground daemon until SIGTERM, Ctrl-C or the worker exits.
#[cfg(not(windows))]
pub async fn run_daemon(config: ControllerConfig, factory: SessionFactory) -> anyhow::Result<()> {
    let host = LogHost;
    let mut service = MidivolService::new(config, factory);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let signal_tx = tx.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = terminate_signal() => {
                if let Err(e) = result {
                    error!("Cannot listen for SIGTERM: {}", e);
                    return;
                }
                info!("Termination requested");
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Cannot listen for Ctrl-C: {}", e);
                    return;
                }
                info!("Interrupt received");
            }
        }
        let _ = signal_tx.send(ServiceEvent::StopRequested);
    });

    service.on_start(&host, tx)?;
    if let Some(event) = rx.recv().await {
        info!(?event, "Stopping service");
    }

    let outcome = tokio::task::block_in_place(|| service.on_stop(&host));
    if let StopOutcome::Failed(reason) = outcome {
        anyhow::bail!(reason);
    }
    Ok(())
}

#[cfg(unix)]
async fn terminate_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    term.recv().await;
    Ok(())
}

#[cfg(all(not(unix), not(windows)))]
async fn terminate_signal() -> std::io::Result<()> {
    std::future::pending().await
}

/// Service Control Manager integration.
#[cfg(windows)]
pub mod scm {
    use std::ffi::OsString;
    use std::sync::OnceLock;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use windows_service::service::{
        ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
        ServiceType,
    };
    use windows_service::service_control_handler::{self, ServiceControlHandlerResult};
    use windows_service::{define_windows_service, service_dispatcher};

    use super::{LogHost, MidivolService, ServiceEvent, SessionFactory, StopOutcome};
    use midivol_core::ControllerConfig;

    pub const SERVICE_NAME: &str = "MidivolService";

    static SERVICE: OnceLock<(ControllerConfig, SessionFactory)> = OnceLock::new();

    define_windows_service!(ffi_service_main, service_main);

    /// Hand the process over to the SCM dispatcher. Blocks until the
    /// service has stopped.
    pub fn run(config: ControllerConfig, factory: SessionFactory) -> anyhow::Result<()> {
        if SERVICE.set((config, factory)).is_err() {
            anyhow::bail!("service dispatcher already started");
        }
        service_dispatcher::start(SERVICE_NAME, ffi_service_main)?;
        Ok(())
    }

    fn service_main(_arguments: Vec<OsString>) {
        if let Err(e) = run_service() {
            tracing::error!(error = %e, "Service failed");
        }
    }

    fn run_service() -> anyhow::Result<()> {
        let (config, factory) = SERVICE
            .get()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("service not configured"))?;
        let host = LogHost;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let control_tx = tx.clone();
        let event_handler = move |control| match control {
            ServiceControl::Stop | ServiceControl::Shutdown => {
                let _ = control_tx.send(ServiceEvent::StopRequested);
                ServiceControlHandlerResult::NoError
            }
            ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
            _ => ServiceControlHandlerResult::NotImplemented,
        };
        let status_handle = service_control_handler::register(SERVICE_NAME, event_handler)?;

        let mut service = MidivolService::new(config, factory);
        service.on_start(&host, tx)?;
        status_handle.set_service_status(status(
            ServiceState::Running,
            ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN,
            0,
        ))?;

        let _ = rx.blocking_recv();

        status_handle.set_service_status(status(
            ServiceState::StopPending,
            ServiceControlAccept::empty(),
            0,
        ))?;
        let code = match service.on_stop(&host) {
            StopOutcome::Failed(_) => 1,
            _ => 0,
        };
        status_handle.set_service_status(status(
            ServiceState::Stopped,
            ServiceControlAccept::empty(),
            code,
        ))?;
        Ok(())
    }

    fn status(state: ServiceState, accept: ServiceControlAccept, code: u32) -> ServiceStatus {
        ServiceStatus {
            service_type: ServiceType::OWN_PROCESS,
            current_state: state,
            controls_accepted: accept,
            exit_code: if code == 0 {
                ServiceExitCode::Win32(0)
            } else {
                ServiceExitCode::ServiceSpecific(code)
            },
            checkpoint: 0,
            wait_hint: Duration::from_secs(5),
            process_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midivol_core::source::StreamSource;
    use midivol_core::{DeviceInfo, Error, EventSource, MidiBackend, MidiEvent, MixerBackend};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHost(Mutex<Vec<(Severity, String)>>);

    impl ServiceHost for RecordingHost {
        fn report(&self, severity: Severity, message: &str) {
            self.0.lock().unwrap().push((severity, message.to_string()));
        }
    }

    impl RecordingHost {
        fn severities(&self) -> Vec<Severity> {
            self.0.lock().unwrap().iter().map(|(s, _)| *s).collect()
        }
    }

    struct Mixer {
        fail: bool,
    }

    impl MixerBackend for Mixer {
        fn name(&self) -> &str {
            "test"
        }

        fn get_level(&mut self) -> midivol_core::Result<u8> {
            if self.fail {
                return Err(Error::mixer("no sound card"));
            }
            Ok(0)
        }

        fn set_level(&mut self, _level: u8) -> midivol_core::Result<()> {
            Ok(())
        }
    }

    /// One input whose knob keeps turning until the loop is stopped.
    struct EndlessKnob;

    impl MidiBackend for EndlessKnob {
        fn list_devices(&self) -> midivol_core::Result<Vec<DeviceInfo>> {
            Ok(vec![DeviceInfo {
                index: 0,
                name: "Knob".to_string(),
                is_input: true,
                address: "test:0".to_string(),
            }])
        }

        fn open(&self, _device: &DeviceInfo) -> midivol_core::Result<Box<dyn EventSource>> {
            let mut value = 0u8;
            let events = std::iter::repeat_with(move || {
                std::thread::sleep(Duration::from_millis(1));
                value = (value + 1) % 128;
                MidiEvent::control_change(0, 7, value)
            });
            Ok(Box::new(StreamSource::new(events)))
        }
    }

    fn factory(fail_mixer: bool) -> SessionFactory {
        Arc::new(move |config: &ControllerConfig, stop: StopHandle| {
            Session::prepare(config, &EndlessKnob, Box::new(Mixer { fail: fail_mixer }), stop)
        })
    }

    #[test]
    fn test_start_then_stop_is_clean() {
        let host = RecordingHost::default();
        let mut service = MidivolService::new(ControllerConfig::default(), factory(false));
        let (tx, _rx) = mpsc::unbounded_channel();

        service.on_start(&host, tx).unwrap();
        assert!(service.is_running());
        std::thread::sleep(Duration::from_millis(20));

        let outcome = service.on_stop(&host);
        assert!(matches!(outcome, StopOutcome::Clean(LoopExit::Stopped)));
        assert!(!service.is_running());
        assert_eq!(host.severities(), vec![Severity::Info, Severity::Info]);

        // Second stop is a no-op
        assert!(matches!(service.on_stop(&host), StopOutcome::NotRunning));
        assert_eq!(host.severities().len(), 2);
    }

    #[test]
    fn test_worker_failure_is_reported() {
        let host = RecordingHost::default();
        let mut service = MidivolService::new(ControllerConfig::default(), factory(true));
        let (tx, mut rx) = mpsc::unbounded_channel();

        service.on_start(&host, tx).unwrap();
        assert_eq!(rx.blocking_recv(), Some(ServiceEvent::WorkerExited));

        let outcome = service.on_stop(&host);
        match outcome {
            StopOutcome::Failed(reason) => assert!(reason.contains("no sound card")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(host.severities(), vec![Severity::Info, Severity::Error]);
    }

    #[test]
    fn test_double_start_keeps_one_worker() {
        let host = RecordingHost::default();
        let mut service = MidivolService::new(ControllerConfig::default(), factory(false));
        let (tx, _rx) = mpsc::unbounded_channel();

        service.on_start(&host, tx.clone()).unwrap();
        service.on_start(&host, tx).unwrap();
        assert_eq!(host.severities(), vec![Severity::Info, Severity::Warning]);
        assert!(matches!(service.on_stop(&host), StopOutcome::Clean(_)));
    }
}
