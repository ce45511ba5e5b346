/// midivol: drive the system master volume from a MIDI knob or fader.
///
/// Console mode runs until Ctrl-C. `--service` runs under the platform
/// service host and logs to a rotating file instead of the terminal.

mod cli;
mod config;
mod console;
mod logging;
mod service;

use clap::Parser;
use tracing::{error, info};

use crate::cli::Args;
use crate::config::FileConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse_from(cli::normalize_args(std::env::args_os()));

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let _log_guard = if args.service {
        let dir = file.log.dir.clone().unwrap_or_else(logging::default_log_dir);
        Some(logging::init_file(&dir)?)
    } else {
        logging::init_console();
        None
    };

    if args.list {
        return console::list_devices();
    }

    let settings = cli::resolve(&args, &file);

    if !args.service {
        return console::run(settings).await;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "midivol service starting");
    let result = run_service(settings).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

#[cfg(not(windows))]
async fn run_service(settings: cli::Settings) -> anyhow::Result<()> {
    let factory = service::device_session_factory(settings.mixer);
    service::run_daemon(settings.controller, factory).await
}

#[cfg(windows)]
async fn run_service(settings: cli::Settings) -> anyhow::Result<()> {
    let factory = service::device_session_factory(settings.mixer);
    let config = settings.controller;
    tokio::task::spawn_blocking(move || service::scm::run(config, factory)).await?
}
