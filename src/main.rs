//! replay-autopilot
//!
//! Starts and stops the OBS Replay Buffer from the lifecycle signals of one
//! monitored source, without polling.

mod config;
mod config_watch;
mod error;
mod host;
mod logging;
mod monitor;
mod obs;
mod replay;
mod sync;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use config::Config;
use obs::{spawn_event_pump, ObsController};
use sync::{create_status_channel, dispatcher_channel, MonitorEngine, Task};

struct Args {
    config_path: Option<PathBuf>,
    list_sources: bool,
}

fn main() -> Result<()> {
    let Some(args) = parse_args()? else {
        print_help();
        return Ok(());
    };

    // Held until exit so buffered file logs are flushed
    let _log_guard = logging::init_logging()?;

    info!("replay-autopilot starting...");

    let config = Config::load(args.config_path.as_deref())?;
    let config_path = config.config_path()?;
    info!("Configuration loaded from {:?}", config_path);

    let runtime = tokio::runtime::Runtime::new()?;
    let _enter = runtime.enter();

    let controller = runtime.block_on(ObsController::connect(&config.obs))?;

    if args.list_sources {
        let sources = runtime.block_on(controller.list_sources())?;
        print_sources(&config, &sources);
        return Ok(());
    }

    let (dispatcher, queue) = dispatcher_channel(config.dispatcher.queue_capacity);
    let (status_tx, mut status_rx) = create_status_channel();

    spawn_event_pump(
        controller.events()?,
        config.obs.hook_vendor.clone(),
        dispatcher.clone(),
    );

    runtime.spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(status) => debug!("Engine status: {:?}", status),
                Err(RecvError::Lagged(skipped)) => debug!("Missed {} status updates", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Edits to the monitored source apply without a restart
    let _watcher = match config_watch::watch_config(&config_path, &config, dispatcher.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Config changes will need a restart: {:#}", e);
            None
        }
    };

    let ctrl_c = dispatcher.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        ctrl_c.submit(Task::Shutdown);
    })
    .context("Failed to install Ctrl+C handler")?;

    let mut engine = MonitorEngine::new(controller, &config, queue, dispatcher, status_tx)
        .with_confirmation(replay::confirmation_from_config(&config.confirmation));
    runtime.block_on(engine.run());

    info!("Shutdown complete");
    Ok(())
}

/// `None` when help was requested
fn parse_args() -> Result<Option<Args>> {
    let mut args = Args {
        config_path: None,
        list_sources: false,
    };

    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-c" | "--config" => {
                let path = argv.next().context("--config needs a path")?;
                args.config_path = Some(PathBuf::from(path));
            }
            "-l" | "--list-sources" => args.list_sources = true,
            other => bail!("Unknown argument '{}' (see --help)", other),
        }
    }

    Ok(Some(args))
}

fn print_sources(config: &Config, sources: &[host::SourceInfo]) {
    if sources.is_empty() {
        println!("No inputs in the current scene collection");
        return;
    }
    for source in sources {
        let hook = if config.is_hook_capable(&source.kind) {
            "  (hook signals)"
        } else {
            ""
        };
        println!("{}  [{}]{}", source.name, source.kind, hook);
    }
}

fn print_help() {
    println!("replay-autopilot - Event-driven OBS Replay Buffer control");
    println!();
    println!("USAGE:");
    println!("    replay-autopilot [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help            Print this help message");
    println!("    -c, --config <PATH>   Use this config file instead of the default");
    println!("    -l, --list-sources    Print the inputs OBS knows about and exit");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG                     Set log level (e.g., debug, info, warn)");
    println!("    REPLAY_AUTOPILOT_LOG_PATH    Directory for log files");
}
