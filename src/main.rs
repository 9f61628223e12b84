use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

use pvloadctl::clock::{Clock, SystemClock};
use pvloadctl::config::Config;
use pvloadctl::control_loop::ControlLoop;
use pvloadctl::controller::ModeController;
use pvloadctl::dispatcher::{CommandDispatcher, LoggingTransport};
use pvloadctl::ingress;
use pvloadctl::logging::{self, get_logger};
use pvloadctl::persistence::PersistenceManager;
use pvloadctl::station::StationTracker;

const CONFIG_PATH_ENV: &str = "PVLOADCTL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PERSISTENCE_PATH: &str = "pvloadctl_state.json";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    // Startup failure (unreadable/invalid configuration) is fatal: exit
    // nonzero, per §6.4/§7.
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: failed to load configuration from {config_path}: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.logging).context("failed to initialize logging")?;
    info!("pvloadctl starting up");

    let persistence_path = config
        .persistence_path
        .clone()
        .unwrap_or_else(|| DEFAULT_PERSISTENCE_PATH.to_string());
    let mut persistence_manager = PersistenceManager::new(&persistence_path);
    persistence_manager.load()?;
    let persistence = Arc::new(Mutex::new(persistence_manager));

    let controller = Arc::new(ModeController::new(&config, persistence.clone()));
    let controller_rx = controller.subscribe();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let tracker = StationTracker::new(config.stations.clone(), clock.now());
    let (_telemetry_tx, telemetry_rx) = ingress::channel();
    let dispatcher = CommandDispatcher::new(Box::new(LoggingTransport::new()));

    let (control_loop, summary_rx) = ControlLoop::new(
        tracker,
        config.budget.clone(),
        controller_rx,
        telemetry_rx,
        dispatcher,
        clock,
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let loop_handle = tokio::spawn(control_loop.run(shutdown_rx));

    let web_handle = if config.web.enabled {
        let controller = controller.clone();
        let summary_rx = summary_rx.clone();
        let config_arc = Arc::new(config.clone());
        let host = config.web.host.clone();
        let port = config.web.port;
        Some(tokio::spawn(async move {
            if let Err(e) =
                pvloadctl::web_axum::serve(controller, summary_rx, config_arc, &host, port).await
            {
                error!("web server exited with error: {e}");
            }
        }))
    } else {
        None
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(());

    if let Err(e) = loop_handle.await {
        error!("control loop task panicked: {e}");
    }
    if let Some(handle) = web_handle {
        handle.abort();
    }

    get_logger("main").info("pvloadctl shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
