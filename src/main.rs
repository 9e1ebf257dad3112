use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use vigil::config::Config;
use vigil::monitor::Monitor;
use vigil::notify::TelegramNotifier;
use vigil::scheduler::PollScheduler;
use vigil::store::FirebaseStore;

/// Command-line arguments for the feed watchdog
#[derive(Parser)]
#[command(
    name = "vigil",
    about = "Telemetry feed watchdog - stale-data and reboot alerting",
    long_about = "A monitoring daemon that polls a remote timeseries log store on a fixed \
                  interval, detects stale data and device reboots, and sends deduplicated \
                  alerts to a Telegram channel. Future-dated garbage records are deleted \
                  from the store as they are found."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "vigil.toml",
        help = "Configuration file path (TOML format)"
    )]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// Missing files are left for config loading to report; only a path that
    /// exists but is not a regular file is rejected here.
    fn validate(&self) -> Result<(), String> {
        if self.config.exists() {
            if !self.config.is_file() {
                return Err(format!(
                    "Configuration path is not a file: {}",
                    self.config.display()
                ));
            }

            if let Some(extension) = self.config.extension() {
                if extension != "toml" {
                    warn!(
                        "Configuration file does not have .toml extension: {}",
                        self.config.display()
                    );
                }
            }
        }

        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting vigil feed watchdog");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    // All failures from here to the scheduler start are bootstrap failures
    // and therefore fatal; once the schedule is running, per-cycle errors
    // are logged and survived instead.
    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let source_offset = match config.source_offset() {
        Ok(offset) => offset,
        Err(e) => {
            error!("Failed to parse source offset: {}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(FirebaseStore::new(&config.store));
    let notifier = Arc::new(TelegramNotifier::new(&config.telegram));

    let mut monitor = match Monitor::new(
        store,
        notifier,
        config.monitor.staleness_threshold_minutes,
        source_offset,
    ) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("Failed to initialize monitor: {}", e);
            std::process::exit(1);
        }
    };

    let mut scheduler =
        PollScheduler::new(Duration::from_secs(config.monitor.poll_interval_seconds));

    // Set up signal handling for graceful shutdown (SIGINT)
    let (shutdown_sender, shutdown_receiver) = mpsc::channel();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        if let Err(e) = shutdown_sender.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    })
    .expect("Error setting SIGINT handler for graceful shutdown");

    if let Err(e) = scheduler.start(move || monitor.run_cycle()) {
        error!("Failed to start poll scheduler: {}", e);
        std::process::exit(1);
    }

    info!(
        "vigil is running with a {}s poll interval. Press Ctrl+C to stop.",
        config.monitor.poll_interval_seconds
    );

    // Block until the interrupt handler fires
    match shutdown_receiver.recv() {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error waiting for shutdown: {}", e),
    }

    if let Err(e) = scheduler.stop() {
        error!("Error during shutdown: {}", e);
        std::process::exit(1);
    }

    info!("vigil shutdown complete");
}
