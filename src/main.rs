//! # FDF Bridge
//!
//! Expose a First Degree Fitness rowing console as a Bluetooth FTMS indoor rower.
//!
//! This application reads the console's serial telemetry, keeps the session
//! snapshot up to date and forwards it as Rower Data notifications.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use fdf_bridge::bridge::Bridge;
use fdf_bridge::config::{Config, LoggingConfig};
use fdf_bridge::error::BridgeError;
use fdf_bridge::link::manager::LoggingLinkManager;
use fdf_bridge::link::{LinkEvent, TelemetryLink, WirelessLink};
use fdf_bridge::serial::FdfSerial;

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix of the daily rolling log
const LOG_FILE_PREFIX: &str = "fdf-bridge.log";

/// Main entry point for FDF Bridge application
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Create the link manager and bridge, start advertising
///
/// 2. **Main Loop**
///    - Open the console, retrying every `reconnect_interval_ms`
///    - Feed every received chunk through the bridge
///    - Apply link events from the wireless stack
///    - Warn about down links every `check_interval_ms`
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Stop advertising and release the bridge
///
/// # Errors
///
/// Returns error if:
/// - The configuration file exists but is invalid
/// - The session recorder directory cannot be created
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO fdf_bridge: FDF Bridge v0.1.0 starting...
/// INFO fdf_bridge::link::manager: Advertising FTMS rower as "FDF Rower"
/// INFO fdf_bridge::serial: Successfully opened FDF console at /dev/ttyACM0
/// INFO fdf_bridge::link: Telemetry source connected
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path(std::env::args().nth(1));
    let (config, loaded) = load_config(&config_path)?;

    let _log_guard = init_logging(&config.logging);

    info!("FDF Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    if loaded {
        info!("Loaded configuration from {}", config_path);
    } else {
        warn!("{} not found, using built-in defaults", config_path);
    }

    let (manager, mut events) = LoggingLinkManager::new(config.ftms.device_name.clone());
    let mut bridge = Bridge::from_config(&config, Arc::new(manager))
        .context("Failed to initialize bridge")?;

    if config.ftms.advertise_on_start {
        if let Err(e) = bridge.start() {
            warn!("Advertising not started: {}", e);
        }
    }

    let mut serial: Option<FdfSerial> = None;

    let mut reconnect = interval(Duration::from_millis(config.serial.reconnect_interval_ms));
    reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut status_check = interval(Duration::from_millis(config.status.check_interval_ms));
    status_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            // Reopen the console while it is away
            _ = reconnect.tick(), if serial.is_none() => {
                match FdfSerial::open(&config.serial) {
                    Ok(port) => {
                        handle_event(&bridge, LinkEvent::TelemetryConnected);
                        serial = Some(port);
                    }
                    Err(e) => debug!("Console not available: {}", e),
                }
            }

            result = read_console(&mut serial) => {
                match result {
                    Ok(chunk) => {
                        bridge.deliver(&chunk);
                    }
                    Err(BridgeError::SerialDisconnected(path)) => {
                        warn!("Console at {} went away", path);
                        handle_event(&bridge, LinkEvent::TelemetryDisconnected);
                        serial = None;
                    }
                    Err(e) => {
                        handle_event(&bridge, LinkEvent::TelemetryError(e.to_string()));
                        serial = None;
                    }
                }
            }

            Some(event) = events.recv() => {
                handle_event(&bridge, event);
            }

            _ = status_check.tick() => {
                check_status(&bridge);
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Err(e) = bridge.shutdown() {
        warn!("Shutdown incomplete: {}", e);
    }
    if bridge.overflow_count() > 0 {
        info!("Discarded {} oversized console lines", bridge.overflow_count());
    }

    Ok(())
}

/// Config path from the first command line argument
fn config_path(arg: Option<String>) -> String {
    arg.unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Load the configuration, falling back to defaults if the file is absent
///
/// Returns the configuration and whether it came from the file.
fn load_config(path: &str) -> Result<(Config, bool)> {
    if !Path::new(path).exists() {
        return Ok((Config::default(), false));
    }

    let config = Config::load(path).with_context(|| format!("Failed to load {}", path))?;
    Ok((config, true))
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard must be
/// held until exit so buffered file output is flushed.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    if config.file_dir.is_empty() {
        registry.init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.file_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    Some(guard)
}

/// Read the next chunk, or wait forever while no console is open
async fn read_console(serial: &mut Option<FdfSerial>) -> fdf_bridge::error::Result<Vec<u8>> {
    match serial.as_mut() {
        Some(port) => port.read_chunk().await.map(<[u8]>::to_vec),
        None => std::future::pending().await,
    }
}

fn handle_event(bridge: &Bridge, event: LinkEvent) {
    if let Err(e) = bridge.handle_event(&event) {
        warn!("Failed to handle {:?}: {}", event, e);
    }
}

/// Periodic health check of both links
fn check_status(bridge: &Bridge) {
    let status = bridge.status();

    if status.telemetry != TelemetryLink::Connected {
        warn!("Telemetry source not connected ({:?})", status.telemetry);
    }
    if status.wireless != WirelessLink::Connected {
        warn!("No wireless client connected ({:?})", status.wireless);
    }

    if let Some(snapshot) = bridge.session().current() {
        debug!(
            "Session: {} strokes, {} m, {} s",
            snapshot.stroke_count,
            snapshot.distance_m,
            snapshot.elapsed_time_ms / 1000
        );
    }
}
