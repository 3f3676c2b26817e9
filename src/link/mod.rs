//! # Link Coordination Module
//!
//! Tracks the two independent links of the bridge and decides what crosses
//! between them.
//!
//! This module handles:
//! - Telemetry source link state (`Disconnected` / `Connected` / `Error`)
//! - Wireless client link state (`Idle` / `Advertising` / `Connected`)
//! - Requesting advertising at startup and after every client disconnect
//! - Forwarding snapshots as notifications only while a client is connected
//!
//! The coordinator never queues notifications: a snapshot published while
//! no client is connected is dropped, and the next one supersedes it.

pub mod manager;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fdf::parser::SnapshotSink;
use crate::fdf::protocol::TelemetrySnapshot;
use crate::ftms::encoder::PacketEncoder;
use manager::LinkManager;

/// Connectivity of the rowing console
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TelemetryLink {
    #[default]
    Disconnected,
    Connected,
    Error,
}

/// Connectivity of the wireless client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WirelessLink {
    #[default]
    Idle,
    Advertising,
    Connected,
}

/// Events raised by the telemetry driver and the link manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    TelemetryConnected,
    TelemetryDisconnected,
    TelemetryError(String),
    WirelessConnected,
    WirelessDisconnected,
    /// Anything else a platform stack reports; ignored
    Unrecognized(String),
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub telemetry: TelemetryLink,
    pub wireless: WirelessLink,
    pub wants_advertising: bool,
}

#[derive(Debug, Default)]
struct LinkState {
    telemetry: TelemetryLink,
    wireless: WirelessLink,
    wants_advertising: bool,
    stop_requested: bool,
}

/// Coordinates the telemetry and wireless links
pub struct LinkCoordinator {
    state: Mutex<LinkState>,
    manager: Arc<dyn LinkManager>,
    encoder: PacketEncoder,
}

impl std::fmt::Debug for LinkCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkCoordinator")
            .field("status", &self.status())
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}

impl LinkCoordinator {
    /// Create a coordinator with both links down
    pub fn new(manager: Arc<dyn LinkManager>, encoder: PacketEncoder) -> Self {
        Self {
            state: Mutex::new(LinkState::default()),
            manager,
            encoder,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state of both links
    pub fn status(&self) -> LinkStatus {
        let state = self.lock();
        LinkStatus {
            telemetry: state.telemetry,
            wireless: state.wireless,
            wants_advertising: state.wants_advertising,
        }
    }

    /// Ask the link manager to start advertising
    ///
    /// The coordinator keeps wanting to advertise even if the request fails.
    ///
    /// # Errors
    ///
    /// Returns the link manager's error unchanged
    pub fn start_advertising(&self) -> Result<()> {
        {
            let mut state = self.lock();
            state.wants_advertising = true;
            state.stop_requested = false;
        }
        self.request_advertising()
    }

    /// Explicitly stop advertising; disables re-advertising after disconnects
    ///
    /// # Errors
    ///
    /// Returns the link manager's error unchanged
    pub fn stop_advertising(&self) -> Result<()> {
        {
            let mut state = self.lock();
            state.wants_advertising = false;
            state.stop_requested = true;
        }

        if let Err(e) = self.manager.stop_advertising() {
            warn!("Failed to stop advertising: {}", e);
            return Err(e);
        }

        let mut state = self.lock();
        if state.wireless == WirelessLink::Advertising {
            state.wireless = WirelessLink::Idle;
        }
        Ok(())
    }

    // The manager is called without holding the lock so it may report
    // events back into the coordinator synchronously.
    fn request_advertising(&self) -> Result<()> {
        if let Err(e) = self.manager.start_advertising() {
            warn!("Failed to start advertising: {}", e);
            return Err(e);
        }

        let mut state = self.lock();
        if state.wireless == WirelessLink::Idle {
            state.wireless = WirelessLink::Advertising;
        }
        Ok(())
    }

    /// The console link came up
    pub fn on_telemetry_connected(&self) {
        info!("Telemetry source connected");
        self.lock().telemetry = TelemetryLink::Connected;
    }

    /// The console link went away cleanly
    pub fn on_telemetry_disconnected(&self) {
        info!("Telemetry source disconnected");
        self.lock().telemetry = TelemetryLink::Disconnected;
    }

    /// The console link failed
    pub fn on_telemetry_error(&self, reason: &str) {
        warn!("Telemetry source error: {}", reason);
        self.lock().telemetry = TelemetryLink::Error;
    }

    /// A wireless client connected
    pub fn on_wireless_client_connected(&self) {
        info!("Wireless client connected");
        self.lock().wireless = WirelessLink::Connected;
    }

    /// The wireless client disconnected; advertising restarts unless stopped
    ///
    /// # Errors
    ///
    /// Returns the link manager's error if restarting advertising fails
    pub fn on_wireless_client_disconnected(&self) -> Result<()> {
        info!("Wireless client disconnected");

        let readvertise = {
            let mut state = self.lock();
            state.wireless = WirelessLink::Idle;
            if !state.stop_requested {
                state.wants_advertising = true;
            }
            state.wants_advertising
        };

        if readvertise {
            self.request_advertising()
        } else {
            Ok(())
        }
    }

    /// Apply one link event
    ///
    /// # Errors
    ///
    /// Returns the link manager's error if the transition required an
    /// advertising request that failed
    pub fn handle(&self, event: &LinkEvent) -> Result<()> {
        match event {
            LinkEvent::TelemetryConnected => self.on_telemetry_connected(),
            LinkEvent::TelemetryDisconnected => self.on_telemetry_disconnected(),
            LinkEvent::TelemetryError(reason) => self.on_telemetry_error(reason),
            LinkEvent::WirelessConnected => self.on_wireless_client_connected(),
            LinkEvent::WirelessDisconnected => return self.on_wireless_client_disconnected(),
            LinkEvent::Unrecognized(what) => debug!("Ignoring link event {:?}", what),
        }
        Ok(())
    }

    /// Encode and send a snapshot if a client is connected
    ///
    /// # Returns
    ///
    /// * `Result<bool>` - `true` if a notification was sent, `false` if dropped
    ///
    /// # Errors
    ///
    /// Returns the link manager's error if the send fails
    pub fn publish(&self, snapshot: &TelemetrySnapshot) -> Result<bool> {
        if self.lock().wireless != WirelessLink::Connected {
            return Ok(false);
        }

        let payload = self.encoder.encode(snapshot);
        self.manager.send_notification(&payload)?;
        Ok(true)
    }

    /// Stop advertising if it is wanted; safe to call repeatedly
    ///
    /// # Errors
    ///
    /// Returns the link manager's error if stopping fails
    pub fn shutdown(&self) -> Result<()> {
        if self.lock().wants_advertising {
            self.stop_advertising()?;
        }
        Ok(())
    }
}

impl SnapshotSink for LinkCoordinator {
    fn on_snapshot(&self, snapshot: &TelemetrySnapshot) {
        if let Err(e) = self.publish(snapshot) {
            warn!("Failed to send notification: {}", e);
        }
    }
}
