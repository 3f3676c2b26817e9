//! Trait abstraction for the wireless link manager to enable testing

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::LinkEvent;
use crate::error::{BridgeError, Result};
use crate::ftms::protocol::{FTMS_ROWER_DATA_UUID, FTMS_SERVICE_UUID};

/// Operations the bridge needs from the wireless stack
///
/// Implementations own pairing, advertising and connection handling and
/// report connect/disconnect through [`LinkEvent`]s.
#[cfg_attr(test, mockall::automock)]
pub trait LinkManager: Send + Sync {
    /// Begin advertising the fitness machine service
    fn start_advertising(&self) -> Result<()>;

    /// Stop advertising
    fn stop_advertising(&self) -> Result<()>;

    /// Push one notification payload to the connected client
    fn send_notification(&self, payload: &[u8]) -> Result<()>;
}

/// Link manager that only logs what a platform stack would do
///
/// Stands in for a real BLE peripheral stack: advertising requests and
/// notifications are logged, and connection events are injected through
/// [`LoggingLinkManager::emit`].
#[derive(Debug)]
pub struct LoggingLinkManager {
    device_name: String,
    advertising: AtomicBool,
    notifications: AtomicU64,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl LoggingLinkManager {
    /// Create the manager and the receiving end of its event channel
    pub fn new(device_name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let manager = Self {
            device_name: device_name.into(),
            advertising: AtomicBool::new(false),
            notifications: AtomicU64::new(0),
            events,
        };
        (manager, receiver)
    }

    /// Forward a link event to the coordinator's event loop
    ///
    /// # Errors
    ///
    /// Returns `LinkManager` error if the event loop has gone away
    pub fn emit(&self, event: LinkEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|e| BridgeError::LinkManager(format!("Event loop closed: {}", e)))
    }

    /// Whether advertising is currently on
    pub fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::Relaxed)
    }

    /// Number of notifications pushed so far
    pub fn notification_count(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Advertised device name
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl LinkManager for LoggingLinkManager {
    fn start_advertising(&self) -> Result<()> {
        if !self.advertising.swap(true, Ordering::Relaxed) {
            info!(
                "Advertising FTMS rower as {:?} (service 0x{:04X}, rower data 0x{:04X})",
                self.device_name, FTMS_SERVICE_UUID, FTMS_ROWER_DATA_UUID
            );
        }
        Ok(())
    }

    fn stop_advertising(&self) -> Result<()> {
        if self.advertising.swap(false, Ordering::Relaxed) {
            info!("Stopped advertising");
        }
        Ok(())
    }

    fn send_notification(&self, payload: &[u8]) -> Result<()> {
        self.notifications.fetch_add(1, Ordering::Relaxed);
        debug!("Rower Data notification ({} bytes): {:02X?}", payload.len(), payload);
        Ok(())
    }
}
