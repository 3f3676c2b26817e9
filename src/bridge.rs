//! # Bridge Context
//!
//! Owns every component of the telemetry path and wires them together:
//!
//! ```text
//! console bytes -> LineReassembler -> TelemetryParser -> SessionController
//!                                            |
//!                                            +-> LinkCoordinator -> LinkManager
//!                                            +-> SessionRecorder (optional)
//! ```
//!
//! The parsing path (`deliver`) is single-producer and needs `&mut self`;
//! link events and status queries only need `&self`, and the shared session
//! and coordinator are reachable through `Arc`s for other tasks.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::fdf::parser::{SnapshotSink, TelemetryParser};
use crate::fdf::protocol::TelemetrySnapshot;
use crate::fdf::reassembler::LineReassembler;
use crate::ftms::encoder::PacketEncoder;
use crate::ftms::protocol::FieldMask;
use crate::link::manager::LinkManager;
use crate::link::{LinkCoordinator, LinkEvent, LinkStatus};
use crate::session::SessionController;
use crate::telemetry::SessionRecorder;

/// Top-level bridge state
pub struct Bridge {
    session: Arc<SessionController>,
    coordinator: Arc<LinkCoordinator>,
    reassembler: LineReassembler,
    parser: TelemetryParser,
    initialized: bool,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("initialized", &self.initialized)
            .field("coordinator", &self.coordinator)
            .field("reassembler", &self.reassembler)
            .field("parser", &self.parser)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Build a bridge around a link manager
    ///
    /// The coordinator is always the first snapshot consumer; `extra_sinks`
    /// are published to after it, in order.
    ///
    /// # Arguments
    ///
    /// * `mask` - Rower Data fields sent in every notification
    /// * `manager` - Wireless stack used for advertising and notifications
    /// * `extra_sinks` - Additional snapshot consumers
    pub fn new(
        mask: FieldMask,
        manager: Arc<dyn LinkManager>,
        extra_sinks: Vec<Arc<dyn SnapshotSink>>,
    ) -> Self {
        let session = Arc::new(SessionController::new());
        let coordinator = Arc::new(LinkCoordinator::new(manager, PacketEncoder::new(mask)));

        let mut sinks: Vec<Arc<dyn SnapshotSink>> = Vec::with_capacity(extra_sinks.len() + 1);
        sinks.push(coordinator.clone());
        sinks.extend(extra_sinks);

        debug!("Bridge created with field mask 0x{:04X}", mask.bits());

        Self {
            parser: TelemetryParser::new(session.clone(), sinks),
            session,
            coordinator,
            reassembler: LineReassembler::new(),
            initialized: true,
        }
    }

    /// Build a bridge from configuration, attaching the session recorder if enabled
    ///
    /// # Errors
    ///
    /// - `InvalidFieldMask` if the configured raw mask is unusable
    /// - `Io` error if the recorder's log directory cannot be created
    pub fn from_config(config: &Config, manager: Arc<dyn LinkManager>) -> Result<Self> {
        let mut sinks: Vec<Arc<dyn SnapshotSink>> = Vec::new();
        if config.telemetry.enabled {
            sinks.push(Arc::new(SessionRecorder::new(&config.telemetry)?));
        }

        Ok(Self::new(config.ftms.field_mask()?, manager, sinks))
    }

    /// Request advertising so a client can connect
    ///
    /// # Errors
    ///
    /// - `NotInitialized` after `shutdown`
    /// - The link manager's error if advertising could not start
    pub fn start(&self) -> Result<()> {
        if !self.initialized {
            return Err(BridgeError::NotInitialized);
        }
        self.coordinator.start_advertising()
    }

    /// Feed raw console bytes through the parsing path
    ///
    /// # Returns
    ///
    /// * `usize` - Number of complete lines parsed and published
    pub fn deliver(&mut self, bytes: &[u8]) -> usize {
        if !self.initialized {
            return 0;
        }

        let parser = &self.parser;
        self.reassembler.feed(bytes, |line| {
            parser.parse_bytes(line);
        })
    }

    /// Apply a link event from the telemetry driver or the link manager
    ///
    /// # Errors
    ///
    /// Returns the link manager's error if re-advertising failed
    pub fn handle_event(&self, event: &LinkEvent) -> Result<()> {
        self.coordinator.handle(event)
    }

    /// Zero the snapshot, end the session and drop any partial line
    pub fn reset_session(&mut self) {
        self.session.reset();
        self.reassembler.reset();
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.session.snapshot()
    }

    /// Current state of both links
    pub fn status(&self) -> LinkStatus {
        self.coordinator.status()
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<LinkCoordinator> {
        &self.coordinator
    }

    /// Lines dropped because they outgrew the line buffer
    pub fn overflow_count(&self) -> u64 {
        self.reassembler.overflow_count()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Tear down in reverse order of construction
    ///
    /// Stops advertising if it was wanted, unregisters every consumer and
    /// drops any partial line. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the link manager's error if stopping advertising failed; the
    /// rest of the teardown still happens.
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }

        info!("Shutting down bridge");
        let result = self.coordinator.shutdown();

        self.parser.clear_sinks();
        self.reassembler.reset();
        self.initialized = false;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftms::protocol::RowerField;
    use crate::link::manager::MockLinkManager;
    use crate::link::WirelessLink;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        snapshots: Mutex<Vec<TelemetrySnapshot>>,
    }

    impl SnapshotSink for CollectingSink {
        fn on_snapshot(&self, snapshot: &TelemetrySnapshot) {
            self.snapshots.lock().unwrap().push(*snapshot);
        }
    }

    fn advertising_mock() -> MockLinkManager {
        let mut mock = MockLinkManager::new();
        mock.expect_start_advertising().returning(|| Ok(()));
        mock.expect_stop_advertising().returning(|| Ok(()));
        mock
    }

    #[test]
    fn test_deliver_merges_lines_across_chunks() {
        let mut bridge = Bridge::new(FieldMask::ROWER, Arc::new(MockLinkManager::new()), vec![]);

        assert_eq!(bridge.deliver(b"STROKES:10 DIS"), 0);
        assert_eq!(bridge.deliver(b"TANCE:500\r\nTIME:01:30\n"), 2);

        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.stroke_count, 10);
        assert_eq!(snapshot.distance_m, 500);
        assert_eq!(snapshot.elapsed_time_ms, 90_000);
        assert!(snapshot.session_active);
    }

    #[test]
    fn test_every_sink_sees_every_line() {
        let sink = Arc::new(CollectingSink::default());
        let mut bridge = Bridge::new(
            FieldMask::ROWER,
            Arc::new(MockLinkManager::new()),
            vec![sink.clone()],
        );

        bridge.deliver(b"STROKES:1\nGARBAGE\nRATE:24\n");

        let seen = sink.snapshots.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].stroke_count, 1);
        assert_eq!(seen[1], seen[0]);
        assert_eq!(seen[2].stroke_rate, 24);
    }

    #[test]
    fn test_notifications_only_while_connected() {
        let mask = FieldMask::from_fields(&[RowerField::TotalDistance]);
        let mut mock = advertising_mock();
        mock.expect_send_notification()
            .withf(|payload: &[u8]| payload == &[0x04u8, 0x00, 0xF4, 0x01, 0x00][..])
            .times(1)
            .returning(|_| Ok(()));
        let mut bridge = Bridge::new(mask, Arc::new(mock), vec![]);

        bridge.start().unwrap();
        bridge.deliver(b"DISTANCE:250\n");

        bridge.handle_event(&LinkEvent::WirelessConnected).unwrap();
        bridge.deliver(b"DISTANCE:500\n");

        bridge.handle_event(&LinkEvent::WirelessDisconnected).unwrap();
        bridge.deliver(b"DISTANCE:750\n");

        assert_eq!(bridge.status().wireless, WirelessLink::Advertising);
        assert_eq!(bridge.snapshot().distance_m, 750);
    }

    #[test]
    fn test_reset_session_clears_partial_line() {
        let mut bridge = Bridge::new(FieldMask::ROWER, Arc::new(MockLinkManager::new()), vec![]);

        bridge.deliver(b"STROKES:5\nSTROKES:9");
        bridge.reset_session();
        bridge.deliver(b"\nTIME:00:10\n");

        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.stroke_count, 0);
        assert_eq!(snapshot.elapsed_time_ms, 10_000);
        assert!(!snapshot.session_active);
        assert!(bridge.session().session_started_at().is_none());
    }

    #[test]
    fn test_overflow_is_counted_and_recovered() {
        let mut bridge = Bridge::new(FieldMask::ROWER, Arc::new(MockLinkManager::new()), vec![]);

        bridge.deliver(&[b'X'; 2000]);
        assert_eq!(bridge.overflow_count(), 1);

        bridge.deliver(b"\nSTROKES:3\n");
        assert_eq!(bridge.snapshot().stroke_count, 3);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut mock = MockLinkManager::new();
        mock.expect_start_advertising().times(1).returning(|| Ok(()));
        mock.expect_stop_advertising().times(1).returning(|| Ok(()));
        let sink = Arc::new(CollectingSink::default());
        let mut bridge = Bridge::new(FieldMask::ROWER, Arc::new(mock), vec![sink.clone()]);

        bridge.start().unwrap();
        bridge.shutdown().unwrap();
        bridge.shutdown().unwrap();

        assert!(!bridge.is_initialized());
        assert_eq!(bridge.deliver(b"STROKES:1\n"), 0);
        assert!(sink.snapshots.lock().unwrap().is_empty());
        assert!(matches!(bridge.start(), Err(BridgeError::NotInitialized)));
    }

    #[test]
    fn test_shutdown_without_advertising() {
        let mut bridge = Bridge::new(FieldMask::ROWER, Arc::new(MockLinkManager::new()), vec![]);
        bridge.shutdown().unwrap();
        assert!(!bridge.is_initialized());
    }

    #[test]
    fn test_shutdown_reports_stop_failure() {
        let mut mock = MockLinkManager::new();
        mock.expect_start_advertising().returning(|| Ok(()));
        mock.expect_stop_advertising()
            .times(1)
            .returning(|| Err(BridgeError::LinkManager("stack down".to_string())));
        let mut bridge = Bridge::new(FieldMask::ROWER, Arc::new(mock), vec![]);

        bridge.start().unwrap();
        assert!(bridge.shutdown().is_err());
        assert!(!bridge.is_initialized());
        assert!(bridge.shutdown().is_ok());
    }

    #[test]
    fn test_from_config_attaches_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.telemetry.enabled = true;
        config.telemetry.log_interval_ms = 0;
        config.telemetry.log_dir = dir.path().to_string_lossy().into_owned();

        let mut bridge = Bridge::from_config(&config, Arc::new(MockLinkManager::new())).unwrap();
        bridge.deliver(b"STROKES:4\n");
        drop(bridge);

        let files = crate::telemetry::recorder::record_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        let contents = std::fs::read_to_string(&files[0]).unwrap();
        assert!(contents.contains("\"stroke_count\":4"));
    }

    #[test]
    fn test_deliver_while_client_flaps() {
        let mut mock = MockLinkManager::new();
        mock.expect_start_advertising().returning(|| Ok(()));
        mock.expect_send_notification().returning(|_| Ok(()));
        let mut bridge = Bridge::new(FieldMask::ROWER, Arc::new(mock), vec![]);

        let coordinator = bridge.coordinator().clone();
        let flapping = std::thread::spawn(move || {
            for _ in 0..500 {
                coordinator.on_wireless_client_connected();
                coordinator.on_wireless_client_disconnected().unwrap();
            }
        });

        for i in 1..=500 {
            bridge.deliver(format!("STROKES:{}\n", i).as_bytes());
        }
        flapping.join().unwrap();

        assert_eq!(bridge.snapshot().stroke_count, 500);
        assert_eq!(bridge.status().wireless, WirelessLink::Advertising);
    }
}
