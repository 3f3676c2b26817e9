//! # Session Controller
//!
//! Sole owner of the [`TelemetrySnapshot`]. Every read and write goes through
//! one mutex held only for the duration of the copy or merge, so the parsing
//! path, the link coordinator and the status task can share it freely.
//!
//! Session lifecycle: `Inactive -> Active -> (reset) -> Inactive`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::fdf::protocol::{SnapshotUpdate, TelemetrySnapshot};

#[derive(Debug, Default)]
struct SessionState {
    snapshot: TelemetrySnapshot,
    started_at: Option<DateTime<Utc>>,
}

/// Owns the canonical snapshot and its activation/reset lifecycle
#[derive(Debug, Default)]
pub struct SessionController {
    state: Mutex<SessionState>,
}

impl SessionController {
    /// Create an inactive session with a zeroed snapshot
    pub fn new() -> Self {
        Self::default()
    }

    // The guarded state is plain data that is never left half-written,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy out the current snapshot
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.lock().snapshot
    }

    /// Copy out the current snapshot if a session is active
    pub fn current(&self) -> Option<TelemetrySnapshot> {
        let state = self.lock();
        state.snapshot.session_active.then_some(state.snapshot)
    }

    /// Merge a parsed line into the snapshot
    ///
    /// Fields present in `update` overwrite the snapshot; absent fields keep
    /// their value. If the merged metrics show a positive stroke count or
    /// distance, the session is activated (idempotent).
    ///
    /// # Returns
    ///
    /// * `TelemetrySnapshot` - Copy of the snapshot after the merge
    ///
    /// # Examples
    ///
    /// ```
    /// use fdf_bridge::fdf::protocol::SnapshotUpdate;
    /// use fdf_bridge::session::SessionController;
    ///
    /// let session = SessionController::new();
    /// let merged = session.merge(&SnapshotUpdate { distance_m: Some(25), ..Default::default() });
    /// assert!(merged.session_active);
    /// ```
    pub fn merge(&self, update: &SnapshotUpdate) -> TelemetrySnapshot {
        let mut state = self.lock();
        update.apply_to(&mut state.snapshot);

        if state.snapshot.shows_activity() {
            Self::activate_locked(&mut state);
        }

        state.snapshot
    }

    /// Mark the session active
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if this call performed the `Inactive -> Active` transition
    pub fn activate(&self) -> bool {
        Self::activate_locked(&mut self.lock())
    }

    fn activate_locked(state: &mut SessionState) -> bool {
        if state.snapshot.session_active {
            return false;
        }

        let now = Utc::now();
        state.snapshot.session_active = true;
        state.started_at = Some(now);
        info!("Rowing session started at {}", now.to_rfc3339());
        true
    }

    /// Zero the snapshot and return to `Inactive`
    ///
    /// Safe to call at any time, including when already inactive.
    pub fn reset(&self) {
        let mut state = self.lock();
        if state.snapshot.session_active {
            info!("Resetting rowing session");
        }
        *state = SessionState::default();
    }

    /// Whether a session is currently active
    pub fn is_active(&self) -> bool {
        self.lock().snapshot.session_active
    }

    /// When the current session was activated
    pub fn session_started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn strokes(count: u16) -> SnapshotUpdate {
        SnapshotUpdate {
            stroke_count: Some(count),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_session_is_inactive() {
        let session = SessionController::new();
        assert!(!session.is_active());
        assert_eq!(session.snapshot(), TelemetrySnapshot::default());
        assert!(session.current().is_none());
        assert!(session.session_started_at().is_none());
    }

    #[test]
    fn test_zero_metrics_do_not_activate() {
        let session = SessionController::new();
        let merged = session.merge(&SnapshotUpdate {
            stroke_count: Some(0),
            distance_m: Some(0),
            power_watts: Some(90),
            ..Default::default()
        });

        assert!(!merged.session_active);
        assert_eq!(merged.power_watts, 90);
        assert!(session.current().is_none());
    }

    #[test]
    fn test_first_activity_latches_start_time() {
        let session = SessionController::new();
        session.merge(&strokes(1));
        let started = session.session_started_at();
        assert!(started.is_some());

        session.merge(&strokes(2));
        assert_eq!(session.session_started_at(), started);
        assert_eq!(session.snapshot().stroke_count, 2);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let session = SessionController::new();
        assert!(session.activate());
        let started = session.session_started_at();

        assert!(!session.activate());
        assert_eq!(session.session_started_at(), started);
    }

    #[test]
    fn test_reset_clears_everything() {
        let session = SessionController::new();
        session.merge(&strokes(12));
        session.reset();

        assert!(!session.is_active());
        assert_eq!(session.snapshot(), TelemetrySnapshot::default());
        assert!(session.session_started_at().is_none());
    }

    #[test]
    fn test_reset_when_inactive_is_safe() {
        let session = SessionController::new();
        session.reset();
        session.reset();
        assert!(!session.is_active());
    }

    #[test]
    fn test_reset_then_activity_starts_fresh_session() {
        let session = SessionController::new();
        session.merge(&strokes(5));
        let first = session.session_started_at().unwrap();

        session.reset();
        session.merge(&strokes(1));
        let second = session.session_started_at().unwrap();

        assert!(session.is_active());
        assert!(second >= first);
    }

    #[test]
    fn test_activity_stays_latched_when_metrics_drop() {
        let session = SessionController::new();
        session.merge(&strokes(5));
        let merged = session.merge(&strokes(0));

        assert!(merged.session_active);
        assert!(session.current().is_some());
    }

    #[test]
    fn test_concurrent_merges_and_reads() {
        let session = Arc::new(SessionController::new());

        let writers: Vec<_> = (1..=4u16)
            .map(|n| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    for i in 0..250u16 {
                        session.merge(&SnapshotUpdate {
                            stroke_count: Some(n * 1000 + i),
                            distance_m: Some(u32::from(i)),
                            ..Default::default()
                        });
                        let _ = session.snapshot();
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        let snapshot = session.snapshot();
        assert!(snapshot.session_active);
        assert_eq!(snapshot.distance_m, 249);
    }
}
