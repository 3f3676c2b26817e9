//! # FDF Line Parser
//!
//! Turns one complete console line into a [`SnapshotUpdate`], merges it into
//! the session snapshot and publishes the result to every registered
//! [`SnapshotSink`].
//!
//! Tokens are `KEY:VALUE` pairs separated by whitespace. Anything that does
//! not parse is dropped on its own; the rest of the line still applies.

use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use super::protocol::{
    MetricKey, SnapshotUpdate, TelemetrySnapshot, FDF_KEY_VALUE_SEPARATOR, FDF_TIME_SEPARATOR,
};
use crate::session::SessionController;

/// Consumer of published snapshots
pub trait SnapshotSink: Send + Sync {
    /// Called with a copy of the snapshot after every parsed line
    fn on_snapshot(&self, snapshot: &TelemetrySnapshot);
}

/// Parse a single console line into the metrics it mentions
///
/// Later occurrences of the same metric override earlier ones.
///
/// # Examples
///
/// ```
/// use fdf_bridge::fdf::parser::parse_line;
///
/// let update = parse_line("STROKES:10 TIME:01:30 BOGUS RATE:abc");
/// assert_eq!(update.stroke_count, Some(10));
/// assert_eq!(update.elapsed_time_ms, Some(90_000));
/// assert_eq!(update.stroke_rate, None);
/// ```
pub fn parse_line(line: &str) -> SnapshotUpdate {
    let mut update = SnapshotUpdate::default();

    for token in line.split_whitespace() {
        let Some((key, value)) = token.split_once(FDF_KEY_VALUE_SEPARATOR) else {
            continue;
        };

        let Some(metric) = MetricKey::from_key(key) else {
            debug!("Ignoring unknown key {:?}", key);
            continue;
        };

        if !apply_token(&mut update, metric, value) {
            debug!("Dropping malformed token {:?}", token);
        }
    }

    update
}

/// Store one value into `update`, returns `false` if the value is malformed
fn apply_token(update: &mut SnapshotUpdate, metric: MetricKey, value: &str) -> bool {
    if metric.is_duration() {
        let Some(ms) = parse_duration_ms(value) else {
            return false;
        };

        match metric {
            MetricKey::ElapsedTime => update.elapsed_time_ms = Some(ms),
            MetricKey::Pace => update.pace_500m_ms = Some(ms),
            _ => update.avg_pace_500m_ms = Some(ms),
        }
        return true;
    }

    if metric == MetricKey::Distance {
        return parse_decimal(value).map(|v| update.distance_m = Some(v)).is_some();
    }

    let Some(v) = parse_decimal::<u16>(value) else {
        return false;
    };

    let slot = match metric {
        MetricKey::StrokeCount => &mut update.stroke_count,
        MetricKey::StrokeRate => &mut update.stroke_rate,
        MetricKey::AvgStrokeRate => &mut update.avg_stroke_rate,
        MetricKey::Power => &mut update.power_watts,
        MetricKey::AvgPower => &mut update.avg_power_watts,
        MetricKey::Calories => &mut update.calories,
        MetricKey::ElapsedTime | MetricKey::Pace | MetricKey::AvgPace | MetricKey::Distance => {
            return false;
        }
    };
    *slot = Some(v);
    true
}

/// Parse a value made only of ASCII digits
///
/// `str::parse` would also take a leading `+`, which the console never sends.
fn parse_decimal<T: FromStr>(value: &str) -> Option<T> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Parse an `MM:SS` value into milliseconds
///
/// Both parts must be plain unsigned decimal integers. Minutes may exceed 59
/// (long sessions); values that overflow 32-bit milliseconds are rejected.
///
/// # Examples
///
/// ```
/// use fdf_bridge::fdf::parser::parse_duration_ms;
///
/// assert_eq!(parse_duration_ms("01:30"), Some(90_000));
/// assert_eq!(parse_duration_ms("1:3x"), None);
/// ```
pub fn parse_duration_ms(value: &str) -> Option<u32> {
    let (minutes, seconds) = value.split_once(FDF_TIME_SEPARATOR)?;
    let minutes: u32 = parse_decimal(minutes)?;
    let seconds: u32 = parse_decimal(seconds)?;

    minutes
        .checked_mul(60)?
        .checked_add(seconds)?
        .checked_mul(1000)
}

/// Applies console lines to the session and fans the result out to sinks
pub struct TelemetryParser {
    session: Arc<SessionController>,
    sinks: Vec<Arc<dyn SnapshotSink>>,
}

impl std::fmt::Debug for TelemetryParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryParser")
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

impl TelemetryParser {
    /// Create a parser bound to a session and a fixed set of consumers
    pub fn new(session: Arc<SessionController>, sinks: Vec<Arc<dyn SnapshotSink>>) -> Self {
        Self { session, sinks }
    }

    /// Parse one complete line, merge it and publish the merged snapshot
    ///
    /// # Returns
    ///
    /// * `TelemetrySnapshot` - The snapshot as published
    pub fn parse(&self, line: &str) -> TelemetrySnapshot {
        debug!("Parsing line: {}", line);

        let update = parse_line(line);
        let snapshot = self.session.merge(&update);

        for sink in &self.sinks {
            sink.on_snapshot(&snapshot);
        }

        snapshot
    }

    /// Parse a raw line as delivered by the reassembler
    ///
    /// Invalid UTF-8 sequences are replaced, so they can never match a key.
    pub fn parse_bytes(&self, line: &[u8]) -> TelemetrySnapshot {
        self.parse(&String::from_utf8_lossy(line))
    }

    /// Drop every registered consumer
    pub fn clear_sinks(&mut self) {
        self.sinks.clear();
    }

    /// Number of registered consumers
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<TelemetrySnapshot>>,
    }

    impl SnapshotSink for RecordingSink {
        fn on_snapshot(&self, snapshot: &TelemetrySnapshot) {
            self.published.lock().unwrap().push(*snapshot);
        }
    }

    fn parser_with_sink() -> (TelemetryParser, Arc<SessionController>, Arc<RecordingSink>) {
        let session = Arc::new(SessionController::new());
        let sink = Arc::new(RecordingSink::default());
        let parser = TelemetryParser::new(Arc::clone(&session), vec![sink.clone() as Arc<dyn SnapshotSink>]);
        (parser, session, sink)
    }

    #[test]
    fn test_parse_full_console_line() {
        let (parser, _, _) = parser_with_sink();
        let snapshot =
            parser.parse("STROKES:10 TIME:01:30 DISTANCE:500 RATE:20 POWER:150 CALORIES:25");

        assert_eq!(snapshot.stroke_count, 10);
        assert_eq!(snapshot.elapsed_time_ms, 90_000);
        assert_eq!(snapshot.distance_m, 500);
        assert_eq!(snapshot.stroke_rate, 20);
        assert_eq!(snapshot.power_watts, 150);
        assert_eq!(snapshot.calories, 25);
        assert!(snapshot.session_active);
    }

    #[test]
    fn test_parse_aliases_and_averages() {
        let update = parse_line(
            "STROKE:3 DIST:40 SPM:22 WATTS:180 CAL:4 AVG_RATE:21 AVGPOWER:170 PACE:02:05 AVG_PACE:2:10",
        );

        assert_eq!(update.stroke_count, Some(3));
        assert_eq!(update.distance_m, Some(40));
        assert_eq!(update.stroke_rate, Some(22));
        assert_eq!(update.power_watts, Some(180));
        assert_eq!(update.calories, Some(4));
        assert_eq!(update.avg_stroke_rate, Some(21));
        assert_eq!(update.avg_power_watts, Some(170));
        assert_eq!(update.pace_500m_ms, Some(125_000));
        assert_eq!(update.avg_pace_500m_ms, Some(130_000));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let update = parse_line("RATE:10 RATE:20");
        assert_eq!(update.stroke_rate, Some(20));

        let update = parse_line("SPM:10 RATE:30");
        assert_eq!(update.stroke_rate, Some(30));
    }

    #[test]
    fn test_malformed_token_leaves_field_unchanged() {
        let (parser, session, _) = parser_with_sink();
        parser.parse("STROKES:7");

        let snapshot = parser.parse("STROKES:abc DISTANCE:100");

        assert_eq!(snapshot.distance_m, 100);
        assert_eq!(snapshot.stroke_count, 7);
        assert_eq!(session.snapshot().stroke_count, 7);
    }

    #[test]
    fn test_trailing_garbage_invalidates_token() {
        let update = parse_line("STROKES:12x POWER:150W DISTANCE:10");
        assert_eq!(update.stroke_count, None);
        assert_eq!(update.power_watts, None);
        assert_eq!(update.distance_m, Some(10));
    }

    #[test]
    fn test_negative_and_out_of_range_values_dropped() {
        let update = parse_line("STROKES:-1 RATE:70000 DISTANCE:4294967296");
        assert!(update.is_empty());
    }

    #[test]
    fn test_signed_values_dropped() {
        let update = parse_line("STROKES:+7 TIME:+1:30 POWER:120");
        assert_eq!(update.stroke_count, None);
        assert_eq!(update.elapsed_time_ms, None);
        assert_eq!(update.power_watts, Some(120));
    }

    #[test]
    fn test_tokens_without_colon_ignored() {
        let update = parse_line("HELLO ROWER STROKES:2");
        assert_eq!(update.stroke_count, Some(2));
    }

    #[test]
    fn test_unknown_and_lowercase_keys_ignored() {
        let update = parse_line("HR:140 strokes:5 Distance:10");
        assert!(update.is_empty());
    }

    #[test]
    fn test_tabs_and_repeated_spaces() {
        let update = parse_line("  STROKES:4\t\tDISTANCE:20   ");
        assert_eq!(update.stroke_count, Some(4));
        assert_eq!(update.distance_m, Some(20));
    }

    #[test]
    fn test_parse_duration_ms() {
        assert_eq!(parse_duration_ms("00:00"), Some(0));
        assert_eq!(parse_duration_ms("12:34"), Some(754_000));
        assert_eq!(parse_duration_ms("90:05"), Some(5_405_000));
        assert_eq!(parse_duration_ms("1:30"), Some(90_000));
    }

    #[test]
    fn test_parse_duration_malformed() {
        assert_eq!(parse_duration_ms("90"), None);
        assert_eq!(parse_duration_ms(":30"), None);
        assert_eq!(parse_duration_ms("01:"), None);
        assert_eq!(parse_duration_ms("01:30:00"), None);
        assert_eq!(parse_duration_ms("aa:bb"), None);
        assert_eq!(parse_duration_ms("-1:30"), None);
        assert_eq!(parse_duration_ms("99999999:00"), None);
    }

    #[test]
    fn test_malformed_time_dropped_silently() {
        let (parser, _, _) = parser_with_sink();
        parser.parse("TIME:02:00");
        let snapshot = parser.parse("TIME:2m STROKES:1");

        assert_eq!(snapshot.elapsed_time_ms, 120_000);
        assert_eq!(snapshot.stroke_count, 1);
    }

    #[test]
    fn test_fields_persist_across_lines() {
        let (parser, _, _) = parser_with_sink();
        parser.parse("STROKES:10 POWER:150");
        let snapshot = parser.parse("DISTANCE:60");

        assert_eq!(snapshot.stroke_count, 10);
        assert_eq!(snapshot.power_watts, 150);
        assert_eq!(snapshot.distance_m, 60);
    }

    #[test]
    fn test_zero_line_does_not_activate() {
        let (parser, session, _) = parser_with_sink();
        let snapshot = parser.parse("STROKES:0 TIME:00:00 DISTANCE:0 RATE:0 POWER:0 CALORIES:0");

        assert!(!snapshot.session_active);
        assert!(!session.is_active());
    }

    #[test]
    fn test_every_line_is_published() {
        let (parser, _, sink) = parser_with_sink();
        parser.parse("STROKES:1");
        parser.parse("NOTHING USEFUL");
        parser.parse("STROKES:2");

        let published = sink.published.lock().unwrap();
        assert_eq!(published.len(), 3);
        assert_eq!(published[1].stroke_count, 1);
        assert_eq!(published[2].stroke_count, 2);
    }

    #[test]
    fn test_clear_sinks_stops_publishing() {
        let (mut parser, _, sink) = parser_with_sink();
        assert_eq!(parser.sink_count(), 1);
        parser.clear_sinks();
        parser.parse("STROKES:1");

        assert_eq!(parser.sink_count(), 0);
        assert!(sink.published.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parse_bytes_with_invalid_utf8() {
        let (parser, _, _) = parser_with_sink();
        let snapshot = parser.parse_bytes(b"STROKES:\xFF5 DISTANCE:30");

        assert_eq!(snapshot.stroke_count, 0);
        assert_eq!(snapshot.distance_m, 30);
    }
}
