//! # FDF Console Protocol Constants and Types
//!
//! Core definitions for the line-oriented ASCII telemetry emitted by First
//! Degree Fitness rowing consoles, e.g.
//!
//! ```text
//! STROKES:123 TIME:12:34 DISTANCE:5000 RATE:24 POWER:150 CALORIES:200
//! ```

use serde::Serialize;

/// Line buffer capacity in bytes
pub const FDF_LINE_BUFFER_CAPACITY: usize = 1024;

/// Separator between a key and its value inside a token
pub const FDF_KEY_VALUE_SEPARATOR: char = ':';

/// Separator between minutes and seconds in `MM:SS` values
pub const FDF_TIME_SEPARATOR: char = ':';

/// Recognized telemetry keys.
///
/// Each metric accepts one or more spellings; matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKey {
    StrokeCount,
    ElapsedTime,
    Distance,
    StrokeRate,
    AvgStrokeRate,
    Power,
    AvgPower,
    Calories,
    Pace,
    AvgPace,
}

/// Alias table: console spelling -> metric
pub const FDF_KEY_ALIASES: &[(&str, MetricKey)] = &[
    ("STROKES", MetricKey::StrokeCount),
    ("STROKE", MetricKey::StrokeCount),
    ("TIME", MetricKey::ElapsedTime),
    ("DISTANCE", MetricKey::Distance),
    ("DIST", MetricKey::Distance),
    ("RATE", MetricKey::StrokeRate),
    ("SPM", MetricKey::StrokeRate),
    ("AVGRATE", MetricKey::AvgStrokeRate),
    ("AVG_RATE", MetricKey::AvgStrokeRate),
    ("POWER", MetricKey::Power),
    ("WATTS", MetricKey::Power),
    ("AVGPOWER", MetricKey::AvgPower),
    ("AVG_POWER", MetricKey::AvgPower),
    ("CALORIES", MetricKey::Calories),
    ("CAL", MetricKey::Calories),
    ("PACE", MetricKey::Pace),
    ("AVGPACE", MetricKey::AvgPace),
    ("AVG_PACE", MetricKey::AvgPace),
];

impl MetricKey {
    /// Look up a console key in the alias table
    ///
    /// # Examples
    ///
    /// ```
    /// use fdf_bridge::fdf::protocol::MetricKey;
    ///
    /// assert_eq!(MetricKey::from_key("SPM"), Some(MetricKey::StrokeRate));
    /// assert_eq!(MetricKey::from_key("spm"), None);
    /// ```
    pub fn from_key(key: &str) -> Option<Self> {
        FDF_KEY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|&(_, metric)| metric)
    }

    /// Whether the value is written as `MM:SS` rather than a plain integer
    pub fn is_duration(self) -> bool {
        matches!(self, MetricKey::ElapsedTime | MetricKey::Pace | MetricKey::AvgPace)
    }
}

/// Latest known rowing metrics.
///
/// Fields not mentioned by a console line keep their previous value; the
/// whole structure is only zeroed by an explicit session reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    /// Cumulative strokes this session
    pub stroke_count: u16,

    /// Session elapsed time in milliseconds
    pub elapsed_time_ms: u32,

    /// Cumulative distance in meters
    pub distance_m: u32,

    /// Instantaneous strokes per minute
    pub stroke_rate: u16,

    /// Average strokes per minute
    pub avg_stroke_rate: u16,

    /// Instantaneous power in watts
    pub power_watts: u16,

    /// Average power in watts
    pub avg_power_watts: u16,

    /// Cumulative energy in kcal
    pub calories: u16,

    /// Instantaneous pace per 500 m in milliseconds
    ///
    /// 32 bits wide: 16-bit milliseconds top out at 1:05/500 m.
    pub pace_500m_ms: u32,

    /// Average pace per 500 m in milliseconds, same width as `pace_500m_ms`
    pub avg_pace_500m_ms: u32,

    /// True once a positive stroke count or distance has been observed
    pub session_active: bool,
}

impl TelemetrySnapshot {
    /// Whether these metrics should activate the session
    pub fn shows_activity(&self) -> bool {
        self.stroke_count > 0 || self.distance_m > 0
    }
}

/// Field values recognized in one console line.
///
/// `None` means the line did not (validly) mention the metric, so the
/// snapshot keeps its previous value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotUpdate {
    pub stroke_count: Option<u16>,
    pub elapsed_time_ms: Option<u32>,
    pub distance_m: Option<u32>,
    pub stroke_rate: Option<u16>,
    pub avg_stroke_rate: Option<u16>,
    pub power_watts: Option<u16>,
    pub avg_power_watts: Option<u16>,
    pub calories: Option<u16>,
    pub pace_500m_ms: Option<u32>,
    pub avg_pace_500m_ms: Option<u32>,
}

impl SnapshotUpdate {
    /// Whether the line carried no recognized metric
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the fields present in this update, leave the rest untouched
    pub fn apply_to(&self, snapshot: &mut TelemetrySnapshot) {
        fn merge<T: Copy>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        merge(&mut snapshot.stroke_count, self.stroke_count);
        merge(&mut snapshot.elapsed_time_ms, self.elapsed_time_ms);
        merge(&mut snapshot.distance_m, self.distance_m);
        merge(&mut snapshot.stroke_rate, self.stroke_rate);
        merge(&mut snapshot.avg_stroke_rate, self.avg_stroke_rate);
        merge(&mut snapshot.power_watts, self.power_watts);
        merge(&mut snapshot.avg_power_watts, self.avg_power_watts);
        merge(&mut snapshot.calories, self.calories);
        merge(&mut snapshot.pace_500m_ms, self.pace_500m_ms);
        merge(&mut snapshot.avg_pace_500m_ms, self.avg_pace_500m_ms);
    }
}
