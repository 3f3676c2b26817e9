//! # FTMS Rower Data Encoder
//!
//! Encodes a [`TelemetrySnapshot`] into a Rower Data notification payload.
//!
//! ```text
//! | flags (u16) | distance (u24) | pace (u16) | avg pace (u16) | energy (u16 u16 u8) |
//! | elapsed (u16) | power (i16) | stroke rate (u8) stroke count (u8) |
//! ```
//!
//! All integers are little-endian; only fields selected by the mask are
//! written, in ascending flag-bit order.

use super::protocol::*;
use crate::fdf::protocol::TelemetrySnapshot;

/// Encode a snapshot with the given field selection
///
/// Pure and deterministic: the output depends only on `snapshot` and `mask`,
/// and its length only on `mask`.
///
/// # Examples
///
/// ```
/// use fdf_bridge::fdf::protocol::TelemetrySnapshot;
/// use fdf_bridge::ftms::encoder::encode_rower_data;
/// use fdf_bridge::ftms::protocol::{FieldMask, RowerField};
///
/// let snapshot = TelemetrySnapshot { distance_m: 500, ..Default::default() };
/// let mask = FieldMask::from_fields(&[RowerField::TotalDistance]);
/// assert_eq!(encode_rower_data(&snapshot, mask), vec![0x04, 0x00, 0xF4, 0x01, 0x00]);
/// ```
pub fn encode_rower_data(snapshot: &TelemetrySnapshot, mask: FieldMask) -> Vec<u8> {
    let mut packet = Vec::with_capacity(mask.encoded_len());
    packet.extend_from_slice(&mask.bits().to_le_bytes());

    for field in mask.fields() {
        match field {
            RowerField::TotalDistance => {
                let distance = snapshot.distance_m.min(FTMS_DISTANCE_MAX);
                packet.extend_from_slice(&distance.to_le_bytes()[..3]);
            }
            RowerField::InstantaneousPace => {
                packet.extend_from_slice(&pace_seconds(snapshot.pace_500m_ms).to_le_bytes());
            }
            RowerField::AveragePace => {
                packet.extend_from_slice(&pace_seconds(snapshot.avg_pace_500m_ms).to_le_bytes());
            }
            RowerField::ExpandedEnergy => {
                packet.extend_from_slice(&snapshot.calories.to_le_bytes());
                packet.extend_from_slice(&FTMS_ENERGY_PER_HOUR_UNAVAILABLE.to_le_bytes());
                packet.push(FTMS_ENERGY_PER_MINUTE_UNAVAILABLE);
            }
            RowerField::ElapsedTime => {
                let seconds = saturate_u16(snapshot.elapsed_time_ms / 1000);
                packet.extend_from_slice(&seconds.to_le_bytes());
            }
            RowerField::PowerOutput => {
                let watts = i16::try_from(snapshot.power_watts).unwrap_or(i16::MAX);
                packet.extend_from_slice(&watts.to_le_bytes());
            }
            RowerField::StepRate => {
                packet.push(encode_stroke_rate(snapshot.stroke_rate));
                packet.push((snapshot.stroke_count & 0xFF) as u8);
            }
        }
    }

    packet
}

/// Stroke rate in 0.5 strokes/min units, saturating at 255
pub fn encode_stroke_rate(stroke_rate: u16) -> u8 {
    u8::try_from(stroke_rate.saturating_mul(2)).unwrap_or(u8::MAX)
}

/// Pace in whole seconds per 500 m
fn pace_seconds(pace_ms: u32) -> u16 {
    saturate_u16(pace_ms / 1000)
}

fn saturate_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Encoder bound to the field mask chosen at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketEncoder {
    mask: FieldMask,
}

impl PacketEncoder {
    /// Create an encoder for a fixed field mask
    pub fn new(mask: FieldMask) -> Self {
        Self { mask }
    }

    /// The configured field mask
    pub fn mask(&self) -> FieldMask {
        self.mask
    }

    /// Encode a snapshot with the configured mask
    pub fn encode(&self, snapshot: &TelemetrySnapshot) -> Vec<u8> {
        encode_rower_data(snapshot, self.mask)
    }
}
