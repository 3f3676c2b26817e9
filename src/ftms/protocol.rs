//! # FTMS Protocol Constants and Types
//!
//! Flag vocabulary of the Fitness Machine Service data characteristic used
//! by the bridge, and the [`FieldMask`] that selects which optional fields a
//! notification carries.

use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// Fitness Machine Service UUID (16-bit)
pub const FTMS_SERVICE_UUID: u16 = 0x1826;

/// Rower Data characteristic UUID (16-bit)
pub const FTMS_ROWER_DATA_UUID: u16 = 0x2AD1;

pub const FTMS_FLAG_MORE_DATA: u16 = 0x0001;
pub const FTMS_FLAG_AVG_SPEED_PRESENT: u16 = 0x0002;
pub const FTMS_FLAG_TOTAL_DISTANCE_PRESENT: u16 = 0x0004;
pub const FTMS_FLAG_INCLINATION_PRESENT: u16 = 0x0008;
pub const FTMS_FLAG_ELEVATION_GAIN_PRESENT: u16 = 0x0010;
pub const FTMS_FLAG_INSTANTANEOUS_PACE_PRESENT: u16 = 0x0020;
pub const FTMS_FLAG_AVERAGE_PACE_PRESENT: u16 = 0x0040;
pub const FTMS_FLAG_EXPANDED_ENERGY_PRESENT: u16 = 0x0080;
pub const FTMS_FLAG_HEART_RATE_PRESENT: u16 = 0x0100;
pub const FTMS_FLAG_METABOLIC_EQUIVALENT_PRESENT: u16 = 0x0200;
pub const FTMS_FLAG_ELAPSED_TIME_PRESENT: u16 = 0x0400;
pub const FTMS_FLAG_REMAINING_TIME_PRESENT: u16 = 0x0800;
pub const FTMS_FLAG_FORCE_ON_BELT_PRESENT: u16 = 0x1000;
pub const FTMS_FLAG_POWER_OUTPUT_PRESENT: u16 = 0x2000;
pub const FTMS_FLAG_SPEED_PRESENT: u16 = 0x4000;
pub const FTMS_FLAG_STEP_RATE_PRESENT: u16 = 0x8000;

/// Flags the bridge can fill from console telemetry
pub const FTMS_INDOOR_ROWER_FLAGS: u16 = FTMS_FLAG_TOTAL_DISTANCE_PRESENT
    | FTMS_FLAG_INSTANTANEOUS_PACE_PRESENT
    | FTMS_FLAG_AVERAGE_PACE_PRESENT
    | FTMS_FLAG_EXPANDED_ENERGY_PRESENT
    | FTMS_FLAG_ELAPSED_TIME_PRESENT
    | FTMS_FLAG_POWER_OUTPUT_PRESENT
    | FTMS_FLAG_STEP_RATE_PRESENT;

/// Size of the flags header in bytes
pub const FTMS_FLAGS_SIZE: usize = 2;

/// "Data not available" sentinel for 16-bit energy rate fields
pub const FTMS_ENERGY_PER_HOUR_UNAVAILABLE: u16 = 0xFFFF;

/// "Data not available" sentinel for the 8-bit energy per minute field
pub const FTMS_ENERGY_PER_MINUTE_UNAVAILABLE: u8 = 0xFF;

/// Largest value of a 24-bit distance field
pub const FTMS_DISTANCE_MAX: u32 = 0x00FF_FFFF;

/// Optional data fields, in wire order (ascending flag bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowerField {
    TotalDistance,
    InstantaneousPace,
    AveragePace,
    ExpandedEnergy,
    ElapsedTime,
    PowerOutput,
    StepRate,
}

impl RowerField {
    /// All supported fields in wire order
    pub const ALL: [RowerField; 7] = [
        RowerField::TotalDistance,
        RowerField::InstantaneousPace,
        RowerField::AveragePace,
        RowerField::ExpandedEnergy,
        RowerField::ElapsedTime,
        RowerField::PowerOutput,
        RowerField::StepRate,
    ];

    /// Flag bit announcing this field
    pub fn flag(self) -> u16 {
        match self {
            RowerField::TotalDistance => FTMS_FLAG_TOTAL_DISTANCE_PRESENT,
            RowerField::InstantaneousPace => FTMS_FLAG_INSTANTANEOUS_PACE_PRESENT,
            RowerField::AveragePace => FTMS_FLAG_AVERAGE_PACE_PRESENT,
            RowerField::ExpandedEnergy => FTMS_FLAG_EXPANDED_ENERGY_PRESENT,
            RowerField::ElapsedTime => FTMS_FLAG_ELAPSED_TIME_PRESENT,
            RowerField::PowerOutput => FTMS_FLAG_POWER_OUTPUT_PRESENT,
            RowerField::StepRate => FTMS_FLAG_STEP_RATE_PRESENT,
        }
    }

    /// Encoded payload width in bytes
    pub fn width(self) -> usize {
        match self {
            RowerField::TotalDistance => 3,
            RowerField::ExpandedEnergy => 5,
            _ => 2,
        }
    }
}

/// Set of optional fields present in every notification
///
/// Only flag bits in [`FTMS_INDOOR_ROWER_FLAGS`] can be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMask(u16);

impl Default for FieldMask {
    fn default() -> Self {
        Self::ROWER
    }
}

impl FieldMask {
    /// Every field the console can supply
    pub const ROWER: FieldMask = FieldMask(FTMS_INDOOR_ROWER_FLAGS);

    /// No optional fields (flags header only)
    pub const EMPTY: FieldMask = FieldMask(0);

    /// Build a mask from raw flag bits
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldMask` if any bit has no snapshot source
    ///
    /// # Examples
    ///
    /// ```
    /// use fdf_bridge::ftms::protocol::{FieldMask, FTMS_FLAG_HEART_RATE_PRESENT};
    ///
    /// assert!(FieldMask::from_bits(0x0404).is_ok());
    /// assert!(FieldMask::from_bits(FTMS_FLAG_HEART_RATE_PRESENT).is_err());
    /// ```
    pub fn from_bits(bits: u16) -> Result<Self> {
        if bits & !FTMS_INDOOR_ROWER_FLAGS != 0 {
            return Err(BridgeError::InvalidFieldMask(bits));
        }
        Ok(Self(bits))
    }

    /// Build a mask from a list of fields (order and duplicates are irrelevant)
    pub fn from_fields(fields: &[RowerField]) -> Self {
        Self(fields.iter().fold(0, |bits, field| bits | field.flag()))
    }

    /// Raw flag bits as written to the header
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Whether `field` is selected
    pub fn contains(self, field: RowerField) -> bool {
        self.0 & field.flag() != 0
    }

    /// Selected fields in wire order
    pub fn fields(self) -> impl Iterator<Item = RowerField> {
        RowerField::ALL.into_iter().filter(move |&field| self.contains(field))
    }

    /// Total notification length for this mask, flags included
    pub fn encoded_len(self) -> usize {
        FTMS_FLAGS_SIZE + self.fields().map(RowerField::width).sum::<usize>()
    }
}
