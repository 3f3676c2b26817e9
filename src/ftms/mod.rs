//! # FTMS Protocol Module
//!
//! Bluetooth Fitness Machine Service (FTMS) Rower Data encoding.
//!
//! This module handles:
//! - The flag bit vocabulary of the data characteristic
//! - Selecting optional fields with a fixed field mask
//! - Serializing snapshots into little-endian notification payloads

pub mod protocol;
pub mod encoder;
