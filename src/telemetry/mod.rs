//! # Telemetry Module
//!
//! Handles session recording to JSONL files with rotation.
//!
//! This module handles:
//! - Receiving published snapshots as a snapshot sink
//! - Formatting as JSONL (JSON Lines) with a UTC timestamp
//! - Rotating files after N records and retaining only the last M files

pub mod recorder;

pub use recorder::SessionRecorder;
