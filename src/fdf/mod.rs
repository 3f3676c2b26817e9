//! # FDF Console Protocol Module
//!
//! Implementation of the First Degree Fitness console telemetry stream.
//!
//! This module handles:
//! - Reassembling raw serial bytes into lines (bounded 1024-byte buffer)
//! - Tokenizing `KEY:VALUE` pairs against the console's key aliases
//! - Converting `MM:SS` durations to milliseconds
//! - Publishing merged snapshots to registered consumers

pub mod protocol;
pub mod reassembler;
pub mod parser;
