//! # FDF Bridge Library
//!
//! Expose a First Degree Fitness rowing console as a Bluetooth FTMS indoor rower.
//!
//! This library provides the core functionality for turning the console's
//! line-oriented serial telemetry into FTMS Rower Data notifications.

pub mod bridge;
pub mod config;
pub mod error;
pub mod fdf;
pub mod ftms;
pub mod link;
pub mod serial;
pub mod session;
pub mod telemetry;
