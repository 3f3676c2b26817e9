//! # Error Types
//!
//! Custom error types for FDF Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for FDF Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors (parse and validation)
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No FDF console found (tried: {0})")]
    SerialPortNotFound(String),

    /// The console stopped delivering bytes (EOF)
    #[error("Serial device disconnected: {0}")]
    SerialDisconnected(String),

    /// Link manager operation failed (advertising start/stop, notification send)
    #[error("Link manager error: {0}")]
    LinkManager(String),

    /// Field mask contains flag bits without a snapshot source
    #[error("Invalid FTMS field mask: 0x{0:04X}")]
    InvalidFieldMask(u16),

    /// Session recorder serialization errors
    #[error("Telemetry record error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// Operation attempted after teardown
    #[error("Bridge is not initialized")]
    NotInitialized,
}

/// Result type alias for FDF Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
