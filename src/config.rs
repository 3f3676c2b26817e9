//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{BridgeError, Result};
use crate::fdf::protocol::FDF_LINE_BUFFER_CAPACITY;
use crate::ftms::protocol::{FieldMask, RowerField};

/// Longest device name that fits the advertising payload
pub const MAX_DEVICE_NAME_LEN: usize = 29;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub ftms: FtmsConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration (console side)
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_fallback_ports")]
    pub fallback_ports: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
}

/// FTMS advertising and notification configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FtmsConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_fields")]
    pub fields: Vec<RowerField>,

    /// Raw Rower Data flag bits; overrides `fields` when set
    #[serde(default)]
    pub mask: Option<u16>,

    #[serde(default = "default_advertise_on_start")]
    pub advertise_on_start: bool,
}

/// Periodic status check configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

/// Session recording configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; empty logs to stderr only
    #[serde(default)]
    pub file_dir: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_fallback_ports() -> Vec<String> { vec!["/dev/ttyUSB0".to_string()] }
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 100 }
fn default_reconnect_interval_ms() -> u64 { 1000 }
fn default_read_chunk_size() -> usize { 256 }

fn default_device_name() -> String { "FDF Rower".to_string() }
fn default_fields() -> Vec<RowerField> { RowerField::ALL.to_vec() }
fn default_advertise_on_start() -> bool { true }

fn default_check_interval_ms() -> u64 { 5000 }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 1000 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            fallback_ports: default_fallback_ports(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            read_chunk_size: default_read_chunk_size(),
        }
    }
}

impl Default for FtmsConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            fields: default_fields(),
            mask: None,
            advertise_on_start: default_advertise_on_start(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { check_interval_ms: default_check_interval_ms() }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: String::new(),
        }
    }
}

impl SerialConfig {
    /// Device paths to try, preferred port first
    pub fn candidate_paths(&self) -> Vec<&str> {
        std::iter::once(self.port.as_str())
            .chain(self.fallback_ports.iter().map(String::as_str))
            .collect()
    }
}

impl FtmsConfig {
    /// Field mask announced in every notification
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldMask` if `mask` sets a bit without a snapshot source
    pub fn field_mask(&self) -> Result<FieldMask> {
        match self.mask {
            Some(bits) => FieldMask::from_bits(bits),
            None => Ok(FieldMask::from_fields(&self.fields)),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fdf_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if self.serial.fallback_ports.iter().any(String::is_empty) {
            return Err(invalid("fallback_ports entries cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200].contains(&self.serial.baud_rate) {
            return Err(invalid("baud_rate must be one of: 9600, 19200, 38400, 57600, 115200"));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.serial.read_chunk_size == 0 || self.serial.read_chunk_size > FDF_LINE_BUFFER_CAPACITY {
            return Err(invalid(format!(
                "read_chunk_size must be between 1 and {}",
                FDF_LINE_BUFFER_CAPACITY
            )));
        }

        if self.ftms.device_name.is_empty() || self.ftms.device_name.len() > MAX_DEVICE_NAME_LEN {
            return Err(invalid(format!(
                "device_name must be between 1 and {} bytes",
                MAX_DEVICE_NAME_LEN
            )));
        }

        if self.ftms.fields.is_empty() {
            return Err(invalid("ftms fields cannot be empty"));
        }

        let mut seen = HashSet::new();
        for field in &self.ftms.fields {
            if !seen.insert(field) {
                return Err(invalid(format!("ftms field {:?} listed more than once", field)));
            }
        }

        self.ftms.field_mask()?;

        if self.status.check_interval_ms < 100 || self.status.check_interval_ms > 600000 {
            return Err(invalid("check_interval_ms must be between 100 and 600000"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 0 and 60000"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}
