//! # Serial Communication Module
//!
//! Handles the serial (USB CDC-ACM) connection to the FDF rowing console.
//!
//! This module handles:
//! - Opening the configured port, falling back to alternative paths
//! - Async reads of raw telemetry chunks
//! - Reporting end of stream as a disconnect

pub mod port_trait;

use crate::config::SerialConfig;
use crate::error::{BridgeError, Result};
use port_trait::{SerialPortIO, TokioSerialPort};
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// FDF console serial handler
///
/// Owns the port and a reusable read buffer.
pub struct FdfSerial<P = TokioSerialPort> {
    /// Serial port handle
    port: P,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
    /// Read buffer, sized to the configured chunk size
    buf: Vec<u8>,
}

impl<P> std::fmt::Debug for FdfSerial<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FdfSerial")
            .field("device_path", &self.device_path)
            .field("chunk_size", &self.buf.len())
            .finish_non_exhaustive()
    }
}

impl FdfSerial {
    /// Open the console using the configured port and fallbacks
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` if none of the candidate paths opens
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fdf_bridge::config::SerialConfig;
    /// use fdf_bridge::serial::FdfSerial;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = FdfSerial::open(&SerialConfig::default())?;
    ///     println!("Console at {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        Self::open_with_paths(
            &config.candidate_paths(),
            config.baud_rate,
            Duration::from_millis(config.timeout_ms),
            config.read_chunk_size,
        )
    }

    /// Open the console trying each path in order
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyACM0"])
    /// * `baud_rate` - Console baud rate
    /// * `timeout` - Port I/O timeout
    /// * `chunk_size` - Maximum bytes returned per read
    pub fn open_with_paths(
        paths: &[&str],
        baud_rate: u32,
        timeout: Duration,
        chunk_size: usize,
    ) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate, timeout) {
                Ok(port) => {
                    info!("Successfully opened FDF console at {}", path);
                    return Ok(Self::with_port(TokioSerialPort::new(port), *path, chunk_size));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(BridgeError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32, timeout: Duration) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(timeout)
            .open_native_async()
            .map_err(|e| BridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl<P: SerialPortIO> FdfSerial<P> {
    /// Wrap an already opened port
    pub fn with_port(port: P, device_path: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            port,
            device_path: device_path.into(),
            buf: vec![0u8; chunk_size.max(1)],
        }
    }

    /// Read the next chunk of console bytes
    ///
    /// # Returns
    ///
    /// * `Result<&[u8]>` - Bytes received, never empty
    ///
    /// # Errors
    ///
    /// - `SerialDisconnected` when the device reports end of stream
    /// - `Serial` when the read itself fails
    pub async fn read_chunk(&mut self) -> Result<&[u8]> {
        let n = self
            .port
            .read(&mut self.buf)
            .await
            .map_err(|e| BridgeError::Serial(format!("Failed to read from {}: {}", self.device_path, e)))?;

        if n == 0 {
            return Err(BridgeError::SerialDisconnected(self.device_path.clone()));
        }

        debug!("Received {} bytes from console", n);
        Ok(&self.buf[..n])
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use port_trait::mocks::MockSerialPort;
    use std::io;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = FdfSerial::open_with_paths(invalid_paths, 115200, TIMEOUT, 256);

        match result.unwrap_err() {
            BridgeError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        match FdfSerial::open_with_paths(empty_paths, 115200, TIMEOUT, 256).unwrap_err() {
            BridgeError::SerialPortNotFound(_) => {}
            other => panic!("Expected SerialPortNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = FdfSerial::open_port("/dev/nonexistent_serial_device_12345", 115200, TIMEOUT);

        match result.unwrap_err() {
            BridgeError::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_chunk_returns_bytes() {
        let port = MockSerialPort::new();
        port.push_chunk(b"STROKES:1\n");
        let mut serial = FdfSerial::with_port(port, "/dev/mock0", 64);

        let chunk = serial.read_chunk().await.unwrap();
        assert_eq!(chunk, b"STROKES:1\n");
        assert_eq!(serial.device_path(), "/dev/mock0");
    }

    #[tokio::test]
    async fn test_read_chunk_respects_chunk_size() {
        let port = MockSerialPort::new();
        port.push_chunk(b"DISTANCE:500\n");
        let mut serial = FdfSerial::with_port(port, "/dev/mock0", 4);

        assert_eq!(serial.read_chunk().await.unwrap(), b"DIST");
        assert_eq!(serial.read_chunk().await.unwrap(), b"ANCE");
        assert_eq!(serial.read_chunk().await.unwrap(), b":500");
        assert_eq!(serial.read_chunk().await.unwrap(), b"\n");
    }

    #[tokio::test]
    async fn test_end_of_stream_is_disconnect() {
        let mut serial = FdfSerial::with_port(MockSerialPort::new(), "/dev/mock0", 64);

        match serial.read_chunk().await {
            Err(BridgeError::SerialDisconnected(path)) => assert_eq!(path, "/dev/mock0"),
            other => panic!("Expected SerialDisconnected, got: {:?}", other.map(|b| b.to_vec())),
        }
    }

    #[test]
    fn test_read_error_is_reported() {
        let port = MockSerialPort::new();
        port.set_read_error(io::ErrorKind::BrokenPipe);
        let mut serial = FdfSerial::with_port(port, "/dev/mock0", 64);

        let result = tokio_test::block_on(serial.read_chunk()).map(|b| b.to_vec());
        match result {
            Err(BridgeError::Serial(msg)) => {
                assert!(msg.contains("/dev/mock0"));
                assert!(msg.contains("Mock read error"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let serial = FdfSerial::with_port(MockSerialPort::new(), "/dev/mock0", 0);
        assert!(format!("{:?}", serial).contains("chunk_size: 1"));
    }

    // Integration test - only runs if an FDF console is connected
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_read_with_real_hardware() {
        match FdfSerial::open(&SerialConfig::default()) {
            Ok(mut serial) => {
                let chunk = serial.read_chunk().await;
                assert!(chunk.is_ok(), "Failed to read: {:?}", chunk.err());
            }
            Err(_) => println!("No FDF console detected (skipping read test)"),
        }
    }
}
