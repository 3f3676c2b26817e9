//! # Line Reassembler
//!
//! Accumulates raw console bytes into complete lines.
//!
//! The console may split a line across any number of reads, and terminates
//! lines with `\n`, `\r` or `\r\n`. At most one partial line is pending at a
//! time; a line that outgrows the buffer is dropped whole.

use bytes::BytesMut;
use tracing::warn;

use super::protocol::FDF_LINE_BUFFER_CAPACITY;

/// Bounded byte accumulator that yields complete lines
#[derive(Debug)]
pub struct LineReassembler {
    buffer: BytesMut,
    capacity: usize,
    overflows: u64,
}

impl Default for LineReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReassembler {
    /// Create a reassembler with the standard 1024-byte capacity
    pub fn new() -> Self {
        Self::with_capacity(FDF_LINE_BUFFER_CAPACITY)
    }

    /// Create a reassembler with a custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            overflows: 0,
        }
    }

    /// Consume a chunk of bytes, calling `on_line` for every completed line
    ///
    /// Terminators seen while the buffer is empty are ignored, so `\r\n`
    /// never yields an empty line. If the buffer fills up before a
    /// terminator arrives, the pending bytes and the overflowing byte are
    /// discarded and accumulation restarts from empty.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Raw bytes from the console, any length
    /// * `on_line` - Receives each complete line, without its terminator
    ///
    /// # Returns
    ///
    /// * `usize` - Number of lines delivered
    ///
    /// # Examples
    ///
    /// ```
    /// use fdf_bridge::fdf::reassembler::LineReassembler;
    ///
    /// let mut reassembler = LineReassembler::new();
    /// let mut lines = Vec::new();
    /// reassembler.feed(b"STROKES:1\r\nSTRO", |line| lines.push(line.to_vec()));
    /// reassembler.feed(b"KES:2\n", |line| lines.push(line.to_vec()));
    /// assert_eq!(lines, vec![b"STROKES:1".to_vec(), b"STROKES:2".to_vec()]);
    /// ```
    pub fn feed<F>(&mut self, bytes: &[u8], mut on_line: F) -> usize
    where
        F: FnMut(&[u8]),
    {
        let mut delivered = 0;

        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if !self.buffer.is_empty() {
                    on_line(&self.buffer);
                    self.buffer.clear();
                    delivered += 1;
                }
            } else if self.buffer.len() < self.capacity {
                self.buffer.extend_from_slice(&[byte]);
            } else {
                self.overflows += 1;
                warn!(
                    "Console line exceeded {} bytes without a terminator, discarding",
                    self.capacity
                );
                self.buffer.clear();
            }
        }

        delivered
    }

    /// Drop any partially received line
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes of the pending partial line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no partial line is pending
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of lines discarded due to overflow since creation
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }
}
