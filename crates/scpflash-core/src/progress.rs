//! Transfer progress accounting
//!
//! Progress is reported synchronously, on the caller's stack, after every
//! completed chunk. Both the chunked transfer engine and the client library
//! report through the same [`ProgressSink`] trait.

use core::fmt;

/// Logical flash operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferOp {
    /// Read flash contents
    Read,
    /// Program flash contents
    Write,
    /// Erase flash contents
    Erase,
}

impl TransferOp {
    /// Present participle used in progress output ("Reading", ...)
    pub fn verb(self) -> &'static str {
        match self {
            Self::Read => "Reading",
            Self::Write => "Writing",
            Self::Erase => "Erasing",
        }
    }
}

impl fmt::Display for TransferOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Erase => write!(f, "erase"),
        }
    }
}

/// Snapshot of a running transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    /// Operation being performed
    pub operation: TransferOp,
    /// Total number of bytes requested
    pub total_size: u32,
    /// Flash offset the transfer started at
    pub offset: u32,
    /// Bytes completed so far
    pub bytes_transferred: u32,
    /// Completion percentage, 0..=100
    pub percent: u32,
}

impl ProgressState {
    /// Create the state for a transfer that has not moved any data yet
    pub fn new(operation: TransferOp, offset: u32, total_size: u32) -> Self {
        Self {
            operation,
            total_size,
            offset,
            bytes_transferred: 0,
            percent: 0,
        }
    }

    /// Account for `bytes` more completed bytes and recompute the percentage
    ///
    /// The percentage is computed from the bytes actually transferred in
    /// 64-bit arithmetic and never exceeds 100.
    pub fn advance(&mut self, bytes: u32) {
        self.bytes_transferred = self.bytes_transferred.saturating_add(bytes);
        self.percent = percent_of(self.bytes_transferred, self.total_size);
    }

    /// Whether every requested byte has been transferred
    pub fn is_complete(&self) -> bool {
        self.bytes_transferred >= self.total_size
    }
}

/// `done * 100 / total`, clamped to 100
///
/// A zero `total` counts as complete.
pub fn percent_of(done: u32, total: u32) -> u32 {
    if total == 0 {
        return 100;
    }
    let percent = (done as u64 * 100) / total as u64;
    percent.min(100) as u32
}

/// Receiver of progress notifications
pub trait ProgressSink {
    /// Called with the current state of the transfer
    fn report(&mut self, state: &ProgressState);
}

impl<F: FnMut(&ProgressState)> ProgressSink for F {
    fn report(&mut self, state: &ProgressState) {
        self(state)
    }
}

/// A no-op progress reporter
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _state: &ProgressState) {}
}
