//! Error types for scpflash-core
//!
//! This module provides a no_std compatible error type that is shared by
//! the privileged layer, the request surface and the client library.

use core::fmt;

use crate::progress::TransferOp;

/// Which bounds rule a request broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFault {
    /// Zero-length request
    ZeroSize,
    /// Offset or size is not a multiple of the transfer alignment
    Misaligned {
        /// Requested offset
        offset: u32,
        /// Requested size
        size: u32,
    },
    /// `offset + size` is beyond the usable flash size
    OutOfBounds {
        /// Requested offset
        offset: u32,
        /// Requested size
        size: u32,
        /// Usable flash size
        total_size: u32,
    },
}

/// Why geometry discovery was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryFault {
    /// The INFO call returned a nonzero status
    Status(u64),
    /// Firmware reported a zero sector size
    ZeroSectorSize,
    /// The reserved region covers every reported sector
    TooFewSectors {
        /// Sectors reported by firmware
        reported: u32,
        /// Sectors taken by the reserved region
        reserved: u32,
    },
    /// `sector_count * sector_size` does not fit in 32 bits
    SizeOverflow,
    /// The device node reported a discovery failure without details
    Reported,
}

/// Error categories visible to clients
///
/// Every [`Error`] falls into exactly one kind. The kind decides the
/// errno-style code returned across the system-call boundary and the exit
/// code of the command line tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A session is already open
    Busy,
    /// Malformed request (alignment, bounds, size, names)
    InvalidArgument,
    /// The channel or device node is unavailable
    NoDevice,
    /// Transfer buffer allocation failed
    OutOfMemory,
    /// A monitor call returned a nonzero status
    ChannelFailure,
    /// Geometry discovery returned invalid data
    Discovery,
    /// Read-back did not match the written data
    Verification,
}

impl ErrorKind {
    /// errno-style code for this kind
    pub fn errno(self) -> i32 {
        match self {
            Self::Busy => 16,            // EBUSY
            Self::InvalidArgument => 22, // EINVAL
            Self::NoDevice => 19,        // ENODEV
            Self::OutOfMemory => 12,     // ENOMEM
            Self::ChannelFailure => 5,   // EIO
            Self::Discovery => 71,       // EPROTO
            Self::Verification => 84,    // EILSEQ
        }
    }

    /// Map an errno reported by the device node back to a kind
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            16 => Self::Busy,
            22 => Self::InvalidArgument,
            19 | 2 | 6 => Self::NoDevice, // ENODEV, ENOENT, ENXIO
            12 => Self::OutOfMemory,
            71 => Self::Discovery,
            84 => Self::Verification,
            _ => Self::ChannelFailure,
        }
    }
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Session errors
    /// A session is already open on the device
    Busy,
    /// The device or its channel is not available
    NoDevice,

    // Request errors
    /// The request violates the alignment or bounds rules
    InvalidRange(RangeFault),
    /// The request is malformed (short payload, oversized buffer, ...)
    InvalidArgument,
    /// No partition with the requested name
    UnknownPartition,
    /// The transfer buffer could not be allocated
    OutOfMemory,

    // Channel errors
    /// A monitor call failed while performing the given operation
    ChannelFailure(TransferOp),
    /// Geometry discovery failed
    Discovery(DiscoveryFault),

    // Tool errors
    /// Data read back after a write differs from the data written
    VerificationFailed {
        /// Flash offset of the first differing byte
        offset: u32,
    },
}

impl Error {
    /// Client-visible category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Busy => ErrorKind::Busy,
            Self::NoDevice => ErrorKind::NoDevice,
            Self::InvalidRange(_) | Self::InvalidArgument | Self::UnknownPartition => {
                ErrorKind::InvalidArgument
            }
            Self::OutOfMemory => ErrorKind::OutOfMemory,
            Self::ChannelFailure(_) => ErrorKind::ChannelFailure,
            Self::Discovery(_) => ErrorKind::Discovery,
            Self::VerificationFailed { .. } => ErrorKind::Verification,
        }
    }

    /// errno-style code of this error
    pub fn errno(&self) -> i32 {
        self.kind().errno()
    }

    /// Rebuild an error from an errno returned across the system-call
    /// boundary while performing `op`
    ///
    /// Only the kind survives the boundary, so the details of range and
    /// discovery faults are lost.
    pub fn from_errno(errno: i32, op: TransferOp) -> Self {
        match ErrorKind::from_errno(errno) {
            ErrorKind::Busy => Self::Busy,
            ErrorKind::InvalidArgument => Self::InvalidArgument,
            ErrorKind::NoDevice => Self::NoDevice,
            ErrorKind::OutOfMemory => Self::OutOfMemory,
            ErrorKind::Discovery => Self::Discovery(DiscoveryFault::Reported),
            ErrorKind::ChannelFailure | ErrorKind::Verification => Self::ChannelFailure(op),
        }
    }
}

impl fmt::Display for RangeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSize => write!(f, "size must not be zero"),
            Self::Misaligned { offset, size } => write!(
                f,
                "offset 0x{:x} and size 0x{:x} must be multiples of {} bytes",
                offset,
                size,
                crate::staging::ALIGNMENT
            ),
            Self::OutOfBounds {
                offset,
                size,
                total_size,
            } => write!(
                f,
                "offset 0x{:x} + size 0x{:x} exceeds flash size 0x{:x}",
                offset, size, total_size
            ),
        }
    }
}

impl fmt::Display for DiscoveryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "INFO call failed (status 0x{:x})", status),
            Self::ZeroSectorSize => write!(f, "firmware reported a zero sector size"),
            Self::TooFewSectors { reported, reserved } => write!(
                f,
                "firmware reported {} sectors, {} are reserved",
                reported, reserved
            ),
            Self::SizeOverflow => write!(f, "flash size does not fit in 32 bits"),
            Self::Reported => write!(f, "reported by device"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "device is busy (another session is open)"),
            Self::NoDevice => write!(f, "device not available"),
            Self::InvalidRange(fault) => write!(f, "invalid range: {}", fault),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::UnknownPartition => write!(f, "unknown partition"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::ChannelFailure(op) => write!(f, "flash {} failed in secure monitor", op),
            Self::Discovery(fault) => write!(f, "flash discovery failed: {}", fault),
            Self::VerificationFailed { offset } => {
                write!(f, "verification failed at offset 0x{:08x}", offset)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
