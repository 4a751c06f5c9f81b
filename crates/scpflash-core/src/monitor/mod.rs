//! Secure monitor call surface
//!
//! The flash service lives in the platform's trusted firmware and is reached
//! with SMC calls in the SiP service range. Every call takes a function
//! identifier and up to seven word arguments and returns four words; word 0
//! is the status (0 = success) for every function except PULL, where all
//! four words are payload.
//!
//! [`SecureMonitor`] is the seam between the transfer engine and whatever
//! executes the call: the real firmware ([`ArmSmc`], AArch64 only) or an
//! in-process emulation used in tests.

#[cfg(target_arch = "aarch64")]
mod arm;

#[cfg(target_arch = "aarch64")]
pub use arm::ArmSmc;

use crate::staging::STAGING_BUFFER_SIZE;

/// Number of argument words after the function identifier
pub const SMC_ARG_COUNT: usize = 7;

/// Base function identifier of the flash service (SiP, fast call, SMC32)
pub const SMC_FLASH_BASE: u32 = 0x8200_0002;

/// Flash service functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SmcFunction {
    /// Program `a2` bytes from the staging buffer at flash offset `a1`
    Write = SMC_FLASH_BASE,
    /// Read `a2` bytes at flash offset `a1` into the staging buffer
    Read = SMC_FLASH_BASE + 1,
    /// Erase `a2` bytes at flash offset `a1`
    Erase = SMC_FLASH_BASE + 2,
    /// Store words `a1..=a4` at the staging cursor and advance it
    Push = SMC_FLASH_BASE + 3,
    /// Return four words from the staging cursor and advance it
    Pull = SMC_FLASH_BASE + 4,
    /// Set the staging cursor to `a1`
    Position = SMC_FLASH_BASE + 5,
    /// Return the raw sector count in `a1` and sector size in `a2`
    Info = SMC_FLASH_BASE + 6,
}

impl SmcFunction {
    /// All functions, in identifier order
    pub const ALL: [SmcFunction; 7] = [
        Self::Write,
        Self::Read,
        Self::Erase,
        Self::Push,
        Self::Pull,
        Self::Position,
        Self::Info,
    ];

    /// Function identifier passed in x0
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Look up a function by identifier
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }

    /// Short name for log messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Write => "WRITE",
            Self::Read => "READ",
            Self::Erase => "ERASE",
            Self::Push => "PUSH",
            Self::Pull => "PULL",
            Self::Position => "POSITION",
            Self::Info => "INFO",
        }
    }
}

/// Argument words `a1..=a7` of a call
pub type SmcArgs = [u64; SMC_ARG_COUNT];

/// Result registers `a0..=a3` of a call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmcResult {
    /// Status word (payload for PULL)
    pub a0: u64,
    /// Result word 1
    pub a1: u64,
    /// Result word 2
    pub a2: u64,
    /// Result word 3
    pub a3: u64,
}

impl SmcResult {
    /// Successful result with no payload
    pub const OK: SmcResult = SmcResult {
        a0: 0,
        a1: 0,
        a2: 0,
        a3: 0,
    };

    /// Failed result carrying `status`
    pub const fn error(status: u64) -> Self {
        Self {
            a0: status,
            a1: 0,
            a2: 0,
            a3: 0,
        }
    }

    /// Status word
    pub fn status(&self) -> u64 {
        self.a0
    }

    /// Whether the status word signals success
    pub fn is_ok(&self) -> bool {
        self.a0 == 0
    }

    /// All four words, for PULL
    pub fn words(&self) -> [u64; 4] {
        [self.a0, self.a1, self.a2, self.a3]
    }
}

/// Executor of flash service calls
///
/// Implementations must behave identically from the caller's point of view;
/// the transfer engine does not know which one it is driving.
pub trait SecureMonitor {
    /// Issue one call
    fn call(&mut self, function: SmcFunction, args: SmcArgs) -> SmcResult;

    /// Issue a call that takes two arguments
    fn call2(&mut self, function: SmcFunction, a1: u64, a2: u64) -> SmcResult {
        self.call(function, [a1, a2, 0, 0, 0, 0, 0])
    }

    /// Size of the firmware staging buffer in bytes
    ///
    /// No single READ or WRITE may move more than this.
    fn staging_capacity(&self) -> usize {
        STAGING_BUFFER_SIZE
    }
}

impl<M: SecureMonitor + ?Sized> SecureMonitor for &mut M {
    fn call(&mut self, function: SmcFunction, args: SmcArgs) -> SmcResult {
        (**self).call(function, args)
    }

    fn staging_capacity(&self) -> usize {
        (**self).staging_capacity()
    }
}

#[cfg(feature = "alloc")]
impl<M: SecureMonitor + ?Sized> SecureMonitor for alloc::boxed::Box<M> {
    fn call(&mut self, function: SmcFunction, args: SmcArgs) -> SmcResult {
        (**self).call(function, args)
    }

    fn staging_capacity(&self) -> usize {
        (**self).staging_capacity()
    }
}
