//! scpflash-emulator - In-memory flash service for testing
//!
//! This crate provides a [`SecureMonitor`] that answers flash service calls
//! from an in-memory flash array and staging buffer instead of trusted
//! firmware. It behaves like the real service from the caller's point of
//! view, so the transfer engine, the device and the tool can be exercised
//! without hardware.
//!
//! Requests the firmware would refuse (ranges past the end of the array,
//! lengths above the staging capacity, cursor overruns) return status 1
//! and leave the emulated state untouched.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use scpflash_core::monitor::{SecureMonitor, SmcArgs, SmcFunction, SmcResult};
use scpflash_core::staging::{StagingBuffer, STAGING_BUFFER_SIZE};

/// Status returned for any request the emulated firmware rejects
pub const STATUS_FAILED: u64 = 1;

/// Raw geometry of the emulated flash
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Raw sector count reported by INFO
    pub sector_count: u32,
    /// Sector size in bytes
    pub sector_size: u32,
}

impl EmulatorConfig {
    /// Size of the emulated array in bytes
    pub fn size(&self) -> usize {
        self.sector_count as usize * self.sector_size as usize
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            sector_count: 512,
            sector_size: 64 * 1024,
        }
    }
}

#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Copy)]
struct Fault {
    function: SmcFunction,
    remaining: usize,
}

/// Emulated secure monitor
///
/// `STAGING` is the staging buffer capacity, which is also the largest
/// length a single READ or WRITE call accepts.
#[cfg(feature = "alloc")]
pub struct EmulatedMonitor<const STAGING: usize = STAGING_BUFFER_SIZE> {
    config: EmulatorConfig,
    data: Vec<u8>,
    staging: StagingBuffer<STAGING>,
    calls: [usize; SmcFunction::ALL.len()],
    fault: Option<Fault>,
}

#[cfg(feature = "alloc")]
impl<const STAGING: usize> EmulatedMonitor<STAGING> {
    /// Create a zero-filled emulated flash with the given geometry
    pub fn new(config: EmulatorConfig) -> Self {
        let data = vec![0; config.size()];
        Self {
            config,
            data,
            staging: StagingBuffer::new(),
            calls: [0; SmcFunction::ALL.len()],
            fault: None,
        }
    }

    /// Create an emulated flash with the default geometry (512 x 64 KiB)
    pub fn new_default() -> Self {
        Self::new(EmulatorConfig::default())
    }

    /// Create an emulated flash with pre-filled data
    pub fn with_data(config: EmulatorConfig, initial_data: &[u8]) -> Self {
        let mut monitor = Self::new(config);
        let len = core::cmp::min(initial_data.len(), monitor.data.len());
        monitor.data[..len].copy_from_slice(&initial_data[..len]);
        monitor
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Staging buffer state
    pub fn staging(&self) -> &StagingBuffer<STAGING> {
        &self.staging
    }

    /// Number of calls of `function` received so far
    pub fn calls(&self, function: SmcFunction) -> usize {
        self.calls[index(function)]
    }

    /// Total number of calls received so far
    pub fn total_calls(&self) -> usize {
        self.calls.iter().sum()
    }

    /// Reset all call counters
    pub fn reset_calls(&mut self) {
        self.calls = [0; SmcFunction::ALL.len()];
    }

    /// Make the `nth` next call of `function` fail (1 = the very next one)
    ///
    /// The fault fires once; later calls succeed again. Injecting a new
    /// fault replaces any pending one.
    pub fn fail_nth_call(&mut self, function: SmcFunction, nth: usize) {
        self.fault = Some(Fault {
            function,
            remaining: nth.max(1),
        });
    }

    fn take_fault(&mut self, function: SmcFunction) -> bool {
        let Some(fault) = self.fault.as_mut() else {
            return false;
        };
        if fault.function != function {
            return false;
        }
        fault.remaining -= 1;
        if fault.remaining > 0 {
            return false;
        }
        self.fault = None;
        log::debug!("Injected fault: failing {}", function.name());
        true
    }

    fn range(&self, offset: u64, len: u64, limit: usize) -> Option<core::ops::Range<usize>> {
        let end = offset.checked_add(len)?;
        if len as usize > limit || end > self.data.len() as u64 {
            return None;
        }
        Some(offset as usize..end as usize)
    }

    fn handle_write(&mut self, offset: u64, len: u64) -> SmcResult {
        let Some(range) = self.range(offset, len, STAGING) else {
            return reject(SmcFunction::Write, offset, len);
        };
        let src = &self.staging.as_bytes()[..range.len()];
        self.data[range].copy_from_slice(src);
        SmcResult::OK
    }

    fn handle_read(&mut self, offset: u64, len: u64) -> SmcResult {
        let Some(range) = self.range(offset, len, STAGING) else {
            return reject(SmcFunction::Read, offset, len);
        };
        let len = range.len();
        self.staging.as_bytes_mut()[..len].copy_from_slice(&self.data[range]);
        SmcResult::OK
    }

    fn handle_erase(&mut self, offset: u64, len: u64) -> SmcResult {
        let Some(range) = self.range(offset, len, self.data.len()) else {
            return reject(SmcFunction::Erase, offset, len);
        };
        self.data[range].fill(0);
        SmcResult::OK
    }
}

#[cfg(feature = "alloc")]
impl<const STAGING: usize> SecureMonitor for EmulatedMonitor<STAGING> {
    fn call(&mut self, function: SmcFunction, args: SmcArgs) -> SmcResult {
        self.calls[index(function)] += 1;
        if self.take_fault(function) {
            return SmcResult::error(STATUS_FAILED);
        }

        match function {
            SmcFunction::Write => self.handle_write(args[0], args[1]),
            SmcFunction::Read => self.handle_read(args[0], args[1]),
            SmcFunction::Erase => self.handle_erase(args[0], args[1]),
            SmcFunction::Push => {
                let words = [args[0], args[1], args[2], args[3]];
                match self.staging.push(&words) {
                    Ok(()) => SmcResult::OK,
                    Err(_) => SmcResult::error(STATUS_FAILED),
                }
            }
            SmcFunction::Pull => match self.staging.pull() {
                Ok(w) => SmcResult {
                    a0: w[0],
                    a1: w[1],
                    a2: w[2],
                    a3: w[3],
                },
                Err(_) => SmcResult::error(STATUS_FAILED),
            },
            SmcFunction::Position => {
                let position = usize::try_from(args[0]).unwrap_or(usize::MAX);
                match self.staging.set_position(position) {
                    Ok(()) => SmcResult::OK,
                    Err(_) => SmcResult::error(STATUS_FAILED),
                }
            }
            SmcFunction::Info => SmcResult {
                a0: 0,
                a1: self.config.sector_count as u64,
                a2: self.config.sector_size as u64,
                a3: 0,
            },
        }
    }

    fn staging_capacity(&self) -> usize {
        STAGING
    }
}

#[cfg(feature = "alloc")]
fn index(function: SmcFunction) -> usize {
    (function.id() - SmcFunction::Write.id()) as usize
}

#[cfg(feature = "alloc")]
fn reject(function: SmcFunction, offset: u64, len: u64) -> SmcResult {
    log::warn!(
        "Emulated {} rejected: offset 0x{:x}, length 0x{:x}",
        function.name(),
        offset,
        len
    );
    SmcResult::error(STATUS_FAILED)
}
