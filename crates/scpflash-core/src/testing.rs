//! Small in-crate flash service model for unit tests

use crate::monitor::{SecureMonitor, SmcArgs, SmcFunction, SmcResult};
use crate::staging::StagingBuffer;
use std::vec;
use std::vec::Vec;

/// Raw geometry reported by [`MockMonitor`]: 4 sectors of 4 KiB, no reserve
pub const SECTOR_COUNT: u32 = 4;
pub const SECTOR_SIZE: u32 = 4096;
pub const TOTAL_SIZE: u32 = SECTOR_COUNT * SECTOR_SIZE;

/// Flash array plus staging buffer that records every call
pub struct MockMonitor {
    pub flash: Vec<u8>,
    pub staging: StagingBuffer<1024>,
    pub log: Vec<(SmcFunction, u64, u64)>,
    /// Fail the n-th (1-based) call of a function
    pub fail: Option<(SmcFunction, usize)>,
}

impl MockMonitor {
    pub fn new() -> Self {
        Self {
            flash: vec![0; TOTAL_SIZE as usize],
            staging: StagingBuffer::new(),
            log: Vec::new(),
            fail: None,
        }
    }

    pub fn count(&self, function: SmcFunction) -> usize {
        self.log.iter().filter(|(f, _, _)| *f == function).count()
    }
}

impl SecureMonitor for MockMonitor {
    fn call(&mut self, function: SmcFunction, args: SmcArgs) -> SmcResult {
        self.log.push((function, args[0], args[1]));
        if let Some((f, n)) = self.fail {
            if f == function && self.count(function) == n {
                return SmcResult::error(1);
            }
        }
        let (off, len) = (args[0] as usize, args[1] as usize);
        match function {
            SmcFunction::Position => self.staging.set_position(off).unwrap(),
            SmcFunction::Push => {
                let words = [args[0], args[1], args[2], args[3]];
                self.staging.push(&words).unwrap();
            }
            SmcFunction::Pull => {
                let w = self.staging.pull().unwrap();
                return SmcResult {
                    a0: w[0],
                    a1: w[1],
                    a2: w[2],
                    a3: w[3],
                };
            }
            SmcFunction::Write => {
                let src = &self.staging.as_bytes()[..len];
                self.flash[off..off + len].copy_from_slice(src);
            }
            SmcFunction::Read => {
                let src = &self.flash[off..off + len];
                self.staging.as_bytes_mut()[..len].copy_from_slice(src);
            }
            SmcFunction::Erase => self.flash[off..off + len].fill(0),
            SmcFunction::Info => {
                return SmcResult {
                    a0: 0,
                    a1: SECTOR_COUNT as u64,
                    a2: SECTOR_SIZE as u64,
                    a3: 0,
                }
            }
        }
        SmcResult::OK
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}
