//! Flash geometry discovery
//!
//! The firmware reports the raw geometry of the whole device. The first
//! [`RESERVED_REGION_SIZE`] bytes hold the SCP firmware image and cannot be
//! reached through the flash service, so the usable geometry is the raw one
//! minus the sectors covered by that region. Offsets used on the channel are
//! relative to the end of the reserved region.

use crate::error::{DiscoveryFault, Error, Result};
use crate::monitor::{SecureMonitor, SmcFunction};
use once_cell::unsync::OnceCell;

/// Bytes at the start of the flash that the channel cannot reach (512 KiB)
pub const RESERVED_REGION_SIZE: u32 = 512 * 1024;

/// Usable flash geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Number of usable sectors
    pub sector_count: u32,
    /// Sector size in bytes (never 0)
    pub sector_size: u32,
    /// `sector_count * sector_size`
    pub total_size: u32,
}

impl FlashGeometry {
    /// Derive the usable geometry from the raw geometry reported by firmware
    ///
    /// The reserved region is converted to whole sectors by integer division.
    pub fn from_raw(sector_count: u32, sector_size: u32, reserved_size: u32) -> Result<Self> {
        if sector_size == 0 {
            return Err(Error::Discovery(DiscoveryFault::ZeroSectorSize));
        }

        let reserved = reserved_size / sector_size;
        if sector_count <= reserved {
            return Err(Error::Discovery(DiscoveryFault::TooFewSectors {
                reported: sector_count,
                reserved,
            }));
        }

        let sector_count = sector_count - reserved;
        let total_size = sector_count
            .checked_mul(sector_size)
            .ok_or(Error::Discovery(DiscoveryFault::SizeOverflow))?;

        Ok(Self {
            sector_count,
            sector_size,
            total_size,
        })
    }

    /// Query the firmware and derive the usable geometry
    pub fn discover<M: SecureMonitor + ?Sized>(monitor: &mut M, reserved_size: u32) -> Result<Self> {
        let res = monitor.call2(SmcFunction::Info, 0, 0);
        if !res.is_ok() {
            log::error!("{} failed (a0 = 0x{:x})", SmcFunction::Info.name(), res.a0);
            return Err(Error::Discovery(DiscoveryFault::Status(res.a0)));
        }

        // The firmware reports 32-bit quantities in 64-bit registers
        let geometry = Self::from_raw(res.a1 as u32, res.a2 as u32, reserved_size).map_err(|e| {
            log::error!(
                "Invalid flash geometry from firmware: {} sectors of {} bytes",
                res.a1,
                res.a2
            );
            e
        })?;

        log::debug!(
            "Flash geometry: {} sectors x {} bytes = 0x{:x} bytes (raw {} sectors)",
            geometry.sector_count,
            geometry.sector_size,
            geometry.total_size,
            res.a1
        );

        Ok(geometry)
    }
}

/// Once-only geometry store
///
/// The first successful [`GeometryCache::get_or_discover`] issues the INFO
/// call; every later call returns the stored value. A failed discovery is
/// not stored, so the next call tries again.
#[derive(Debug)]
pub struct GeometryCache {
    reserved_size: u32,
    cell: OnceCell<FlashGeometry>,
}

impl GeometryCache {
    /// Create an empty cache for a device with `reserved_size` unreachable bytes
    pub fn new(reserved_size: u32) -> Self {
        Self {
            reserved_size,
            cell: OnceCell::new(),
        }
    }

    /// Cached geometry, if discovery already succeeded
    pub fn get(&self) -> Option<FlashGeometry> {
        self.cell.get().copied()
    }

    /// Return the cached geometry, discovering it first if needed
    pub fn get_or_discover<M: SecureMonitor + ?Sized>(&self, monitor: &mut M) -> Result<FlashGeometry> {
        self.cell
            .get_or_try_init(|| FlashGeometry::discover(monitor, self.reserved_size))
            .copied()
    }
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::new(RESERVED_REGION_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{SmcArgs, SmcResult};

    /// Answers INFO with a fixed raw geometry and counts the calls
    struct InfoOnly {
        result: SmcResult,
        calls: usize,
    }

    impl InfoOnly {
        fn new(sector_count: u64, sector_size: u64) -> Self {
            Self {
                result: SmcResult {
                    a0: 0,
                    a1: sector_count,
                    a2: sector_size,
                    a3: 0,
                },
                calls: 0,
            }
        }
    }

    impl SecureMonitor for InfoOnly {
        fn call(&mut self, function: SmcFunction, _args: SmcArgs) -> SmcResult {
            assert_eq!(function, SmcFunction::Info);
            self.calls += 1;
            self.result
        }
    }

    #[test]
    fn test_reserved_region_adjustment() {
        let geometry = FlashGeometry::from_raw(512, 65536, RESERVED_REGION_SIZE).unwrap();
        assert_eq!(geometry.sector_count, 504);
        assert_eq!(geometry.sector_size, 65536);
        assert_eq!(geometry.total_size, 504 * 65536);
    }

    #[test]
    fn test_reserved_region_rounds_down() {
        // 512 KiB / 3 MiB sectors = 0 reserved sectors
        let geometry = FlashGeometry::from_raw(4, 3 * 1024 * 1024, RESERVED_REGION_SIZE).unwrap();
        assert_eq!(geometry.sector_count, 4);
    }

    #[test]
    fn test_invalid_raw_geometry() {
        assert_eq!(
            FlashGeometry::from_raw(512, 0, RESERVED_REGION_SIZE),
            Err(Error::Discovery(DiscoveryFault::ZeroSectorSize))
        );
        assert_eq!(
            FlashGeometry::from_raw(8, 65536, RESERVED_REGION_SIZE),
            Err(Error::Discovery(DiscoveryFault::TooFewSectors {
                reported: 8,
                reserved: 8
            }))
        );
        assert_eq!(
            FlashGeometry::from_raw(0x10_0000, 0x10_0000, 0),
            Err(Error::Discovery(DiscoveryFault::SizeOverflow))
        );
    }

    #[test]
    fn test_cache_discovers_once() {
        let mut monitor = InfoOnly::new(512, 65536);
        let cache = GeometryCache::default();
        assert_eq!(cache.get(), None);

        let first = cache.get_or_discover(&mut monitor).unwrap();
        for _ in 0..10 {
            assert_eq!(cache.get_or_discover(&mut monitor).unwrap(), first);
        }
        assert_eq!(monitor.calls, 1);
        assert_eq!(cache.get(), Some(first));
    }

    #[test]
    fn test_failed_discovery_is_not_cached() {
        let mut monitor = InfoOnly::new(512, 65536);
        monitor.result.a0 = 1;
        let cache = GeometryCache::default();
        assert_eq!(
            cache.get_or_discover(&mut monitor),
            Err(Error::Discovery(DiscoveryFault::Status(1)))
        );

        monitor.result.a0 = 0;
        assert!(cache.get_or_discover(&mut monitor).is_ok());
        assert_eq!(monitor.calls, 2);
    }
}
