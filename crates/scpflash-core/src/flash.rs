//! Privileged-layer flash context
//!
//! [`ScpFlash`] owns the channel to the firmware and the geometry cache.
//! Every operation resolves the geometry (discovering it on first use),
//! validates the request and then drives the transfer engine.

use crate::error::{Error, Result};
use crate::geometry::{FlashGeometry, GeometryCache, RESERVED_REGION_SIZE};
use crate::monitor::SecureMonitor;
use crate::progress::{NoProgress, ProgressSink};
use crate::transfer::{check_chunk_size, validate, TransferEngine, CHANNEL_CHUNK_SIZE};

/// Flash access through a [`SecureMonitor`]
///
/// # Example
///
/// ```ignore
/// let mut flash = ScpFlash::new(monitor).with_chunk_size(512)?;
/// flash.erase(0, 4096)?;
/// flash.write(0, &data)?;
/// ```
#[derive(Debug)]
pub struct ScpFlash<M> {
    monitor: M,
    geometry: GeometryCache,
    chunk_size: u32,
}

impl<M: SecureMonitor> ScpFlash<M> {
    /// Create a context with the default chunk size and reserved region
    pub fn new(monitor: M) -> Self {
        Self {
            monitor,
            geometry: GeometryCache::new(RESERVED_REGION_SIZE),
            chunk_size: CHANNEL_CHUNK_SIZE,
        }
    }

    /// Use a different chunk size for bulk calls
    ///
    /// Must be a nonzero multiple of [`crate::ALIGNMENT`] no larger than the
    /// firmware staging buffer.
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Result<Self> {
        check_chunk_size(chunk_size, self.monitor.staging_capacity())?;
        self.chunk_size = chunk_size;
        Ok(self)
    }

    /// Use a different reserved region size
    ///
    /// Resets the geometry cache.
    pub fn with_reserved_size(mut self, reserved_size: u32) -> Self {
        self.geometry = GeometryCache::new(reserved_size);
        self
    }

    /// Chunk size used for bulk calls
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Usable flash geometry, discovered on first call
    pub fn flash_info(&mut self) -> Result<FlashGeometry> {
        self.geometry.get_or_discover(&mut self.monitor)
    }

    /// Read `buf.len()` bytes at `offset`
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.read_with_progress(offset, buf, &mut NoProgress)
    }

    /// Read `buf.len()` bytes at `offset`, reporting progress per chunk
    pub fn read_with_progress(
        &mut self,
        offset: u32,
        buf: &mut [u8],
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        self.check(offset, buf.len())?;
        log::debug!("Flash read: offset 0x{:x}, size 0x{:x}", offset, buf.len());
        self.engine()?.read(offset, buf, progress)
    }

    /// Program `data` at `offset`
    ///
    /// The range must have been erased first; a failure part way leaves
    /// the chunks written so far in place.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.write_with_progress(offset, data, &mut NoProgress)
    }

    /// Program `data` at `offset`, reporting progress per chunk
    pub fn write_with_progress(
        &mut self,
        offset: u32,
        data: &[u8],
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        self.check(offset, data.len())?;
        log::debug!("Flash write: offset 0x{:x}, size 0x{:x}", offset, data.len());
        self.engine()?.write(offset, data, progress)
    }

    /// Erase `size` bytes at `offset`
    pub fn erase(&mut self, offset: u32, size: u32) -> Result<()> {
        self.erase_with_progress(offset, size, &mut NoProgress)
    }

    /// Erase `size` bytes at `offset`, reporting progress per chunk
    pub fn erase_with_progress(
        &mut self,
        offset: u32,
        size: u32,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        self.check(offset, size as usize)?;
        log::debug!("Flash erase: offset 0x{:x}, size 0x{:x}", offset, size);
        self.engine()?.erase(offset, size, progress)
    }

    /// Shared access to the monitor
    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    /// Exclusive access to the monitor
    pub fn monitor_mut(&mut self) -> &mut M {
        &mut self.monitor
    }

    /// Give the monitor back
    pub fn into_inner(self) -> M {
        self.monitor
    }

    fn check(&mut self, offset: u32, len: usize) -> Result<()> {
        let geometry = self.flash_info()?;
        let size = u32::try_from(len).map_err(|_| Error::InvalidArgument)?;
        validate(&geometry, offset, size)
    }

    fn engine(&mut self) -> Result<TransferEngine<'_, M>> {
        TransferEngine::with_chunk_size(&mut self.monitor, self.chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiscoveryFault, ErrorKind, RangeFault};
    use crate::monitor::SmcFunction;
    use crate::progress::{ProgressState, TransferOp};
    use crate::testing::{pattern, MockMonitor, SECTOR_COUNT, TOTAL_SIZE};
    use std::vec;
    use std::vec::Vec;

    fn flash() -> ScpFlash<MockMonitor> {
        ScpFlash::new(MockMonitor::new()).with_reserved_size(0)
    }

    #[test]
    fn test_flash_info_is_cached() {
        let mut flash = flash();
        let first = flash.flash_info().unwrap();
        assert_eq!(first.sector_count, SECTOR_COUNT);
        assert_eq!(first.total_size, TOTAL_SIZE);
        for _ in 0..5 {
            assert_eq!(flash.flash_info().unwrap(), first);
        }
        flash.read(0, &mut [0u8; 32]).unwrap();
        assert_eq!(flash.monitor().count(SmcFunction::Info), 1);
    }

    #[test]
    fn test_reserved_region_applies() {
        // One 4 KiB sector reserved out of four
        let mut flash = ScpFlash::new(MockMonitor::new()).with_reserved_size(4096);
        assert_eq!(flash.flash_info().unwrap().total_size, 3 * 4096);

        // Too large a reserve leaves nothing usable
        let mut flash = ScpFlash::new(MockMonitor::new()).with_reserved_size(16384);
        assert!(matches!(
            flash.flash_info(),
            Err(Error::Discovery(DiscoveryFault::TooFewSectors { .. }))
        ));
    }

    #[test]
    fn test_round_trip() {
        let mut flash = flash();
        let data = pattern(3 * 1024 + 96);

        flash.erase(0x400, 4096).unwrap();
        flash.write(0x400, &data).unwrap();

        let mut buf = vec![0u8; data.len()];
        flash.read(0x400, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_chunk_size_does_not_change_result() {
        let data = pattern(4096);
        let mut results = Vec::new();
        for chunk in [32, 256, 1024] {
            let mut flash = flash().with_chunk_size(chunk).unwrap();
            flash.write(0x1000, &data).unwrap();
            let mut buf = vec![0u8; 4096];
            flash.read(0x1000, &mut buf).unwrap();
            results.push((buf, flash.into_inner().flash));
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(results[0].0, data);
    }

    #[test]
    fn test_invalid_requests_do_not_reach_the_channel() {
        let mut flash = flash();
        flash.flash_info().unwrap();
        let calls = flash.monitor().log.len();

        assert_eq!(
            flash.erase(0, 0),
            Err(Error::InvalidRange(RangeFault::ZeroSize))
        );
        assert!(matches!(
            flash.write(16, &[0u8; 32]),
            Err(Error::InvalidRange(RangeFault::Misaligned { .. }))
        ));

        let mut buf = [0u8; 64];
        let err = flash.read(TOTAL_SIZE - 32, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert_eq!(flash.monitor().log.len(), calls);
    }

    #[test]
    fn test_progress_reaches_100() {
        let mut flash = flash();
        let mut last = None;
        let mut sink = |state: &ProgressState| {
            if let Some(prev) = last {
                assert!(state.percent >= prev);
            }
            assert_eq!(state.operation, TransferOp::Erase);
            last = Some(state.percent);
        };
        flash.erase_with_progress(0, TOTAL_SIZE, &mut sink).unwrap();
        assert_eq!(last, Some(100));
    }

    #[test]
    fn test_with_chunk_size_rejects_unaligned() {
        assert_eq!(
            flash().with_chunk_size(48).err(),
            Some(Error::InvalidArgument)
        );
    }

    #[test]
    fn test_with_chunk_size_rejects_oversized() {
        // The mock has a 1 KiB staging buffer
        assert_eq!(
            flash().with_chunk_size(2048).err(),
            Some(Error::InvalidArgument)
        );
        assert_eq!(flash().with_chunk_size(1024).unwrap().chunk_size(), 1024);
    }
}
