//! Chunked relay over the request surface
//!
//! [`ScpLib`] splits a transfer into [`RELAY_CHUNK_SIZE`] requests, each of
//! which crosses the system-call boundary once. Progress is reported once
//! before the first request and then only when the whole-number percentage
//! changes, so the caller sees at most 101 notifications per transfer.

use once_cell::unsync::OnceCell;
use scpflash_core::control::ScpControl;
use scpflash_core::progress::{ProgressSink, ProgressState, TransferOp};
use scpflash_core::transfer::validate;
use scpflash_core::{FlashGeometry, Version, ALIGNMENT};

use crate::error::Result;

/// Bytes per request across the system-call boundary
pub const RELAY_CHUNK_SIZE: u32 = 1024;

/// Version of the client library
pub const LIB_VERSION: Version = Version::new(0, 1, 0);

/// Versions of the client stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Version reported by the driver
    pub driver_version: Version,
    /// Version of this library
    pub lib_version: Version,
}

/// Forwards progress to a sink, dropping repeats of the same percentage
struct Dedup<'a> {
    sink: &'a mut dyn ProgressSink,
    last: Option<u32>,
}

impl<'a> Dedup<'a> {
    fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    fn report(&mut self, state: &ProgressState) {
        if self.last == Some(state.percent) {
            return;
        }
        self.last = Some(state.percent);
        self.sink.report(state);
    }
}

/// Client library context
///
/// # Example
///
/// ```ignore
/// use scpflash_core::progress::NoProgress;
/// use scpflash_lib::{ScpLib, ScpNode};
///
/// let mut lib = ScpLib::new(ScpNode::open()?);
/// let geometry = lib.flash_info()?;
/// let mut image = vec![0u8; geometry.total_size as usize];
/// lib.flash_read(0, &mut image, &mut NoProgress)?;
/// ```
pub struct ScpLib<D> {
    control: D,
    geometry: OnceCell<FlashGeometry>,
}

impl<D: ScpControl> ScpLib<D> {
    /// Wrap an open request surface
    pub fn new(control: D) -> Self {
        Self {
            control,
            geometry: OnceCell::new(),
        }
    }

    /// Driver and library versions
    pub fn version(&mut self) -> Result<VersionInfo> {
        let info = self.control.driver_info()?;
        Ok(VersionInfo {
            driver_version: info.driver_version,
            lib_version: LIB_VERSION,
        })
    }

    /// Usable flash geometry, fetched from the driver once
    pub fn flash_info(&mut self) -> Result<FlashGeometry> {
        let control = &mut self.control;
        let geometry = self.geometry.get_or_try_init(|| control.flash_info())?;
        Ok(*geometry)
    }

    /// Required alignment of offsets and sizes
    pub fn alignment(&self) -> u32 {
        ALIGNMENT
    }

    /// Read `buf.len()` bytes at `offset`
    pub fn flash_read(
        &mut self,
        offset: u32,
        buf: &mut [u8],
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        let mut state = self.begin(TransferOp::Read, offset, buf.len())?;
        let mut progress = Dedup::new(progress);
        progress.report(&state);

        let mut pos = offset;
        for chunk in buf.chunks_mut(RELAY_CHUNK_SIZE as usize) {
            let len = chunk.len() as u32;
            let data = self.control.flash_read(pos, len)?;
            let data = data
                .get(..chunk.len())
                .ok_or(scpflash_core::Error::ChannelFailure(TransferOp::Read))?;
            chunk.copy_from_slice(data);

            pos += len;
            state.advance(len);
            progress.report(&state);
        }
        Ok(())
    }

    /// Program `data` at `offset`
    ///
    /// The range must have been erased first.
    pub fn flash_write(
        &mut self,
        offset: u32,
        data: &[u8],
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        let mut state = self.begin(TransferOp::Write, offset, data.len())?;
        let mut progress = Dedup::new(progress);
        progress.report(&state);

        let mut pos = offset;
        for chunk in data.chunks(RELAY_CHUNK_SIZE as usize) {
            let len = chunk.len() as u32;
            self.control.flash_write(pos, len, chunk)?;

            pos += len;
            state.advance(len);
            progress.report(&state);
        }
        Ok(())
    }

    /// Erase `size` bytes at `offset`
    pub fn flash_erase(
        &mut self,
        offset: u32,
        size: u32,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        let mut state = self.begin(TransferOp::Erase, offset, size as usize)?;
        let mut progress = Dedup::new(progress);
        progress.report(&state);

        let mut pos = offset;
        let mut remaining = size;
        while remaining > 0 {
            let len = remaining.min(RELAY_CHUNK_SIZE);
            self.control.flash_erase(pos, len)?;

            pos += len;
            remaining -= len;
            state.advance(len);
            progress.report(&state);
        }
        Ok(())
    }

    /// Shared access to the request surface
    pub fn control(&self) -> &D {
        &self.control
    }

    /// Exclusive access to the request surface
    pub fn control_mut(&mut self) -> &mut D {
        &mut self.control
    }

    /// Give the request surface back
    pub fn into_inner(self) -> D {
        self.control
    }

    fn begin(&mut self, op: TransferOp, offset: u32, len: usize) -> Result<ProgressState> {
        let size = u32::try_from(len).map_err(|_| scpflash_core::Error::InvalidArgument)?;
        let geometry = self.flash_info()?;
        validate(&geometry, offset, size)?;
        log::debug!("{} 0x{:x} bytes at 0x{:x}", op.verb(), size, offset);
        Ok(ProgressState::new(op, offset, size))
    }
}
