//! Bounds validation and the chunked transfer engine
//!
//! A validated request is split into chunks no larger than the staging
//! buffer. Each chunk of a read or write is carried by this call sequence:
//!
//! ```text
//! write:  POSITION(0)  PUSH x (chunk / 32)  WRITE(offset, chunk)
//! read:   POSITION(0)  READ(offset, chunk)  PULL x (chunk / 32)
//! erase:  ERASE(offset, chunk)
//! ```
//!
//! Any nonzero status aborts the whole transfer without retry. Chunks that
//! completed before the failure stay committed to the flash.

use crate::error::{Error, RangeFault, Result};
use crate::geometry::FlashGeometry;
use crate::monitor::{SecureMonitor, SmcFunction, SmcResult};
use crate::progress::{ProgressSink, ProgressState, TransferOp};
use crate::staging::{pack_words, unpack_words, ALIGNMENT, STAGING_BUFFER_SIZE, WORD_GROUP_SIZE};

/// Default size of one bulk READ/WRITE/ERASE call
pub const CHANNEL_CHUNK_SIZE: u32 = STAGING_BUFFER_SIZE as u32;

/// Check that `[offset, offset + size)` is a valid transfer for `geometry`
///
/// Rules, in order: size is not zero; offset and size are multiples of
/// [`ALIGNMENT`]; the range ends within the usable flash.
pub fn validate(geometry: &FlashGeometry, offset: u32, size: u32) -> Result<()> {
    if size == 0 {
        log::error!("Invalid size (0)");
        return Err(Error::InvalidRange(RangeFault::ZeroSize));
    }

    if offset % ALIGNMENT != 0 || size % ALIGNMENT != 0 {
        log::error!("Invalid offset (0x{:x}) or size (0x{:x}) alignment", offset, size);
        return Err(Error::InvalidRange(RangeFault::Misaligned { offset, size }));
    }

    let end = offset as u64 + size as u64;
    if end > geometry.total_size as u64 {
        log::error!(
            "Invalid size (0x{:x}) and offset (0x{:x}) combination",
            size,
            offset
        );
        return Err(Error::InvalidRange(RangeFault::OutOfBounds {
            offset,
            size,
            total_size: geometry.total_size,
        }));
    }

    Ok(())
}

/// Drives chunked transfers over a [`SecureMonitor`]
///
/// The engine does not check bounds against the flash geometry; callers
/// run [`validate`] first. It does reject lengths that are not a whole
/// number of word groups, since those cannot be expressed on the channel.
pub struct TransferEngine<'m, M: SecureMonitor + ?Sized> {
    monitor: &'m mut M,
    chunk_size: u32,
}

impl<'m, M: SecureMonitor + ?Sized> TransferEngine<'m, M> {
    /// Create an engine using [`CHANNEL_CHUNK_SIZE`] chunks
    pub fn new(monitor: &'m mut M) -> Self {
        Self {
            monitor,
            chunk_size: CHANNEL_CHUNK_SIZE,
        }
    }

    /// Create an engine with a custom chunk size
    ///
    /// The chunk size must be a nonzero multiple of [`ALIGNMENT`] and must
    /// not exceed the staging buffer of the monitor being driven.
    pub fn with_chunk_size(monitor: &'m mut M, chunk_size: u32) -> Result<Self> {
        check_chunk_size(chunk_size, monitor.staging_capacity())?;
        Ok(Self {
            monitor,
            chunk_size,
        })
    }

    /// Chunk size in bytes
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Read `buf.len()` bytes starting at `offset`
    pub fn read(&mut self, offset: u32, buf: &mut [u8], progress: &mut dyn ProgressSink) -> Result<()> {
        let op = TransferOp::Read;
        let size = transfer_len(buf.len())?;
        let mut state = ProgressState::new(op, offset, size);
        let mut pos = offset;

        for chunk in buf.chunks_mut(self.chunk_size as usize) {
            let len = chunk.len() as u32;

            self.reset_position(op, pos, &state)?;
            self.bulk(SmcFunction::Read, op, pos, len, &state)?;

            for group in chunk.chunks_exact_mut(WORD_GROUP_SIZE) {
                let res = self.monitor.call(SmcFunction::Pull, [0; 7]);
                unpack_words(&res.words(), group);
            }

            pos += len;
            state.advance(len);
            log::trace!("Read 0x{:x} bytes at 0x{:x}", len, pos - len);
            progress.report(&state);
        }

        Ok(())
    }

    /// Program `data` starting at `offset`
    ///
    /// The target range should have been erased first.
    pub fn write(&mut self, offset: u32, data: &[u8], progress: &mut dyn ProgressSink) -> Result<()> {
        let op = TransferOp::Write;
        let size = transfer_len(data.len())?;
        let mut state = ProgressState::new(op, offset, size);
        let mut pos = offset;

        for chunk in data.chunks(self.chunk_size as usize) {
            let len = chunk.len() as u32;

            self.reset_position(op, pos, &state)?;

            for group in chunk.chunks_exact(WORD_GROUP_SIZE) {
                let w = pack_words(group);
                let res = self
                    .monitor
                    .call(SmcFunction::Push, [w[0], w[1], w[2], w[3], 0, 0, 0]);
                check(SmcFunction::Push, op, pos, &state, res)?;
            }

            self.bulk(SmcFunction::Write, op, pos, len, &state)?;

            pos += len;
            state.advance(len);
            log::trace!("Wrote 0x{:x} bytes at 0x{:x}", len, pos - len);
            progress.report(&state);
        }

        Ok(())
    }

    /// Erase `size` bytes starting at `offset`
    pub fn erase(&mut self, offset: u32, size: u32, progress: &mut dyn ProgressSink) -> Result<()> {
        let op = TransferOp::Erase;
        transfer_len(size as usize)?;
        let mut state = ProgressState::new(op, offset, size);
        let mut pos = offset;
        let mut remaining = size;

        while remaining > 0 {
            let len = remaining.min(self.chunk_size);

            self.bulk(SmcFunction::Erase, op, pos, len, &state)?;

            pos += len;
            remaining -= len;
            state.advance(len);
            log::trace!("Erased 0x{:x} bytes at 0x{:x}", len, pos - len);
            progress.report(&state);
        }

        Ok(())
    }

    fn reset_position(&mut self, op: TransferOp, pos: u32, state: &ProgressState) -> Result<()> {
        let res = self.monitor.call2(SmcFunction::Position, 0, 0);
        check(SmcFunction::Position, op, pos, state, res)
    }

    fn bulk(
        &mut self,
        function: SmcFunction,
        op: TransferOp,
        pos: u32,
        len: u32,
        state: &ProgressState,
    ) -> Result<()> {
        let res = self.monitor.call2(function, pos as u64, len as u64);
        check(function, op, pos, state, res)
    }
}

/// Validate a chunk size for [`TransferEngine::with_chunk_size`]
///
/// `staging_capacity` is the staging buffer size of the monitor that will
/// carry the chunks.
pub fn check_chunk_size(chunk_size: u32, staging_capacity: usize) -> Result<()> {
    if chunk_size == 0 || chunk_size % ALIGNMENT != 0 {
        return Err(Error::InvalidArgument);
    }
    if chunk_size as usize > staging_capacity {
        log::error!(
            "Chunk size 0x{:x} exceeds the 0x{:x} byte staging buffer",
            chunk_size,
            staging_capacity
        );
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

fn transfer_len(len: usize) -> Result<u32> {
    let size = u32::try_from(len).map_err(|_| Error::InvalidArgument)?;
    if size % ALIGNMENT != 0 {
        return Err(Error::InvalidRange(RangeFault::Misaligned { offset: 0, size }));
    }
    Ok(size)
}

fn check(
    function: SmcFunction,
    op: TransferOp,
    pos: u32,
    state: &ProgressState,
    res: SmcResult,
) -> Result<()> {
    if res.is_ok() {
        return Ok(());
    }
    log::error!(
        "{} failed during flash {} at offset 0x{:x} with 0x{:x} bytes remaining (a0 = 0x{:x})",
        function.name(),
        op,
        pos,
        state.total_size - state.bytes_transferred,
        res.a0
    );
    Err(Error::ChannelFailure(op))
}
