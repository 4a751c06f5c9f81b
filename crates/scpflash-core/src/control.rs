//! Client-facing request surface
//!
//! [`ScpControl`] is the boundary between user space and the privileged
//! layer. It is implemented by an in-process session on the device and by
//! the device-node client, so the relay and the tool work the same way over
//! either.

use alloc::vec::Vec;

use crate::error::Result;
use crate::geometry::FlashGeometry;
use crate::version::Version;

/// Information about the privileged layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverInfo {
    /// Driver version
    pub driver_version: Version,
}

/// Requests a client can issue against an open session
///
/// Implementations validate every request against the usable geometry;
/// offsets and sizes must be multiples of [`crate::ALIGNMENT`].
pub trait ScpControl {
    /// Driver version information
    fn driver_info(&mut self) -> Result<DriverInfo>;

    /// Usable flash geometry
    fn flash_info(&mut self) -> Result<FlashGeometry>;

    /// Read exactly `size` bytes at `offset`
    fn flash_read(&mut self, offset: u32, size: u32) -> Result<Vec<u8>>;

    /// Program the first `size` bytes of `data` at `offset`
    ///
    /// `data` must hold at least `size` bytes.
    fn flash_write(&mut self, offset: u32, size: u32, data: &[u8]) -> Result<()>;

    /// Erase `size` bytes at `offset`
    fn flash_erase(&mut self, offset: u32, size: u32) -> Result<()>;
}

impl<C: ScpControl + ?Sized> ScpControl for &mut C {
    fn driver_info(&mut self) -> Result<DriverInfo> {
        (**self).driver_info()
    }

    fn flash_info(&mut self) -> Result<FlashGeometry> {
        (**self).flash_info()
    }

    fn flash_read(&mut self, offset: u32, size: u32) -> Result<Vec<u8>> {
        (**self).flash_read(offset, size)
    }

    fn flash_write(&mut self, offset: u32, size: u32, data: &[u8]) -> Result<()> {
        (**self).flash_write(offset, size, data)
    }

    fn flash_erase(&mut self, offset: u32, size: u32) -> Result<()> {
        (**self).flash_erase(offset, size)
    }
}

impl<C: ScpControl + ?Sized> ScpControl for alloc::boxed::Box<C> {
    fn driver_info(&mut self) -> Result<DriverInfo> {
        (**self).driver_info()
    }

    fn flash_info(&mut self) -> Result<FlashGeometry> {
        (**self).flash_info()
    }

    fn flash_read(&mut self, offset: u32, size: u32) -> Result<Vec<u8>> {
        (**self).flash_read(offset, size)
    }

    fn flash_write(&mut self, offset: u32, size: u32, data: &[u8]) -> Result<()> {
        (**self).flash_write(offset, size, data)
    }

    fn flash_erase(&mut self, offset: u32, size: u32) -> Result<()> {
        (**self).flash_erase(offset, size)
    }
}
