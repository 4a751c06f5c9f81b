//! Client for the `/dev/scp` device node
//!
//! The kernel side of the flash device takes plain (non-`_IOC` encoded)
//! ioctl request numbers. Read and write requests carry a pointer to the
//! caller's buffer; the driver copies at most one request's worth of data
//! across the boundary.

use std::ffi::c_void;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use log::{debug, error, info};
use nix::errno::Errno;
use scpflash_core::control::{DriverInfo, ScpControl};
use scpflash_core::{Error as CoreError, FlashGeometry, Result as CoreResult, TransferOp, Version};

use crate::error::{LibError, Result};

/// Default device node path
pub const DEFAULT_DEVICE_PATH: &str = "/dev/scp";

const SCP_IOCTL_INFO: u32 = 100;
const SCP_IOCTL_FLASH_INFO: u32 = 110;
const SCP_IOCTL_FLASH_READ: u32 = 111;
const SCP_IOCTL_FLASH_WRITE: u32 = 112;
const SCP_IOCTL_FLASH_ERASE: u32 = 113;

#[repr(C)]
#[derive(Debug, Default)]
struct IoctlInfo {
    drv_version: u32,
}

#[repr(C)]
#[derive(Debug, Default)]
struct IoctlFlashInfo {
    sector_count: u32,
    sector_size: u32,
    total_size: u32,
}

#[repr(C)]
struct IoctlFlashRead {
    offset: u32,
    size: u32,
    data: *mut c_void,
}

#[repr(C)]
struct IoctlFlashWrite {
    offset: u32,
    size: u32,
    data: *const c_void,
}

#[repr(C)]
struct IoctlFlashErase {
    offset: u32,
    size: u32,
}

nix::ioctl_read_bad!(scp_info, SCP_IOCTL_INFO, IoctlInfo);
nix::ioctl_read_bad!(scp_flash_info, SCP_IOCTL_FLASH_INFO, IoctlFlashInfo);
nix::ioctl_write_ptr_bad!(scp_flash_read, SCP_IOCTL_FLASH_READ, IoctlFlashRead);
nix::ioctl_write_ptr_bad!(scp_flash_write, SCP_IOCTL_FLASH_WRITE, IoctlFlashWrite);
nix::ioctl_write_ptr_bad!(scp_flash_erase, SCP_IOCTL_FLASH_ERASE, IoctlFlashErase);

/// An open handle on the flash device node
///
/// The driver allows one open handle at a time, so opening fails with a
/// `Busy` kind while another client holds the device.
#[derive(Debug)]
pub struct ScpNode {
    file: File,
}

impl ScpNode {
    /// Open [`DEFAULT_DEVICE_PATH`]
    pub fn open() -> Result<Self> {
        Self::open_path(DEFAULT_DEVICE_PATH)
    }

    /// Open a device node at `path`
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| LibError::Open {
                path: path.display().to_string(),
                source: e,
            })?;

        info!("Opened {}", path.display());
        Ok(Self { file })
    }
}

fn ioctl_error(name: &str, op: TransferOp, errno: Errno) -> CoreError {
    error!("{} ioctl failed: {}", name, errno);
    CoreError::from_errno(errno as i32, op)
}

impl ScpControl for ScpNode {
    fn driver_info(&mut self) -> CoreResult<DriverInfo> {
        let mut arg = IoctlInfo::default();
        // SAFETY: valid fd, and `arg` is a properly sized struct the driver fills
        unsafe {
            scp_info(self.file.as_raw_fd(), &mut arg)
                .map_err(|e| ioctl_error("INFO", TransferOp::Read, e))?;
        }

        Ok(DriverInfo {
            driver_version: Version(arg.drv_version),
        })
    }

    fn flash_info(&mut self) -> CoreResult<FlashGeometry> {
        let mut arg = IoctlFlashInfo::default();
        // SAFETY: valid fd, and `arg` is a properly sized struct the driver fills
        unsafe {
            scp_flash_info(self.file.as_raw_fd(), &mut arg)
                .map_err(|e| ioctl_error("FLASH_INFO", TransferOp::Read, e))?;
        }

        debug!(
            "Device geometry: {} sectors x {} bytes = 0x{:x}",
            arg.sector_count, arg.sector_size, arg.total_size
        );
        Ok(FlashGeometry {
            sector_count: arg.sector_count,
            sector_size: arg.sector_size,
            total_size: arg.total_size,
        })
    }

    fn flash_read(&mut self, offset: u32, size: u32) -> CoreResult<Vec<u8>> {
        let mut buf = vec![0u8; size as usize];
        let arg = IoctlFlashRead {
            offset,
            size,
            data: buf.as_mut_ptr().cast(),
        };
        // SAFETY: valid fd; `data` points at `size` writable bytes that
        // outlive the call
        unsafe {
            scp_flash_read(self.file.as_raw_fd(), &arg)
                .map_err(|e| ioctl_error("FLASH_READ", TransferOp::Read, e))?;
        }
        Ok(buf)
    }

    fn flash_write(&mut self, offset: u32, size: u32, data: &[u8]) -> CoreResult<()> {
        if data.len() < size as usize {
            return Err(CoreError::InvalidArgument);
        }
        let arg = IoctlFlashWrite {
            offset,
            size,
            data: data.as_ptr().cast(),
        };
        // SAFETY: valid fd; `data` points at at least `size` readable bytes
        unsafe {
            scp_flash_write(self.file.as_raw_fd(), &arg)
                .map_err(|e| ioctl_error("FLASH_WRITE", TransferOp::Write, e))?;
        }
        Ok(())
    }

    fn flash_erase(&mut self, offset: u32, size: u32) -> CoreResult<()> {
        let arg = IoctlFlashErase { offset, size };
        // SAFETY: valid fd and a properly initialized argument struct
        unsafe {
            scp_flash_erase(self.file.as_raw_fd(), &arg)
                .map_err(|e| ioctl_error("FLASH_ERASE", TransferOp::Erase, e))?;
        }
        Ok(())
    }
}
