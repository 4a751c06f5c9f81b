//! Single-session device and its request dispatcher

use std::sync::{Mutex, MutexGuard};

use scpflash_core::control::{DriverInfo, ScpControl};
use scpflash_core::flash::ScpFlash;
use scpflash_core::monitor::SecureMonitor;
use scpflash_core::transfer::validate;
use scpflash_core::{Error as CoreError, FlashGeometry, Result as CoreResult, Version};

use crate::error::{DriverError, Result};

/// Version of the device front end
pub const DRIVER_VERSION: Version = Version::new(0, 1, 0);

/// Device node name under `/dev`
pub const DEVICE_NAME: &str = "scp";

/// The flash service exposed as a device that one client may hold at a time
///
/// The device owns the flash context. Clients get at it only through a
/// [`Session`], and at most one session exists at any moment; a second
/// [`ScpDevice::acquire`] fails with [`CoreError::Busy`] instead of waiting.
pub struct ScpDevice<M> {
    open_count: Mutex<u32>,
    flash: Mutex<ScpFlash<M>>,
}

impl<M: SecureMonitor> ScpDevice<M> {
    /// Create the device around a monitor with the default flash settings
    pub fn new(monitor: M) -> Self {
        Self::with_flash(ScpFlash::new(monitor))
    }

    /// Create the device around a configured flash context
    pub fn with_flash(flash: ScpFlash<M>) -> Self {
        log::info!("SCP flash device /dev/{} ready (driver {})", DEVICE_NAME, DRIVER_VERSION);
        Self {
            open_count: Mutex::new(0),
            flash: Mutex::new(flash),
        }
    }

    /// Open the single client session
    pub fn acquire(&self) -> CoreResult<Session<'_, M>> {
        let mut count = self.lock_count()?;
        if *count > 0 {
            log::debug!("Device busy, rejecting open");
            return Err(CoreError::Busy);
        }
        *count += 1;
        log::debug!("Session opened");
        Ok(Session { device: self })
    }

    /// Whether a session is currently open
    pub fn is_open(&self) -> bool {
        match self.open_count.lock() {
            Ok(count) => *count > 0,
            Err(poisoned) => *poisoned.into_inner() > 0,
        }
    }

    /// Tear the device down and return the flash context
    pub fn into_flash(self) -> Result<ScpFlash<M>> {
        self.flash
            .into_inner()
            .map_err(|_| DriverError::Poisoned("flash"))
    }

    fn lock_count(&self) -> Result<MutexGuard<'_, u32>> {
        self.open_count
            .lock()
            .map_err(|_| DriverError::Poisoned("open count"))
    }

    fn lock_flash(&self) -> Result<MutexGuard<'_, ScpFlash<M>>> {
        self.flash.lock().map_err(|_| DriverError::Poisoned("flash"))
    }

    fn release(&self) {
        // A poisoned counter still has to be decremented or the device
        // stays busy forever
        let mut count = match self.open_count.lock() {
            Ok(count) => count,
            Err(poisoned) => poisoned.into_inner(),
        };
        *count = count.saturating_sub(1);
        log::debug!("Session closed");
    }
}

/// The open client session of an [`ScpDevice`]
///
/// Dropping the session releases the device. Requests are validated here
/// the same way the device node validates ioctl arguments before the
/// transfer is started.
pub struct Session<'d, M: SecureMonitor> {
    device: &'d ScpDevice<M>,
}

impl<M: SecureMonitor> Session<'_, M> {
    /// Close the session
    pub fn release(self) {
        drop(self)
    }

    fn flash(&self) -> Result<MutexGuard<'_, ScpFlash<M>>> {
        self.device.lock_flash()
    }
}

impl<M: SecureMonitor> Drop for Session<'_, M> {
    fn drop(&mut self) {
        self.device.release();
    }
}

impl<M: SecureMonitor> ScpControl for Session<'_, M> {
    fn driver_info(&mut self) -> CoreResult<DriverInfo> {
        Ok(DriverInfo {
            driver_version: DRIVER_VERSION,
        })
    }

    fn flash_info(&mut self) -> CoreResult<FlashGeometry> {
        Ok(self.flash()?.flash_info()?)
    }

    fn flash_read(&mut self, offset: u32, size: u32) -> CoreResult<Vec<u8>> {
        check_size(size)?;
        let mut flash = self.flash()?;
        validate(&flash.flash_info()?, offset, size)?;

        let mut buf = alloc_buffer(size)?;
        buf.resize(size as usize, 0);
        flash.read(offset, &mut buf)?;
        Ok(buf)
    }

    fn flash_write(&mut self, offset: u32, size: u32, data: &[u8]) -> CoreResult<()> {
        check_size(size)?;
        if data.len() < size as usize {
            log::error!(
                "Write payload too short: 0x{:x} bytes for size 0x{:x}",
                data.len(),
                size
            );
            return Err(CoreError::InvalidArgument);
        }
        let mut flash = self.flash()?;
        validate(&flash.flash_info()?, offset, size)?;

        let mut buf = alloc_buffer(size)?;
        buf.extend_from_slice(&data[..size as usize]);
        flash.write(offset, &buf)?;
        Ok(())
    }

    fn flash_erase(&mut self, offset: u32, size: u32) -> CoreResult<()> {
        check_size(size)?;
        Ok(self.flash()?.erase(offset, size)?)
    }
}

fn check_size(size: u32) -> CoreResult<()> {
    if size == 0 {
        log::error!("Invalid size (0)");
        return Err(CoreError::InvalidArgument);
    }
    Ok(())
}

fn alloc_buffer(size: u32) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size as usize).map_err(|_| {
        log::error!("Failed to allocate 0x{:x} byte transfer buffer", size);
        CoreError::OutOfMemory
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scpflash_core::ErrorKind;
    use scpflash_emulator::{EmulatedMonitor, EmulatorConfig};

    fn device() -> ScpDevice<EmulatedMonitor> {
        ScpDevice::new(EmulatedMonitor::new(EmulatorConfig {
            sector_count: 16,
            sector_size: 64 * 1024,
        }))
    }

    #[test]
    fn test_single_session() {
        let device = device();
        let session = device.acquire().unwrap();
        assert!(device.is_open());
        assert!(matches!(device.acquire(), Err(CoreError::Busy)));
        assert!(matches!(device.acquire(), Err(CoreError::Busy)));

        session.release();
        assert!(!device.is_open());

        let session = device.acquire().unwrap();
        drop(session);
        assert!(device.acquire().is_ok());
    }

    #[test]
    fn test_busy_across_threads() {
        let device = device();
        let _session = device.acquire().unwrap();
        std::thread::scope(|s| {
            let other = s.spawn(|| device.acquire().map(|_| ()));
            assert_eq!(other.join().unwrap(), Err(CoreError::Busy));
        });
    }

    #[test]
    fn test_round_trip() {
        let device = device();
        let mut session = device.acquire().unwrap();
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

        session.flash_erase(0x1000, 0x1000).unwrap();
        session.flash_write(0x1000, 0x1000, &data).unwrap();
        assert_eq!(session.flash_read(0x1000, 0x1000).unwrap(), data);
    }

    #[test]
    fn test_write_uses_only_size_bytes() {
        let device = device();
        let mut session = device.acquire().unwrap();
        session.flash_write(0, 32, &[0xAB; 64]).unwrap();
        let back = session.flash_read(0, 64).unwrap();
        assert!(back[..32].iter().all(|&b| b == 0xAB));
        assert!(back[32..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_request_checks() {
        let device = device();
        let mut session = device.acquire().unwrap();
        let total = session.flash_info().unwrap().total_size;

        assert_eq!(session.flash_read(0, 0), Err(CoreError::InvalidArgument));
        assert_eq!(session.flash_erase(0, 0), Err(CoreError::InvalidArgument));
        assert_eq!(
            session.flash_write(0, 64, &[0; 32]),
            Err(CoreError::InvalidArgument)
        );

        let err = session.flash_read(total - 32, 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = session.flash_erase(32, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_driver_info_and_geometry() {
        let device = device();
        let mut session = device.acquire().unwrap();
        assert_eq!(session.driver_info().unwrap().driver_version, DRIVER_VERSION);

        // 16 x 64 KiB raw, 8 sectors reserved
        let geometry = session.flash_info().unwrap();
        assert_eq!(geometry.sector_count, 8);
        assert_eq!(geometry.total_size, 8 * 64 * 1024);
    }

    #[test]
    fn test_geometry_discovered_once_across_sessions() {
        let device = device();
        for _ in 0..3 {
            let mut session = device.acquire().unwrap();
            session.flash_info().unwrap();
            session.flash_read(0, 32).unwrap();
        }
        let flash = device.into_flash().unwrap();
        assert_eq!(
            flash.monitor().calls(scpflash_core::monitor::SmcFunction::Info),
            1
        );
    }
}
