//! scpflash-driver - Device front end for the SCP flash service
//!
//! This crate puts the privileged flash context behind a device that hands
//! out at most one client session at a time. The session implements
//! [`ScpControl`](scpflash_core::control::ScpControl), the same request
//! surface the device node offers, and performs the request checks the
//! ioctl layer does (zero sizes, short payloads, buffer allocation) before
//! any monitor call is made.
//!
//! # Example
//!
//! ```ignore
//! use scpflash_core::control::ScpControl;
//! use scpflash_driver::ScpDevice;
//!
//! let device = ScpDevice::new(monitor);
//! let mut session = device.acquire()?;
//! let geometry = session.flash_info()?;
//! let head = session.flash_read(0, 1024)?;
//!
//! // Busy until the first session goes away
//! assert!(device.acquire().is_err());
//! session.release();
//! ```

pub mod device;
pub mod error;

pub use device::{ScpDevice, Session, DEVICE_NAME, DRIVER_VERSION};
pub use error::{DriverError, Result};
