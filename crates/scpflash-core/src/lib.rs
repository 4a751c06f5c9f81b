//! scpflash-core - Core library for SCP boot flash access
//!
//! The boot flash of the platform is not memory mapped. It is only reachable
//! through a firmware service behind the secure monitor call (SMC)
//! interface, which moves data through a small staging buffer one group of
//! machine words at a time. This crate implements everything between a
//! caller's `(offset, size, buffer)` request and the individual monitor
//! calls:
//!
//! - [`monitor`] - the monitor call surface and the real AArch64 adapter
//! - [`staging`] - staging buffer and word-group packing
//! - [`geometry`] - flash geometry discovery and caching
//! - [`transfer`] - bounds validation and the chunked transfer engine
//! - [`flash`] - [`ScpFlash`], the privileged-layer context tying them together
//! - [`control`] - the client-facing request surface (`alloc`)
//!
//! It is `no_std` compatible for use inside privileged environments.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable the request surface, which hands out owned buffers
//!
//! # Example
//!
//! ```ignore
//! use scpflash_core::{flash::ScpFlash, monitor::SecureMonitor};
//!
//! fn dump_first_kib<M: SecureMonitor>(monitor: M) -> scpflash_core::Result<()> {
//!     let mut flash = ScpFlash::new(monitor);
//!     let geometry = flash.flash_info()?;
//!     println!("{} sectors of {} bytes", geometry.sector_count, geometry.sector_size);
//!
//!     let mut buf = [0u8; 1024];
//!     flash.read(0, &mut buf)?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(feature = "alloc")]
pub mod control;
pub mod error;
pub mod flash;
pub mod geometry;
pub mod layout;
pub mod monitor;
pub mod progress;
pub mod staging;
pub mod transfer;
pub mod version;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind, Result};
pub use flash::ScpFlash;
pub use geometry::FlashGeometry;
pub use progress::{ProgressSink, ProgressState, TransferOp};
pub use staging::ALIGNMENT;
pub use version::Version;
