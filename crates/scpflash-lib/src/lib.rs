//! scpflash-lib - User-space client library for the SCP flash device
//!
//! [`ScpLib`] sits on top of any [`ScpControl`](scpflash_core::control::ScpControl)
//! implementation: [`ScpNode`], which talks to `/dev/scp` through ioctls,
//! or an in-process session of an `scpflash_driver::ScpDevice`. It resolves
//! the flash geometry once, validates requests before they cross the
//! system-call boundary, splits transfers into [`RELAY_CHUNK_SIZE`]
//! requests and reports de-duplicated progress.

pub mod error;
pub mod node;
pub mod relay;

pub use error::{LibError, Result};
pub use node::{ScpNode, DEFAULT_DEVICE_PATH};
pub use relay::{ScpLib, VersionInfo, LIB_VERSION, RELAY_CHUNK_SIZE};
