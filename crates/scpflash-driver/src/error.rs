//! Error types for the device front end

use scpflash_core::{Error as CoreError, ErrorKind};
use thiserror::Error;

/// Device front end errors
#[derive(Debug, Error)]
pub enum DriverError {
    /// Error from the flash layer
    #[error(transparent)]
    Flash(#[from] CoreError),

    /// A thread panicked while holding the device state
    #[error("Device state lock poisoned ({0})")]
    Poisoned(&'static str),
}

impl DriverError {
    /// Client-visible category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Flash(e) => e.kind(),
            Self::Poisoned(_) => ErrorKind::NoDevice,
        }
    }
}

impl From<DriverError> for CoreError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Flash(e) => e,
            DriverError::Poisoned(what) => {
                log::error!("Device state lock poisoned ({}), device unusable", what);
                CoreError::NoDevice
            }
        }
    }
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DriverError>;
