//! Error types for the client library

use std::io;

use scpflash_core::{Error as CoreError, ErrorKind};
use thiserror::Error;

/// Client library errors
#[derive(Debug, Error)]
pub enum LibError {
    /// Error reported by the flash layer
    #[error(transparent)]
    Flash(#[from] CoreError),

    /// The device node could not be opened
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl LibError {
    /// Client-visible category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Flash(e) => e.kind(),
            Self::Open { source, .. } => match source.raw_os_error() {
                Some(errno) if errno == nix::errno::Errno::EBUSY as i32 => ErrorKind::Busy,
                _ => ErrorKind::NoDevice,
            },
        }
    }

    /// errno-style code of this error
    pub fn errno(&self) -> i32 {
        self.kind().errno()
    }
}

/// Result type for client library operations
pub type Result<T> = std::result::Result<T, LibError>;
