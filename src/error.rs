//! Tool error type and exit codes

use std::io;
use std::path::PathBuf;

use scpflash_core::Error as CoreError;
use scpflash_lib::LibError;
use thiserror::Error;

/// Errors reported by the command line tool
#[derive(Debug, Error)]
pub enum ToolError {
    /// Flash layer error
    #[error(transparent)]
    Flash(#[from] CoreError),

    /// Client library error
    #[error(transparent)]
    Lib(#[from] LibError),

    /// Input or output file error
    #[error("Cannot access \"{}\": {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Terminal I/O error (confirmation prompt)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Offset, size and skip do not describe a usable region
    #[error("Invalid size, offset or skip value or its combination")]
    InvalidRegion,

    /// `--emulate` was requested but the emulator is not built in
    #[cfg(not(feature = "emulator"))]
    #[error("Emulation support is not compiled in (enable the 'emulator' feature)")]
    EmulationUnavailable,
}

impl ToolError {
    /// Wrap a file error with the path it concerns
    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    /// Process exit code (errno style)
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Flash(e) => e.errno(),
            Self::Lib(e) => e.errno(),
            Self::File { source, .. } | Self::Io(source) => source.raw_os_error().unwrap_or(5),
            Self::InvalidRegion => 22,
            #[cfg(not(feature = "emulator"))]
            Self::EmulationUnavailable => 19,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ToolError::from(CoreError::Busy).exit_code(), 16);
        assert_eq!(
            ToolError::from(CoreError::VerificationFailed { offset: 0 }).exit_code(),
            84
        );
        assert_eq!(
            ToolError::from(LibError::from(CoreError::NoDevice)).exit_code(),
            19
        );
        assert_eq!(ToolError::InvalidRegion.exit_code(), 22);

        let missing = io::Error::from_raw_os_error(2);
        assert_eq!(ToolError::file("/tmp/x", missing).exit_code(), 2);
    }

    #[cfg(not(feature = "emulator"))]
    #[test]
    fn test_emulation_unavailable_is_no_device() {
        assert_eq!(ToolError::EmulationUnavailable.exit_code(), 19);
    }
}
