//! CLI command implementations
//!
//! Every flash command runs against an [`ScpLib`](scpflash_lib::ScpLib) so the
//! same code drives the device node and the in-process emulator. The helpers
//! here turn the region options into an aligned `(offset, size)` pair and ask
//! for confirmation before destructive operations.

pub mod erase;
pub mod partitions;
pub mod progress;
pub mod read;
pub mod version;
pub mod write;

use std::io::{BufRead, Write};

use scpflash_core::layout::find_partition;
use scpflash_core::ALIGNMENT;

use crate::cli::RegionArgs;
use crate::error::ToolError;

/// Offset and optional size requested on the command line
///
/// `--part` supplies both; an explicit `--offset` or `--size` overrides the
/// partition's value. A size of zero means "use the default".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub offset: u32,
    pub size: Option<u32>,
}

impl Region {
    /// Resolve the region options
    pub fn resolve(args: &RegionArgs) -> Result<Self, ToolError> {
        let mut region = Region {
            offset: 0,
            size: None,
        };

        if let Some(name) = &args.part {
            let part = find_partition(name).map_err(|e| {
                log::error!("Unknown partition '{}'", name);
                e
            })?;
            region.offset = part.offset;
            region.size = Some(part.size);
        }
        if let Some(offset) = args.offset {
            region.offset = offset;
        }
        if let Some(size) = args.size {
            region.size = Some(size);
        }
        region.size = region.size.filter(|&s| s != 0);

        Ok(region)
    }

    /// Size, or everything from the offset to the end of the flash
    pub fn size_or_rest(&self, total_size: u32) -> Result<u32, ToolError> {
        match self.size {
            Some(size) => Ok(size),
            None => total_size
                .checked_sub(self.offset)
                .ok_or(ToolError::InvalidRegion),
        }
    }
}

/// Round `value` up to the transfer alignment
pub fn align_up(value: u32) -> Result<u32, ToolError> {
    value
        .checked_next_multiple_of(ALIGNMENT)
        .ok_or(ToolError::InvalidRegion)
}

/// Round offset and size up to the transfer alignment, warning on change
pub fn align_region(offset: u32, size: u32) -> Result<(u32, u32), ToolError> {
    let aligned = (align_up(offset)?, align_up(size)?);
    if aligned.0 != offset {
        log::warn!("Offset 0x{:x} rounded up to 0x{:x}", offset, aligned.0);
    }
    if aligned.1 != size {
        log::warn!("Size 0x{:x} rounded up to 0x{:x}", size, aligned.1);
    }
    Ok(aligned)
}

/// Ask "Continue? [y/N]" and read the answer
///
/// Anything other than an answer starting with `y` or `Y` (including end of
/// input) declines.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<bool, ToolError> {
    write!(output, "Continue? [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim_start().chars().next(), Some('y' | 'Y')))
}

/// [`confirm`] on the terminal, skipped when `yes` is set
pub fn confirm_on_terminal(yes: bool) -> Result<bool, ToolError> {
    if yes {
        return Ok(true);
    }
    let stdin = std::io::stdin();
    confirm(&mut stdin.lock(), &mut std::io::stdout())
}
