//! Erase command implementation

use scpflash_core::control::ScpControl;
use scpflash_core::progress::ProgressSink;
use scpflash_lib::ScpLib;

use super::progress::BarProgress;
use super::{align_region, confirm_on_terminal, Region};
use crate::error::ToolError;

/// Run the erase command
pub fn run_erase<D: ScpControl>(
    lib: &mut ScpLib<D>,
    region: Region,
    yes: bool,
    quiet: bool,
) -> Result<(), ToolError> {
    let total = lib.flash_info()?.total_size;
    let size = region.size_or_rest(total)?;

    if !quiet {
        println!(
            "Erasing 0x{:x} bytes of SPI Boot Flash at offset 0x{:x}",
            size, region.offset
        );
    }
    if !confirm_on_terminal(yes)? {
        log::info!("Erase cancelled");
        return Ok(());
    }

    erase_region(lib, region.offset, size, &mut BarProgress::new(quiet))?;

    if !quiet {
        println!("OK: Success");
    }
    Ok(())
}

/// Erase the aligned region
pub fn erase_region<D: ScpControl>(
    lib: &mut ScpLib<D>,
    offset: u32,
    size: u32,
    progress: &mut dyn ProgressSink,
) -> Result<(), ToolError> {
    let (offset, size) = align_region(offset, size)?;
    lib.flash_erase(offset, size, progress)?;
    Ok(())
}
