//! Read command implementation

use std::fs::File;
use std::io::Write;
use std::path::Path;

use scpflash_core::control::ScpControl;
use scpflash_core::progress::ProgressSink;
use scpflash_lib::ScpLib;

use super::progress::BarProgress;
use super::{align_region, Region};
use crate::error::ToolError;

/// Run the read command
pub fn run_read<D: ScpControl>(
    lib: &mut ScpLib<D>,
    output: &Path,
    region: Region,
    quiet: bool,
) -> Result<(), ToolError> {
    let mut file = File::create(output).map_err(|e| ToolError::file(output, e))?;

    let data = read_region(lib, region, &mut BarProgress::new(quiet))?;
    file.write_all(&data).map_err(|e| ToolError::file(output, e))?;

    if !quiet {
        println!("Read {} bytes to {}", data.len(), output.display());
        println!("OK: Success");
    }
    Ok(())
}

/// Read the aligned region into memory
pub fn read_region<D: ScpControl>(
    lib: &mut ScpLib<D>,
    region: Region,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<u8>, ToolError> {
    let total = lib.flash_info()?.total_size;
    let size = region.size_or_rest(total)?;
    let (offset, size) = align_region(region.offset, size)?;

    let mut data = vec![0u8; size as usize];
    lib.flash_read(offset, &mut data, progress)?;
    Ok(data)
}

#[cfg(all(test, feature = "emulator"))]
mod tests {
    use super::*;
    use crate::commands::testing;
    use scpflash_core::progress::NoProgress;
    use scpflash_core::ErrorKind;

    #[test]
    fn test_read_defaults_to_rest_of_flash() {
        let device = testing::device();
        let mut lib = testing::lib(&device);
        lib.flash_write(0x7_FFE0, &[0xA5; 32], &mut NoProgress).unwrap();

        let data = read_region(
            &mut lib,
            Region {
                offset: 0x7_0000,
                size: None,
            },
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(data.len(), 0x1_0000);
        assert_eq!(data[0xFFE0..], [0xA5; 32]);
        assert!(data[..0xFFE0].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_rounds_region_up() {
        let device = testing::device();
        let mut lib = testing::lib(&device);

        let data = read_region(
            &mut lib,
            Region {
                offset: 0x10,
                size: Some(0x41),
            },
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(data.len(), 0x60);
    }

    #[test]
    fn test_read_past_end_fails() {
        let device = testing::device();
        let mut lib = testing::lib(&device);

        let err = read_region(
            &mut lib,
            Region {
                offset: 0x7_FFE0,
                size: Some(0x40),
            },
            &mut NoProgress,
        )
        .unwrap_err();
        match err {
            ToolError::Lib(e) => assert_eq!(e.kind(), ErrorKind::InvalidArgument),
            other => panic!("unexpected error: {other}"),
        }
    }
}
