//! Write command implementation
//!
//! A write is always erase, program and (unless disabled) read back and
//! compare, over the same aligned region.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use scpflash_core::control::ScpControl;
use scpflash_core::progress::ProgressSink;
use scpflash_core::Error as CoreError;
use scpflash_lib::ScpLib;

use super::progress::BarProgress;
use super::{align_region, confirm_on_terminal, Region};
use crate::error::ToolError;

/// Where and how much of the input file goes to flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePlan {
    /// Flash offset, before alignment
    pub offset: u32,
    /// Bytes taken from the file
    pub size: u32,
    /// Bytes skipped at the start of the file
    pub skip: u32,
}

impl WritePlan {
    /// Apply the size defaults and clamp everything to the input file
    ///
    /// Without an explicit size the whole file is written, limited to the
    /// flash size. The skip and size are then cut down to what the file can
    /// provide. An empty result or one that runs past the end of the flash
    /// is rejected.
    pub fn new(
        region: Region,
        skip: u32,
        file_size: u64,
        total_size: u32,
    ) -> Result<Self, ToolError> {
        let file_size = u32::try_from(file_size).unwrap_or(u32::MAX);

        let mut size = region.size.unwrap_or(file_size.min(total_size));
        size = size.min(file_size);
        let skip = skip.min(file_size);
        if skip as u64 + size as u64 > file_size as u64 {
            size = file_size - skip;
        }

        if size == 0 || region.offset as u64 + size as u64 > total_size as u64 {
            return Err(ToolError::InvalidRegion);
        }

        Ok(Self {
            offset: region.offset,
            size,
            skip,
        })
    }
}

/// Run the write command
pub fn run_write<D: ScpControl>(
    lib: &mut ScpLib<D>,
    input: &Path,
    region: Region,
    skip: u32,
    verify: bool,
    yes: bool,
    quiet: bool,
) -> Result<(), ToolError> {
    let file_size = std::fs::metadata(input)
        .map_err(|e| ToolError::file(input, e))?
        .len();
    let total = lib.flash_info()?.total_size;

    let plan = WritePlan::new(region, skip, file_size, total).map_err(|e| {
        log::error!("Invalid size, offset or skip value or its combination");
        e
    })?;
    let (offset, aligned) = align_region(plan.offset, plan.size)?;
    let image = load_image(input, plan.skip, plan.size, aligned)?;

    if !quiet {
        println!(
            "Writing 0x{:x} bytes to SPI Boot Flash at offset 0x{:x}",
            plan.size, offset
        );
    }
    if !confirm_on_terminal(yes)? {
        log::info!("Write cancelled");
        return Ok(());
    }

    write_image(lib, offset, &image, verify, &mut BarProgress::new(quiet))?;

    if !quiet {
        println!("OK: Success");
    }
    Ok(())
}

/// Read `size` bytes at `skip` from the file into a zero-padded buffer of
/// `aligned` bytes
pub fn load_image(path: &Path, skip: u32, size: u32, aligned: u32) -> Result<Vec<u8>, ToolError> {
    let mut file = File::open(path).map_err(|e| ToolError::file(path, e))?;
    if skip > 0 {
        file.seek(SeekFrom::Start(skip as u64))
            .map_err(|e| ToolError::file(path, e))?;
    }

    let mut image = vec![0u8; aligned as usize];
    file.read_exact(&mut image[..size as usize])
        .map_err(|e| ToolError::file(path, e))?;
    Ok(image)
}

/// Erase, program and optionally verify `image` at `offset`
pub fn write_image<D: ScpControl>(
    lib: &mut ScpLib<D>,
    offset: u32,
    image: &[u8],
    verify: bool,
    progress: &mut dyn ProgressSink,
) -> Result<(), ToolError> {
    lib.flash_erase(offset, image.len() as u32, progress)?;
    lib.flash_write(offset, image, progress)?;

    if verify {
        let mut readback = vec![0u8; image.len()];
        lib.flash_read(offset, &mut readback, progress)?;
        verify_image(offset, image, &readback)?;
        log::debug!("Verified 0x{:x} bytes at 0x{:x}", image.len(), offset);
    }
    Ok(())
}

/// Compare read-back data, reporting the first differing byte
fn verify_image(offset: u32, expected: &[u8], actual: &[u8]) -> Result<(), CoreError> {
    if let Some(i) = expected.iter().zip(actual).position(|(e, a)| e != a) {
        let at = offset + i as u32;
        log::error!(
            "Verification failed at offset 0x{:08X}: expected 0x{:02X}, got 0x{:02X}",
            at,
            expected[i],
            actual[i]
        );
        return Err(CoreError::VerificationFailed { offset: at });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(offset: u32, size: Option<u32>) -> Region {
        Region { offset, size }
    }

    #[test]
    fn test_plan_defaults_to_file_size() {
        let plan = WritePlan::new(region(0x140000, None), 0, 0x1234, 0x780000).unwrap();
        assert_eq!(
            plan,
            WritePlan {
                offset: 0x140000,
                size: 0x1234,
                skip: 0
            }
        );

        // Larger than the flash: limited to the flash, then rejected if the
        // offset pushes it past the end
        let plan = WritePlan::new(region(0, None), 0, 0x2000, 0x1000).unwrap();
        assert_eq!(plan.size, 0x1000);
        assert!(WritePlan::new(region(0x20, None), 0, 0x2000, 0x1000).is_err());
    }

    #[test]
    fn test_plan_clamps_to_file() {
        // Partition larger than the file
        let plan = WritePlan::new(region(0x40000, Some(0x40000)), 0, 0x800, 0x780000).unwrap();
        assert_eq!(plan.size, 0x800);

        // Skip eats into the size
        let plan = WritePlan::new(region(0, Some(0x800)), 0x100, 0x800, 0x780000).unwrap();
        assert_eq!((plan.skip, plan.size), (0x100, 0x700));

        // Skip past the end leaves nothing
        assert!(matches!(
            WritePlan::new(region(0, None), 0x900, 0x800, 0x780000),
            Err(ToolError::InvalidRegion)
        ));
        assert!(WritePlan::new(region(0, None), 0, 0, 0x780000).is_err());
    }

    #[test]
    fn test_verify_reports_first_mismatch() {
        let expected = [1u8, 2, 3, 4];
        assert!(verify_image(0x100, &expected, &expected).is_ok());
        assert_eq!(
            verify_image(0x100, &expected, &[1, 2, 9, 9]),
            Err(CoreError::VerificationFailed { offset: 0x102 })
        );
    }

    #[test]
    fn test_load_image_pads_and_skips() {
        let path = std::env::temp_dir().join(format!("scpflash-load-{}.bin", std::process::id()));
        let content: Vec<u8> = (1..=100u8).collect();
        std::fs::write(&path, &content).unwrap();

        let image = load_image(&path, 10, 50, 64).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(image.len(), 64);
        assert_eq!(image[..50], content[10..60]);
        assert!(image[50..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_load_image_missing_file() {
        let path = Path::new("/nonexistent/scpflash/image.bin");
        match load_image(path, 0, 32, 32) {
            Err(ToolError::File { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
    }

    #[cfg(feature = "emulator")]
    mod workflow {
        use super::*;
        use crate::commands::testing;
        use scpflash_core::control::DriverInfo;
        use scpflash_core::progress::{NoProgress, ProgressState, TransferOp};
        use scpflash_core::FlashGeometry;

        /// Corrupts one byte of every read that covers it
        struct Corrupting<D> {
            inner: D,
            at: u32,
        }

        impl<D: ScpControl> ScpControl for Corrupting<D> {
            fn driver_info(&mut self) -> scpflash_core::Result<DriverInfo> {
                self.inner.driver_info()
            }

            fn flash_info(&mut self) -> scpflash_core::Result<FlashGeometry> {
                self.inner.flash_info()
            }

            fn flash_read(&mut self, offset: u32, size: u32) -> scpflash_core::Result<Vec<u8>> {
                let mut data = self.inner.flash_read(offset, size)?;
                if (offset..offset + size).contains(&self.at) {
                    data[(self.at - offset) as usize] ^= 0xFF;
                }
                Ok(data)
            }

            fn flash_write(&mut self, offset: u32, size: u32, data: &[u8]) -> scpflash_core::Result<()> {
                self.inner.flash_write(offset, size, data)
            }

            fn flash_erase(&mut self, offset: u32, size: u32) -> scpflash_core::Result<()> {
                self.inner.flash_erase(offset, size)
            }
        }

        #[test]
        fn test_write_image_runs_erase_write_verify() {
            let device = testing::device();
            let mut lib = testing::lib(&device);
            let image: Vec<u8> = (0..0x1000u32).map(|i| (i % 251) as u8 + 1).collect();

            let mut ops = Vec::new();
            let mut sink = |state: &ProgressState| {
                if ops.last() != Some(&state.operation) {
                    ops.push(state.operation);
                }
            };
            write_image(&mut lib, 0x2000, &image, true, &mut sink).unwrap();
            assert_eq!(ops, [TransferOp::Erase, TransferOp::Write, TransferOp::Read]);

            let mut back = vec![0u8; image.len()];
            lib.flash_read(0x2000, &mut back, &mut NoProgress).unwrap();
            assert_eq!(back, image);
        }

        #[test]
        fn test_write_image_without_verify_skips_read_back() {
            let device = testing::device();
            let mut lib = testing::lib(&device);

            let mut reads = 0;
            let mut sink = |state: &ProgressState| {
                if state.operation == TransferOp::Read {
                    reads += 1;
                }
            };
            write_image(&mut lib, 0, &[0x5A; 64], false, &mut sink).unwrap();
            assert_eq!(reads, 0);
        }

        #[test]
        fn test_verify_failure_is_reported() {
            let device = testing::device();
            let mut lib = ScpLib::new(Corrupting {
                inner: device.acquire().unwrap(),
                at: 0x1234,
            });

            let err =
                write_image(&mut lib, 0x1000, &[0x11; 0x800], true, &mut NoProgress).unwrap_err();
            assert!(matches!(
                err,
                ToolError::Flash(CoreError::VerificationFailed { offset: 0x1234 })
            ));
            assert_eq!(err.exit_code(), 84);
        }
    }
}
