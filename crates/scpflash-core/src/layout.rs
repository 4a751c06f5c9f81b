//! Named regions of the boot flash
//!
//! Offsets are relative to the flash service address space, which starts
//! after the reserved SCP firmware region.

use crate::error::{Error, Result};

/// A named flash region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Name used on the command line
    pub name: &'static str,
    /// Start offset
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
    /// Human readable description
    pub description: &'static str,
}

impl Partition {
    /// Offset one past the last byte
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// Partition table of the boot flash
pub const PARTITIONS: &[Partition] = &[
    Partition {
        name: "bl1",
        offset: 0x00_0000,
        size: 0x04_0000,
        description: "Trusted firmware BL1 boot loader",
    },
    Partition {
        name: "dtb",
        offset: 0x04_0000,
        size: 0x04_0000,
        description: "Device tree blob",
    },
    Partition {
        name: "var",
        offset: 0x08_0000,
        size: 0x0c_0000,
        description: "UEFI variable store",
    },
    Partition {
        name: "fip",
        offset: 0x14_0000,
        size: 0x64_0000,
        description: "Firmware image package (BL2, BL31, BL33)",
    },
];

/// Look up a partition by name (case sensitive)
pub fn find_partition(name: &str) -> Result<&'static Partition> {
    PARTITIONS
        .iter()
        .find(|p| p.name == name)
        .ok_or(Error::UnknownPartition)
}
