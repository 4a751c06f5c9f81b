//! Packed component versions

use core::fmt;

/// Version packed as `major << 24 | minor << 16 | patch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u32);

impl Version {
    /// Pack a version
    pub const fn new(major: u8, minor: u8, patch: u16) -> Self {
        Self((major as u32) << 24 | (minor as u32) << 16 | patch as u32)
    }

    /// Major component
    pub const fn major(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Minor component
    pub const fn minor(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Patch component
    pub const fn patch(self) -> u16 {
        self.0 as u16
    }

    /// Packed representation
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_packing() {
        let v = Version::new(1, 2, 3);
        assert_eq!(v.raw(), 0x0102_0003);
        assert_eq!((v.major(), v.minor(), v.patch()), (1, 2, 3));
        assert_eq!(v.to_string(), "1.2.3");
        assert!(Version::new(1, 3, 0) > Version::new(1, 2, 0xFFFF));
    }
}
