//! Version command implementation

use scpflash_core::control::ScpControl;
use scpflash_lib::{ScpLib, VersionInfo};

use crate::error::ToolError;

/// Run the version command
pub fn run_version<D: ScpControl>(lib: &mut ScpLib<D>) -> Result<(), ToolError> {
    let info = lib.version()?;
    print!("{}", render(env!("CARGO_PKG_VERSION"), &info));
    Ok(())
}

fn render(tool_version: &str, info: &VersionInfo) -> String {
    format!(
        "scpflash version {}\nscpflash-lib version {}\nscpflash-driver version {}\n",
        tool_version, info.lib_version, info.driver_version
    )
}

#[cfg(all(test, feature = "emulator"))]
mod tests {
    use super::*;
    use crate::commands::testing;

    #[test]
    fn test_versions_reported() {
        let device = testing::device();
        let mut lib = testing::lib(&device);
        let info = lib.version().unwrap();

        assert_eq!(
            render(env!("CARGO_PKG_VERSION"), &info),
            "scpflash version 0.1.0\nscpflash-lib version 0.1.0\nscpflash-driver version 0.1.0\n"
        );
    }
}
