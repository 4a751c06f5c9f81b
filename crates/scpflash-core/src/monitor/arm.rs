//! Real secure monitor calls on AArch64

use super::{SecureMonitor, SmcArgs, SmcFunction, SmcResult};

/// Issues `smc #0` following the SMC Calling Convention
///
/// x0 carries the function identifier, x1..x7 the arguments, and x0..x3
/// the result. Registers x4..x17 may be clobbered by the firmware.
pub struct ArmSmc {
    _private: (),
}

impl ArmSmc {
    /// Create the adapter
    ///
    /// # Safety
    /// The caller must be executing at an exception level that is allowed to
    /// issue SMC (EL1 or above) on a platform whose trusted firmware
    /// implements the flash service. From EL0 the instruction is undefined.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl SecureMonitor for ArmSmc {
    fn call(&mut self, function: SmcFunction, args: SmcArgs) -> SmcResult {
        let a0: u64;
        let a1: u64;
        let a2: u64;
        let a3: u64;

        // SAFETY: constructing `ArmSmc` requires a context where SMC is
        // permitted; the register usage follows SMCCC.
        unsafe {
            core::arch::asm!(
                "smc #0",
                inlateout("x0") function.id() as u64 => a0,
                inlateout("x1") args[0] => a1,
                inlateout("x2") args[1] => a2,
                inlateout("x3") args[2] => a3,
                inlateout("x4") args[3] => _,
                inlateout("x5") args[4] => _,
                inlateout("x6") args[5] => _,
                inlateout("x7") args[6] => _,
                out("x8") _, out("x9") _, out("x10") _, out("x11") _,
                out("x12") _, out("x13") _, out("x14") _, out("x15") _,
                out("x16") _, out("x17") _,
                options(nostack)
            );
        }

        SmcResult { a0, a1, a2, a3 }
    }
}
