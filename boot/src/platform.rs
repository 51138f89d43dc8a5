//! Leaving the bootloader.
//!
//! Both ways out are irreversible, and are left to the board.

/// The two operations that end the bootloader's life.
pub trait Platform {
    /// Transfer control to `entry`.  The application is trusted to set up
    /// its own stack and environment.
    fn jump(&mut self, entry: usize) -> !;

    /// Reset the system.
    fn reset(&mut self) -> !;
}

/// The QEMU RISC-V `virt` machine.  Images are linked to run in place, so
/// handing off is a plain call of the entry address.
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
pub struct QemuVirt;

#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
impl QemuVirt {
    /// The SiFive test device, which resets the machine when written.
    const TEST_DEVICE: usize = 0x10_0000;
    const RESET: u32 = 0x7777;
}

#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
impl Platform for QemuVirt {
    fn jump(&mut self, entry: usize) -> ! {
        // Safety: `entry` comes from a validated image, which is linked to
        // start at the first byte after the header.
        let app: extern "C" fn() -> ! = unsafe { core::mem::transmute(entry) };
        app()
    }

    fn reset(&mut self) -> ! {
        // Safety: a fixed MMIO register of the virt machine.
        unsafe {
            core::ptr::write_volatile(Self::TEST_DEVICE as *mut u32, Self::RESET);
        }
        loop {
            core::hint::spin_loop();
        }
    }
}
