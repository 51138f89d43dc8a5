//! Flash styles
//!
//! Memory maps of bootloader targets.  Each has the bootloader at the start
//! of flash followed by the application partition.

use boot::Config;
use storage::{NorDriver, Region};

use crate::{Result, SimFlash, SECTOR_SIZE};

/// One target's flash, and where the application lives in it.
pub struct TargetLayout {
    pub name: &'static str,
    /// Address flash is mapped at.
    pub origin: usize,
    /// Total flash, bootloader included.
    pub size: usize,
    pub app: Region,
}

impl TargetLayout {
    /// A blank simulated flash for this target, addressed as the CPU sees
    /// it.
    pub fn build(&self) -> Result<NorDriver<SimFlash>> {
        self.build_sized()
    }

    /// As [`build`](Self::build), with a device that writes in units of
    /// `WRITE_SIZE` bytes.
    pub fn build_sized<const WRITE_SIZE: usize>(
        &self,
    ) -> Result<NorDriver<SimFlash<WRITE_SIZE>>> {
        Ok(NorDriver::new(SimFlash::new(self.size)?, self.origin))
    }

    /// Bootloader configuration for this target.  Output is left with bare
    /// `\n` so transcripts are easy to compare.
    pub fn config(&self) -> Config {
        Config::new(self.app).platform_name(self.name).crlf(false)
    }
}

/// QEMU RISC-V `virt`.  64 KiB of bootloader, then 448 KiB of application.
pub static QEMU_VIRT: TargetLayout = TargetLayout {
    name: "QEMU Virt (RV32IM)",
    origin: 0x8000_0000,
    size: 512 * 1024,
    app: Region::new(0x8001_0000, 448 * 1024),
};

/// A small part, keeping tests fast.  There is a sector of other data after
/// the application partition, so stray writes past the end are visible.
pub static SMALL: TargetLayout = TargetLayout {
    name: "small",
    origin: 0x0800_0000,
    size: 16 * 1024,
    app: Region::new(0x0800_1000, 8 * 1024),
};

pub static ALL_TARGETS: [&TargetLayout; 2] = [&QEMU_VIRT, &SMALL];
