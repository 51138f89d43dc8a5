//! Per-target configuration.
//!
//! None of this is negotiated over the wire.  The partition layout in
//! particular has to agree with whatever builds the application images.

use storage::Region;

use crate::header::{DEFAULT_VERSION, HEADER_SIZE};

/// Application partition of the QEMU RISC-V `virt` machine: the bootloader
/// owns the first 64 KiB of RAM-backed flash, the application the next
/// 448 KiB.
pub const QEMU_VIRT_PARTITION: Region = Region::new(0x8001_0000, 448 * 1024);

/// What to do once an update has been committed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AfterUpdate {
    /// Jump straight into the new image.
    Handoff,
    /// Reset, and let the next boot validate the image.
    Reset,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Where the header and payload live.
    pub partition: Region,
    /// Version written into headers of received images.
    pub version: u32,
    pub after_update: AfterUpdate,
    /// Shown in the banner.
    pub platform_name: &'static str,
    /// Send `\r\n` for every `\n`, for the benefit of terminals.
    pub crlf: bool,
}

impl Config {
    pub const fn new(partition: Region) -> Config {
        Config {
            partition,
            version: DEFAULT_VERSION,
            after_update: AfterUpdate::Reset,
            platform_name: "generic",
            crlf: true,
        }
    }

    pub const fn version(mut self, version: u32) -> Config {
        self.version = version;
        self
    }

    pub const fn after_update(mut self, after_update: AfterUpdate) -> Config {
        self.after_update = after_update;
        self
    }

    pub const fn platform_name(mut self, name: &'static str) -> Config {
        self.platform_name = name;
        self
    }

    pub const fn crlf(mut self, crlf: bool) -> Config {
        self.crlf = crlf;
        self
    }

    /// Largest payload that fits behind the header.  Zero for a partition
    /// too small to hold a header at all.
    pub const fn max_payload(&self) -> usize {
        self.partition.len.saturating_sub(HEADER_SIZE)
    }
}

impl Default for Config {
    /// The QEMU demo target, which jumps straight into a new image so its
    /// output shows up on the same console.
    fn default() -> Self {
        Config::new(QEMU_VIRT_PARTITION)
            .after_update(AfterUpdate::Handoff)
            .platform_name("QEMU Virt (RV32IM)")
    }
}
