//! Simulated flash
//!
//! A host-side stand-in for the flash and serial port of a bootloader
//! target, so the update logic can be exercised without hardware.
//!
//! The flash is NOR-like, and is presented through the `embedded-storage`
//! NOR traits, the same way HAL crates present real devices.  Erasing sets
//! whole sectors to 0xff, and writing can only clear bits.  A write that
//! would need to set a bit is reported as an error rather than silently
//! ANDed in, which catches missing erases in tests.
//!
//! The write unit is a const parameter, since devices differ widely: from
//! single bytes, through the 8 bytes of many internal flashes, to 512 byte
//! pages.  Writes must be aligned to it.
//!
//! Failures can be injected to model a bad part or power loss part way
//! through an update:
//!
//! - `fail_erase`: every erase fails.
//! - `fail_write_at`: any write touching the given offset fails.
//! - `fail_read_at`: any read touching the given offset fails.
//! - `power_loss_after`: after the given number of successful writes,
//!   nothing more reaches the device.

use anyhow::anyhow;
pub use anyhow::Result;
use embedded_storage::nor_flash::{
    self, ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

pub mod gen;
pub mod serial;
pub mod styles;

pub use serial::SimSerial;

/// The richer error type used in the simulator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SimError {
    Inner(NorFlashErrorKind),
    /// Write that needs bits set which only an erase can set.
    NotErased { offset: usize },
    /// A failure requested by the test.
    Injected,
}

impl From<NorFlashErrorKind> for SimError {
    fn from(inner: NorFlashErrorKind) -> Self {
        SimError::Inner(inner)
    }
}

impl NorFlashError for SimError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            SimError::Inner(inner) => *inner,
            SimError::NotErased { .. } | SimError::Injected => NorFlashErrorKind::Other,
        }
    }
}

type SimResult<T> = core::result::Result<T, SimError>;

/// Size of the simulated erase sectors.
pub const SECTOR_SIZE: usize = 4096;

pub struct SimFlash<const WRITE_SIZE: usize = 1> {
    data: Vec<u8>,
    fail_erase: bool,
    fail_write_at: Option<usize>,
    fail_read_at: Option<usize>,
    power_loss_after: Option<usize>,
    writes: usize,
    erases: usize,
}

impl<const WRITE_SIZE: usize> SimFlash<WRITE_SIZE> {
    /// A fully erased device of the given size, which must be a whole
    /// number of sectors.
    pub fn new(capacity: usize) -> Result<Self> {
        if WRITE_SIZE == 0 || SECTOR_SIZE % WRITE_SIZE != 0 {
            return Err(anyhow!("write size {} does not divide the sector size", WRITE_SIZE));
        }
        if capacity == 0 || capacity % SECTOR_SIZE != 0 {
            return Err(anyhow!(
                "capacity {:#x} is not a multiple of the sector size",
                capacity
            ));
        }
        if u32::try_from(capacity).is_err() {
            return Err(anyhow!("capacity {:#x} too large", capacity));
        }
        Ok(SimFlash {
            data: vec![0xff; capacity],
            fail_erase: false,
            fail_write_at: None,
            fail_read_at: None,
            power_loss_after: None,
            writes: 0,
            erases: 0,
        })
    }

    pub fn fail_erase(&mut self, fail: bool) {
        self.fail_erase = fail;
    }

    pub fn fail_write_at(&mut self, offset: Option<usize>) {
        self.fail_write_at = offset;
    }

    pub fn fail_read_at(&mut self, offset: Option<usize>) {
        self.fail_read_at = offset;
    }

    /// Allow `writes` more writes to succeed, then fail everything.
    pub fn power_loss_after(&mut self, writes: usize) {
        self.power_loss_after = Some(self.writes + writes);
    }

    /// Remove all injected failures.
    pub fn heal(&mut self) {
        self.fail_erase = false;
        self.fail_write_at = None;
        self.fail_read_at = None;
        self.power_loss_after = None;
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Successful erases so far.
    pub fn erases(&self) -> usize {
        self.erases
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Flip a single bit in place, bypassing NOR rules, as a disturbed cell
    /// would.
    pub fn flip_bit(&mut self, offset: usize, bit: u8) {
        self.data[offset] ^= 1 << (bit % 8);
    }

    fn powered(&self) -> bool {
        match self.power_loss_after {
            Some(limit) => self.writes < limit,
            None => true,
        }
    }
}

impl<const WRITE_SIZE: usize> ErrorType for SimFlash<WRITE_SIZE> {
    type Error = SimError;
}

impl<const WRITE_SIZE: usize> ReadNorFlash for SimFlash<WRITE_SIZE> {
    const READ_SIZE: usize = 1;

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> SimResult<()> {
        nor_flash::check_read(self, offset, bytes.len())?;
        let range = offset as usize..offset as usize + bytes.len();
        if let Some(bad) = self.fail_read_at {
            if range.contains(&bad) {
                return Err(SimError::Injected);
            }
        }
        bytes.copy_from_slice(&self.data[range]);
        Ok(())
    }
}

impl<const WRITE_SIZE: usize> NorFlash for SimFlash<WRITE_SIZE> {
    const WRITE_SIZE: usize = WRITE_SIZE;
    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> SimResult<()> {
        nor_flash::check_erase(self, from, to)?;
        if self.fail_erase || !self.powered() {
            return Err(SimError::Injected);
        }
        self.data[from as usize..to as usize].fill(0xff);
        self.erases += 1;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> SimResult<()> {
        nor_flash::check_write(self, offset, bytes.len())?;
        let range = offset as usize..offset as usize + bytes.len();
        if !self.powered() {
            return Err(SimError::Injected);
        }
        if let Some(bad) = self.fail_write_at {
            if range.contains(&bad) {
                return Err(SimError::Injected);
            }
        }
        let cells = &mut self.data[range.clone()];
        if let Some(pos) = cells.iter().zip(bytes).position(|(&old, &new)| old & new != new) {
            return Err(SimError::NotErased { offset: range.start + pos });
        }
        cells.copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}
