//! The application partition.
//!
//! All flash modification made by the bootloader goes through
//! [`AppPartition`], which holds the only copy of the partition bounds.  The
//! bounds check on [`AppPartition::write`] is what keeps update traffic out
//! of the bootloader's own code and data, and it is applied to every call.
//!
//! An image is installed in two phases.  The payload is written first, into
//! an erased partition, and the header is written last by
//! [`AppPartition::commit`].  Until the header lands the partition holds no
//! magic number, so power loss at any earlier point leaves an image that
//! simply fails validation.

use storage::{Flash, Region};

use crate::checksum::Checksum;
use crate::header::{FirmwareHeader, HEADER_SIZE};
use crate::Result;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    EraseFailed,
    WriteOutOfBounds,
    WriteFailed,
    HeaderCommitFailed,
}

pub struct AppPartition<F> {
    flash: F,
    region: Region,
}

impl<F> AppPartition<F> {
    pub fn new(flash: F, region: Region) -> AppPartition<F> {
        AppPartition { flash, region }
    }

    /// Address of the first payload byte.  This is also where execution
    /// starts after handoff.
    pub fn entry(&self) -> usize {
        self.region.base + HEADER_SIZE
    }

    pub fn max_payload(&self) -> usize {
        self.region.len.saturating_sub(HEADER_SIZE)
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: Flash> AppPartition<F> {
    /// Erase the whole partition.  Not retried here: a caller that wants to
    /// try again can, erasing is idempotent.
    pub fn erase(&mut self) -> core::result::Result<(), StorageError> {
        self.flash
            .raw_erase(self.region.base, self.region.len)
            .map_err(|e| {
                error!("erase of {:#x}+{:#x} failed: {:?}", self.region.base, self.region.len, e);
                StorageError::EraseFailed
            })
    }

    /// Write `data` at the absolute address `addr`, which must lie, with all
    /// of `data`, inside the partition.
    pub fn write(&mut self, addr: usize, data: &[u8]) -> core::result::Result<(), StorageError> {
        if !self.region.contains(addr, data.len()) {
            error!("refusing write of {} bytes at {:#x}", data.len(), addr);
            return Err(StorageError::WriteOutOfBounds);
        }
        self.flash.raw_write(addr, data).map_err(|e| {
            error!("write at {:#x} failed: {:?}", addr, e);
            StorageError::WriteFailed
        })
    }

    /// Write the header, making the image visible.  This must be the last
    /// write of an update.
    pub fn commit(&mut self, header: &FirmwareHeader) -> core::result::Result<(), StorageError> {
        if self.region.len < HEADER_SIZE {
            return Err(StorageError::HeaderCommitFailed);
        }
        self.flash
            .raw_write(self.region.base, &header.to_bytes())
            .map_err(|e| {
                error!("header commit failed: {:?}", e);
                StorageError::HeaderCommitFailed
            })
    }

    /// Read from within the partition.
    pub fn read(&mut self, addr: usize, buf: &mut [u8]) -> Result<()> {
        if !self.region.contains(addr, buf.len()) {
            return Err(storage::Error::OutOfBounds.into());
        }
        self.flash.read(addr, buf)?;
        Ok(())
    }

    pub fn read_header(&mut self) -> Result<FirmwareHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        self.read(self.region.base, &mut raw)?;
        Ok(FirmwareHeader::from_bytes(&raw))
    }

    /// Compute the checksum of the first `size` payload bytes, as they are
    /// stored in flash.
    pub fn payload_checksum(&mut self, size: usize) -> Result<u32> {
        let mut sum = Checksum::new();
        let mut buffer = [0u8; 128];
        let mut pos = 0;
        while pos < size {
            let todo = (size - pos).min(buffer.len());
            let buf = &mut buffer[..todo];
            self.read(self.entry() + pos, buf)?;
            sum.update(buf);
            pos += todo;
        }
        Ok(sum.finalize())
    }
}
