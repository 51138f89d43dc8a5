//! Storage types.
//!
//! The bootloader talks to flash through [`Flash`], a deliberately thin
//! driver interface that works on absolute addresses and performs no bounds
//! checking of its own.  Confining writes to a particular partition is the
//! job of the caller, using [`Region`].

#![cfg_attr(not(any(feature = "std", test)), no_std)]

use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    NotAligned,
    OutOfBounds,
    /// The device itself reported a failure.
    Device,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Raw access to a flash device, addressed the way the CPU sees it.
///
/// Implementations only need to talk to the hardware.  There is no trusted
/// caller: anything that can reach a `Flash` can overwrite the bootloader, so
/// all range checks are done above this layer.
pub trait Flash {
    fn read(&mut self, addr: usize, bytes: &mut [u8]) -> Result<()>;
    fn raw_write(&mut self, addr: usize, bytes: &[u8]) -> Result<()>;
    fn raw_erase(&mut self, addr: usize, len: usize) -> Result<()>;
}

impl<F: Flash + ?Sized> Flash for &mut F {
    fn read(&mut self, addr: usize, bytes: &mut [u8]) -> Result<()> {
        (**self).read(addr, bytes)
    }

    fn raw_write(&mut self, addr: usize, bytes: &[u8]) -> Result<()> {
        (**self).raw_write(addr, bytes)
    }

    fn raw_erase(&mut self, addr: usize, len: usize) -> Result<()> {
        (**self).raw_erase(addr, len)
    }
}

/// A contiguous range of addresses, `[base, base + len)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    pub base: usize,
    pub len: usize,
}

impl Region {
    pub const fn new(base: usize, len: usize) -> Region {
        Region { base, len }
    }

    /// Does `[addr, addr + length)` lie entirely within this region.  Written
    /// so that no intermediate value can overflow.
    pub fn contains(&self, addr: usize, length: usize) -> bool {
        match addr.checked_sub(self.base) {
            Some(offset) => offset <= self.len && length <= self.len - offset,
            None => false,
        }
    }
}

/// Validate an access against a region, and an alignment.
pub fn check_slice(region: &Region, align: usize, addr: usize, length: usize) -> Result<()> {
    if !region.contains(addr, length) {
        return Err(Error::OutOfBounds);
    }
    if addr % align != 0 || length % align != 0 {
        return Err(Error::NotAligned);
    }
    Ok(())
}

/// Largest write unit [`NorDriver`] can merge partial writes into.
pub const MAX_WRITE_SIZE: usize = 512;

/// Present an `embedded-storage` NOR flash, mapped at `origin`, as a raw
/// [`Flash`].  Most HAL crates provide their flash this way.
///
/// Writes need not be aligned to the device's `WRITE_SIZE`.  A write unit
/// that is only partly covered is read back, and written in full with the
/// new bytes merged in, so the rest of the unit is programmed with what it
/// already holds.  On NOR flash that leaves those bytes unchanged.
pub struct NorDriver<F> {
    inner: F,
    origin: usize,
}

impl<F> NorDriver<F> {
    pub fn new(inner: F, origin: usize) -> NorDriver<F> {
        NorDriver { inner, origin }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut F {
        &mut self.inner
    }

    pub fn into_inner(self) -> F {
        self.inner
    }

    /// Translate a CPU address into a device offset.
    fn offset(&self, addr: usize) -> Result<u32> {
        let offset = addr.checked_sub(self.origin).ok_or(Error::OutOfBounds)?;
        u32::try_from(offset).map_err(|_| Error::OutOfBounds)
    }
}

fn device_offset(offset: usize) -> Result<u32> {
    u32::try_from(offset).map_err(|_| Error::OutOfBounds)
}

fn from_nor<E: NorFlashError>(e: E) -> Error {
    match e.kind() {
        NorFlashErrorKind::NotAligned => Error::NotAligned,
        NorFlashErrorKind::OutOfBounds => Error::OutOfBounds,
        _ => Error::Device,
    }
}

impl<F: NorFlash> NorDriver<F> {
    /// Program `part` at `at` within the write unit starting at `unit`.
    fn merge(&mut self, unit: usize, at: usize, part: &[u8]) -> Result<()> {
        let mut buffer = [0u8; MAX_WRITE_SIZE];
        let buf = buffer.get_mut(..F::WRITE_SIZE).ok_or(Error::NotAligned)?;
        let offset = device_offset(unit)?;
        self.inner.read(offset, buf).map_err(from_nor)?;
        buf[at..at + part.len()].copy_from_slice(part);
        self.inner.write(offset, buf).map_err(from_nor)
    }
}

impl<F: NorFlash> Flash for NorDriver<F> {
    fn read(&mut self, addr: usize, bytes: &mut [u8]) -> Result<()> {
        let offset = self.offset(addr)?;
        self.inner.read(offset, bytes).map_err(from_nor)
    }

    fn raw_write(&mut self, addr: usize, bytes: &[u8]) -> Result<()> {
        let align = F::WRITE_SIZE;
        let start = self.offset(addr)? as usize;
        let device = Region::new(0, self.inner.capacity());
        match check_slice(&device, align, start, bytes.len()) {
            Ok(()) => return self.inner.write(start as u32, bytes).map_err(from_nor),
            Err(Error::NotAligned) => (),
            Err(e) => return Err(e),
        }

        let mut pos = start;
        let mut data = bytes;

        let head = pos % align;
        if head != 0 {
            let len = (align - head).min(data.len());
            self.merge(pos - head, head, &data[..len])?;
            pos += len;
            data = &data[len..];
        }

        let body = data.len() - data.len() % align;
        if body > 0 {
            self.inner
                .write(device_offset(pos)?, &data[..body])
                .map_err(from_nor)?;
            pos += body;
            data = &data[body..];
        }

        if !data.is_empty() {
            self.merge(pos, 0, data)?;
        }
        Ok(())
    }

    fn raw_erase(&mut self, addr: usize, len: usize) -> Result<()> {
        let from = self.offset(addr)?;
        let len = u32::try_from(len).map_err(|_| Error::OutOfBounds)?;
        let to = from.checked_add(len).ok_or(Error::OutOfBounds)?;
        self.inner.erase(from, to).map_err(from_nor)
    }
}
