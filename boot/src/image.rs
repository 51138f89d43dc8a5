//! Boot image support

use storage::Flash;

use crate::header::FirmwareHeader;
use crate::partition::AppPartition;
use crate::Result;

/// Why the partition does not hold a bootable image.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationError {
    BadMagic,
    BadSize,
    ChecksumMismatch,
}

impl ValidationError {
    /// The line printed on the console when booting is refused.
    pub fn message(&self) -> &'static str {
        match self {
            ValidationError::BadMagic => "Error: Invalid magic number",
            ValidationError::BadSize => "Error: Invalid firmware size",
            ValidationError::ChecksumMismatch => "Error: CRC mismatch",
        }
    }
}

/// A validated image residing in the application partition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Image {
    pub header: FirmwareHeader,
    /// Address execution begins at, immediately after the header.
    pub entry: usize,
}

/// Check whether the partition holds a bootable image.
///
/// The checks run in order: magic, size, then checksum, and the first one to
/// fail is reported.  Nothing is cached; every call reads flash again.
pub fn validate<F: Flash>(partition: &mut AppPartition<F>) -> Result<Image> {
    let header = partition.read_header()?;

    if !header.has_magic() {
        return Err(ValidationError::BadMagic.into());
    }

    let size = header.size as usize;
    if size == 0 || size > partition.max_payload() {
        return Err(ValidationError::BadSize.into());
    }

    let crc = partition.payload_checksum(size)?;
    if crc != header.checksum {
        warn!("checksum {:#x}, header says {:#x}", crc, header.checksum);
        return Err(ValidationError::ChecksumMismatch.into());
    }

    Ok(Image {
        header,
        entry: partition.entry(),
    })
}
