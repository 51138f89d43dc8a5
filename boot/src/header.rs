//! Firmware header
//!
//! The application partition begins with a small fixed header, immediately
//! followed by the payload, which is also the application's entry point.

/// The header contains the following magic value ("RVBL") when the partition
/// holds an image.  Anything else, including the erased pattern, means the
/// partition is empty.
pub const BOOT_MAGIC: u32 = 0x5256_424c;

/// Size of the encoded header, in bytes.
pub const HEADER_SIZE: usize = 16;

/// Version stamped into images received over serial.  Purely informational.
pub const DEFAULT_VERSION: u32 = 1;

/// The header, as stored at the base of the application partition.  Fields
/// are encoded as little-endian `u32`, in this order.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareHeader {
    /// Must be [`BOOT_MAGIC`].
    pub magic: u32,
    /// Payload size in bytes, not counting this header.
    pub size: u32,
    /// CRC-32 of the `size` bytes following the header.
    pub checksum: u32,
    /// Firmware version.  Not used for any ordering decision.
    pub version: u32,
}

impl FirmwareHeader {
    pub fn new(size: u32, checksum: u32, version: u32) -> FirmwareHeader {
        FirmwareHeader {
            magic: BOOT_MAGIC,
            size,
            checksum,
            version,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        let fields = [self.magic, self.size, self.checksum, self.version];
        for (chunk, field) in raw.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        raw
    }

    pub fn from_bytes(raw: &[u8; HEADER_SIZE]) -> FirmwareHeader {
        let word = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        FirmwareHeader {
            magic: word(0),
            size: word(4),
            checksum: word(8),
            version: word(12),
        }
    }

    pub fn has_magic(&self) -> bool {
        self.magic == BOOT_MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let header = FirmwareHeader::new(4, 0x7c9c_a35a, 1);
        assert_eq!(
            header.to_bytes(),
            [
                0x4c, 0x42, 0x56, 0x52, // "LBVR"
                0x04, 0x00, 0x00, 0x00,
                0x5a, 0xa3, 0x9c, 0x7c,
                0x01, 0x00, 0x00, 0x00,
            ]
        );
        assert_eq!(FirmwareHeader::from_bytes(&header.to_bytes()), header);
    }

    #[test]
    fn erased_is_not_an_image() {
        let header = FirmwareHeader::from_bytes(&[0xff; HEADER_SIZE]);
        assert!(!header.has_magic());
        assert_eq!(header.size, u32::MAX);
    }
}
