//! Image integrity check.
//!
//! Images are protected by a CRC-32 in its most common form (ISO-HDLC, the
//! one used by zlib, Ethernet and Python's `binascii.crc32`).  Host tools
//! compute the same value, so this is a storage format constant and must
//! not change.

use crc::{Crc, Digest, CRC_32_ISO_HDLC};

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Checksum of a complete buffer.
pub fn checksum(bytes: &[u8]) -> u32 {
    CRC32.checksum(bytes)
}

/// Incremental checksum, for data that is read from flash a piece at a
/// time.  Feeding the same bytes in any split gives the same result as
/// [`checksum`].
pub struct Checksum {
    digest: Digest<'static, u32>,
}

impl Checksum {
    pub fn new() -> Checksum {
        Checksum { digest: CRC32.digest() }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    pub fn finalize(self) -> u32 {
        self.digest.finalize()
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Checksum::new()
    }
}
