//! Image generation.
//!
//! Produces random, but reproducible, payloads along with the header a
//! successful upload of them would leave behind, and the byte streams a host
//! sends to perform that upload.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use anyhow::{anyhow, Result};
use boot::checksum::checksum;
use boot::header::DEFAULT_VERSION;
use boot::FirmwareHeader;
use storage::{Flash, Region};

pub struct GeneratedImage {
    pub payload: Vec<u8>,
    pub header: FirmwareHeader,
}

impl GeneratedImage {
    /// Header and payload, exactly as laid out in the partition.
    pub fn data(&self) -> Vec<u8> {
        let mut data = self.header.to_bytes().to_vec();
        data.extend_from_slice(&self.payload);
        data
    }

    /// What the host sends after the bootloader's first `OK`.
    pub fn upload(&self) -> Vec<u8> {
        let mut script = format!("SEND {}\n", self.payload.len()).into_bytes();
        script.extend_from_slice(&self.payload);
        script
    }

    /// Write the image straight into a partition, as a programmer would,
    /// without going through the update protocol.
    pub fn install<F: Flash>(&self, flash: &mut F, app: Region) -> Result<()> {
        let data = self.data();
        if !app.contains(app.base, data.len()) {
            return Err(anyhow!(
                "image of {} bytes does not fit in {:#x} bytes",
                data.len(),
                app.len
            ));
        }
        flash
            .raw_erase(app.base, app.len)
            .map_err(|e| anyhow!("erase failed: {:?}", e))?;
        flash
            .raw_write(app.base, &data)
            .map_err(|e| anyhow!("write failed: {:?}", e))?;
        Ok(())
    }
}

pub struct GenBuilder {
    /// Size of the payload, not counting the header.
    size: usize,
    /// Seed for the PRNG
    seed: usize,
    /// Version
    version: u32,
}

impl Default for GenBuilder {
    fn default() -> Self {
        GenBuilder {
            size: 7_613,
            seed: 1,
            version: DEFAULT_VERSION,
        }
    }
}

impl GenBuilder {
    pub fn size(&mut self, size: usize) -> &mut Self {
        self.size = size;
        self
    }

    pub fn seed(&mut self, seed: usize) -> &mut Self {
        self.seed = seed;
        self
    }

    pub fn version(&mut self, version: u32) -> &mut Self {
        self.version = version;
        self
    }

    pub fn build(&self) -> Result<GeneratedImage> {
        let size = u32::try_from(self.size)
            .map_err(|_| anyhow!("payload of {} bytes is too large", self.size))?;

        let mut rng = Xoshiro256Plus::seed_from_u64(self.seed as u64);
        let mut payload = vec![0u8; self.size];
        rng.fill_bytes(&mut payload);

        let header = FirmwareHeader::new(size, checksum(&payload), self.version);
        Ok(GeneratedImage { payload, header })
    }
}
