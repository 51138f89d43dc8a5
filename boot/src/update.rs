//! Serial update protocol.
//!
//! One session, as seen on the wire:
//!
//! ```text
//! bootloader: OK
//! host:       SEND <decimal size><CR or LF>
//! bootloader: ERASING...
//! bootloader: READY
//! host:       <size raw bytes>
//! bootloader: CRC?
//! bootloader: OK
//! bootloader: REBOOT
//! ```
//!
//! Any failure ends the session with a single `ERR: <what>` line.  Failures
//! before the erase leave flash untouched.  Later failures leave the
//! partition without a header, which the next validation reports as an
//! invalid image.

use storage::Flash;

use crate::header::FirmwareHeader;
use crate::partition::{AppPartition, StorageError};
use crate::serial::{Console, Serial};
use crate::{Error, Result};

/// The only command the protocol knows.
pub const COMMAND: &[u8] = b"SEND ";

/// Received bytes are collected into pieces of this size before they are
/// written to flash.
pub const CHUNK_SIZE: usize = 256;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    CommandMismatch,
    SizeOutOfRange,
}

/// A single update, from announcing readiness to committing the header.
pub struct UpdateSession<'a, F, S> {
    partition: &'a mut AppPartition<F>,
    console: &'a mut Console<S>,
    version: u32,
}

impl<'a, F: Flash, S: Serial> UpdateSession<'a, F, S> {
    pub fn new(
        partition: &'a mut AppPartition<F>,
        console: &'a mut Console<S>,
        version: u32,
    ) -> Self {
        UpdateSession { partition, console, version }
    }

    /// Run the session to completion.  On success, the returned header has
    /// been committed to flash.
    pub fn run(mut self) -> Result<FirmwareHeader> {
        self.console.puts("OK\n")?;

        self.expect_command()?;
        let size = self.read_size()?;

        if size == 0 || size as usize > self.partition.max_payload() {
            warn!("rejecting image size {}", size);
            return self.fail("ERR: SIZE\n", ProtocolError::SizeOutOfRange);
        }
        info!("receiving {} byte image", size);

        self.console.puts("ERASING...\n")?;
        if let Err(e) = self.partition.erase() {
            return self.fail("ERR: ERASE\n", e);
        }

        self.console.puts("READY\n")?;
        self.receive(size as usize)?;

        let header = match self.partition.payload_checksum(size as usize) {
            Ok(crc) => FirmwareHeader::new(size, crc, self.version),
            Err(e) => {
                error!("unable to read back payload: {:?}", e);
                return self.fail("ERR: HEADER\n", StorageError::HeaderCommitFailed);
            }
        };
        if let Err(e) = self.partition.commit(&header) {
            return self.fail("ERR: HEADER\n", e);
        }
        info!("committed image, crc {:#x}", header.checksum);

        self.console.puts("CRC?\n")?;
        self.console.puts("OK\n")?;
        self.console.puts("REBOOT\n")?;
        Ok(header)
    }

    /// Match the command literal, stopping at the first wrong byte.
    fn expect_command(&mut self) -> Result<()> {
        for &expect in COMMAND {
            if self.console.getc()? != expect {
                warn!("unknown command");
                return self.fail("ERR: CMD\n", ProtocolError::CommandMismatch);
            }
        }
        Ok(())
    }

    /// Read a decimal size up to the end of the line.  Stray characters are
    /// skipped.  Overlong numbers saturate rather than wrap modulo 2^32, so
    /// they are rejected as too large instead of aliasing a small size.
    fn read_size(&mut self) -> Result<u32> {
        let mut size: u32 = 0;
        loop {
            match self.console.getc()? {
                b'\r' | b'\n' => return Ok(size),
                c @ b'0'..=b'9' => {
                    size = size.saturating_mul(10).saturating_add(u32::from(c - b'0'));
                }
                _ => (),
            }
        }
    }

    /// Stream `size` bytes from the line into the payload area.
    fn receive(&mut self, size: usize) -> Result<()> {
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut addr = self.partition.entry();
        let mut remaining = size;
        while remaining > 0 {
            let chunk = &mut buffer[..remaining.min(CHUNK_SIZE)];
            for byte in chunk.iter_mut() {
                *byte = self.console.getc()?;
            }
            let todo = chunk.len();
            if let Err(e) = self.partition.write(addr, chunk) {
                // The size check above should make this impossible.
                debug_assert!(e != StorageError::WriteOutOfBounds, "payload outside partition");
                return self.fail("ERR: WRITE\n", e);
            }
            addr += todo;
            remaining -= todo;
        }
        Ok(())
    }

    fn fail<T, E: Into<Error>>(&mut self, line: &str, err: E) -> Result<T> {
        self.console.puts(line)?;
        Err(err.into())
    }
}
