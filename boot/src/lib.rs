//! This is a basic serial update bootloader built for embedded rust.
//!
//! On reset it offers the operator a choice between updating and booting.
//! Booting validates the single application image in flash and hands over to
//! it.  Updating receives a replacement image over the serial line, writes it
//! to the application partition and commits its header last, so that an
//! interrupted update can never look like a valid image.  With no valid
//! image present the bootloader stays in a recovery loop that only accepts
//! updates.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

// Diagnostics go to defmt or the log facade, whichever is enabled, and vanish
// otherwise.  These never carry the wire protocol.
macro_rules! log_event {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::$level!($fmt $(, $arg)*);
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        log::$level!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        {
            $( let _ = &$arg; )*
        }
    }};
}

macro_rules! info {
    ($($t:tt)*) => { log_event!(info, $($t)*) };
}

macro_rules! warn {
    ($($t:tt)*) => { log_event!(warn, $($t)*) };
}

macro_rules! error {
    ($($t:tt)*) => { log_event!(error, $($t)*) };
}

pub mod checksum;
pub mod config;
pub mod controller;
pub mod header;
pub mod image;
pub mod partition;
pub mod platform;
pub mod serial;
pub mod update;

use core::fmt;

pub use config::{AfterUpdate, Config};
pub use controller::{Bootloader, Exit, State};
pub use header::{FirmwareHeader, BOOT_MAGIC, HEADER_SIZE};
pub use image::{validate, Image, ValidationError};
pub use partition::{AppPartition, StorageError};
pub use platform::Platform;
pub use serial::{Console, Serial, SerialError};
pub use update::{ProtocolError, UpdateSession};

pub type Result<T> = core::result::Result<T, Error>;

// Use the error kind to avoid this depending on the particular flash.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A raw read from flash failed.
    Flash(storage::Error),
    /// The serial line failed, or was closed.
    Serial(SerialError),
    Protocol(ProtocolError),
    Storage(StorageError),
    /// The application partition does not hold a bootable image.
    Invalid(ValidationError),
}

/// Convert the flash error into our error type.
impl From<storage::Error> for Error {
    fn from(e: storage::Error) -> Self {
        Error::Flash(e)
    }
}

impl From<SerialError> for Error {
    fn from(e: SerialError) -> Self {
        Error::Serial(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Invalid(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Flash(e) => write!(f, "flash read failed: {:?}", e),
            Error::Serial(e) => write!(f, "serial failure: {:?}", e),
            Error::Protocol(e) => write!(f, "protocol error: {:?}", e),
            Error::Storage(e) => write!(f, "storage error: {:?}", e),
            Error::Invalid(e) => f.write_str(e.message()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
