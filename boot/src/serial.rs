//! Serial console.
//!
//! The update protocol runs over a plain byte stream.  Every read blocks
//! until a byte arrives; there is deliberately no timeout, since at boot time
//! there is nothing else the device could be doing while it waits.

use core::fmt;

/// Failures a serial driver may report.  A bare UART polled in a loop will
/// never return these, but a simulated or host side port can.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// No more data will ever arrive.
    Closed,
}

/// A blocking byte-at-a-time serial port.
pub trait Serial {
    fn read_byte(&mut self) -> Result<u8, SerialError>;
    fn write_byte(&mut self, byte: u8) -> Result<(), SerialError>;
}

impl<S: Serial + ?Sized> Serial for &mut S {
    fn read_byte(&mut self) -> Result<u8, SerialError> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), SerialError> {
        (**self).write_byte(byte)
    }
}

/// Terminal-friendly text output on top of a [`Serial`].
pub struct Console<S> {
    port: S,
    crlf: bool,
}

impl<S: Serial> Console<S> {
    pub fn new(port: S, crlf: bool) -> Console<S> {
        Console { port, crlf }
    }

    pub fn getc(&mut self) -> Result<u8, SerialError> {
        self.port.read_byte()
    }

    /// Send one character, expanding `\n` to `\r\n` if configured.
    pub fn putc(&mut self, c: u8) -> Result<(), SerialError> {
        if self.crlf && c == b'\n' {
            self.port.write_byte(b'\r')?;
        }
        self.port.write_byte(c)
    }

    pub fn puts(&mut self, s: &str) -> Result<(), SerialError> {
        s.bytes().try_for_each(|c| self.putc(c))
    }

    pub fn port(&self) -> &S {
        &self.port
    }

    pub fn into_inner(self) -> S {
        self.port
    }
}

impl<S: Serial> fmt::Write for Console<S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s).map_err(|_| fmt::Error)
    }
}
