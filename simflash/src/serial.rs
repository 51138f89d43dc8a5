//! Scripted serial port.
//!
//! Plays the part of the host: bytes queued with [`SimSerial::send`] are
//! handed to the bootloader one at a time, and everything the bootloader
//! writes is captured.  Once the script runs out the line reads as closed,
//! which is how tests stop an otherwise endless recovery loop.

use std::collections::VecDeque;

use boot::{Serial, SerialError};

#[derive(Debug, Default)]
pub struct SimSerial {
    input: VecDeque<u8>,
    output: Vec<u8>,
    read: usize,
}

impl SimSerial {
    pub fn new() -> SimSerial {
        SimSerial::default()
    }

    /// A port with the host's side of the conversation already queued.
    pub fn with_input(bytes: &[u8]) -> SimSerial {
        let mut port = SimSerial::new();
        port.send(bytes);
        port
    }

    pub fn send(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Bytes queued but not yet consumed.
    pub fn pending(&self) -> usize {
        self.input.len()
    }

    /// Bytes the bootloader has consumed.
    pub fn consumed(&self) -> usize {
        self.read
    }

    /// Everything written so far, as text.
    pub fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Serial for SimSerial {
    fn read_byte(&mut self) -> Result<u8, SerialError> {
        let byte = self.input.pop_front().ok_or(SerialError::Closed)?;
        self.read += 1;
        Ok(byte)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), SerialError> {
        self.output.push(byte);
        Ok(())
    }
}
