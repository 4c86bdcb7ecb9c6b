//! Transport abstraction
//!
//! The executor only needs a handful of byte-level operations from the link,
//! so any serial port, demo slave or test double can stand in for it.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::serial::{configure_port, open_port};
use super::ProtocolError;

/// Byte-level access to an open link
pub trait Transport: Send {
    /// Write request bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes. May return short.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of bytes waiting in the receive buffer, never blocks
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Drop everything in the receive buffer
    fn discard_input(&mut self) -> io::Result<()>;

    /// Drop everything in both receive and transmit buffers
    fn discard_all(&mut self) -> io::Result<()>;

    /// Release the link. Calling it twice is harmless.
    fn close(&mut self);
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "port is closed")
}

/// Serial port implementing [`Transport`]
pub struct SerialTransport {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open and configure a serial port (8N1, no flow control)
    pub fn open(name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ProtocolError> {
        let mut port = open_port(name, baud_rate, timeout)?;
        configure_port(port.as_mut())?;
        Ok(Self::new(name, port))
    }

    /// Wrap an already opened port
    pub fn new(name: &str, port: Box<dyn SerialPort>) -> Self {
        Self {
            name: name.to_string(),
            port: Some(port),
        }
    }

    /// Port name this transport was opened on
    pub fn name(&self) -> &str {
        &self.name
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or_else(closed)
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let port = self.port()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port()?.read(buf)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        self.port()?
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::other)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port()?
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }

    fn discard_all(&mut self) -> io::Result<()> {
        self.port()?
            .clear(serialport::ClearBuffer::All)
            .map_err(io::Error::other)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!("closed serial port {}", self.name);
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}
