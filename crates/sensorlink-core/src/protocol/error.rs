//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the slave units
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Timeout: no response from slave")]
    Timeout,

    #[error("Slave reported CRC mismatch")]
    CrcMismatch,

    #[error("Slave reported timeout")]
    SlaveTimeout,

    #[error("Slave returned unknown error code 0x{0:02X}")]
    SlaveError(u8),

    #[error("Invalid response: [0x{address:02X}][0x{function:02X}][0x{value:02X}]")]
    ProtocolMismatch { address: u8, function: u8, value: u8 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Soft failures are logged as warnings and never escalated
    pub fn is_soft(&self) -> bool {
        matches!(self, ProtocolError::ProtocolMismatch { .. })
    }

    /// The transport can no longer be trusted and the session should be closed
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, ProtocolError::Io(_))
    }
}
