//! Response frames
//!
//! Decodes the fixed 3-byte responses returned by the slaves.

use super::{ProtocolError, RESPONSE_LEN};

/// First byte of an error frame
pub const ERROR_MARKER: u8 = 0xFF;

/// Error code reported by a slave in an error frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// 0xE1
    CrcMismatch,
    /// 0xE2
    SlaveTimeout,
    /// Any other code byte, kept as received
    Unknown(u8),
}

impl From<u8> for ErrorCode {
    fn from(code: u8) -> Self {
        match code {
            0xE1 => ErrorCode::CrcMismatch,
            0xE2 => ErrorCode::SlaveTimeout,
            other => ErrorCode::Unknown(other),
        }
    }
}

impl ErrorCode {
    /// Raw code byte
    pub fn code(&self) -> u8 {
        match self {
            ErrorCode::CrcMismatch => 0xE1,
            ErrorCode::SlaveTimeout => 0xE2,
            ErrorCode::Unknown(code) => *code,
        }
    }

    pub fn into_error(self) -> ProtocolError {
        match self {
            ErrorCode::CrcMismatch => ProtocolError::CrcMismatch,
            ErrorCode::SlaveTimeout => ProtocolError::SlaveTimeout,
            ErrorCode::Unknown(code) => ProtocolError::SlaveError(code),
        }
    }
}

/// A decoded response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFrame {
    /// `[address][function][value]`
    Data { address: u8, function: u8, value: u8 },
    /// `[0xFF][code][unused]`
    Error { code: ErrorCode },
}

impl ResponseFrame {
    /// Decode a complete response. The padding byte of an error frame is ignored.
    pub fn decode(bytes: [u8; RESPONSE_LEN]) -> Self {
        let [first, second, third] = bytes;
        if first == ERROR_MARKER {
            ResponseFrame::Error {
                code: ErrorCode::from(second),
            }
        } else {
            ResponseFrame::Data {
                address: first,
                function: second,
                value: third,
            }
        }
    }

    /// Decode from a slice, `None` unless it holds exactly one frame
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let frame: [u8; RESPONSE_LEN] = bytes.try_into().ok()?;
        Some(Self::decode(frame))
    }
}

/// Format bytes the way the communication log shows them: `[0x24][0x01][0x2A]`
pub fn format_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("[0x{:02X}]", b)).collect()
}
