//! Serial Protocol Communication
//!
//! Implements the fixed-length polling protocol spoken by the sensor and
//! actuator slave units.
//!
//! Requests are a single opcode byte (`U`, `T`) or an opcode plus a state byte
//! (`R` + 0|1). Every response is exactly [`RESPONSE_LEN`] bytes: either
//! `[address][function][value]` or `[0xFF][error code][unused]`.

pub mod commands;
mod connection;
mod error;
mod executor;
pub mod frame;
pub mod serial;
mod transport;

pub use commands::{
    Command, RelayState, ACTUATOR_ADDRESS, FC_RELAY, FC_TCRT, FC_ULTRASONIC, SENSOR_ADDRESS,
};
pub use connection::{ConnectionState, Session};
pub use error::ProtocolError;
pub use executor::{ExecutorStats, RequestExecutor};
pub use frame::{format_hex, ErrorCode, ResponseFrame};
pub use serial::{list_ports, open_port, PortInfo};
pub use transport::{SerialTransport, Transport};

/// Default baud rate of the slave units
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default time to wait for a complete response in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Granularity of the response wait loop in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Delay after opening the port before the first request.
/// Opening the port toggles DTR, which resets Arduino-based slaves.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;

/// Length of every response frame
pub const RESPONSE_LEN: usize = 3;
