//! Protocol commands
//!
//! Defines the requests the master can send and the address/function pair
//! each one expects back.
//!
//! Function codes share one numbering space across both slaves: the relay
//! answers with 0x03 even though the actuator has no 0x01 or 0x02.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of the sensor slave (ultrasonic + TCRT5000)
pub const SENSOR_ADDRESS: u8 = 0x24;

/// Address of the actuator slave (relay)
pub const ACTUATOR_ADDRESS: u8 = 0x66;

/// Ultrasonic distance, value is centimetres
pub const FC_ULTRASONIC: u8 = 0x01;

/// TCRT5000 proximity status, 0x01 means an object is present
pub const FC_TCRT: u8 = 0x02;

/// Relay status, 0x01 means energised
pub const FC_RELAY: u8 = 0x03;

/// Relay output state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RelayState {
    On,
    #[default]
    Off,
}

impl RelayState {
    /// State byte sent after the `R` opcode
    pub fn as_byte(self) -> u8 {
        match self {
            RelayState::On => 1,
            RelayState::Off => 0,
        }
    }

    /// Interpret a relay status value: 0x01 is on, anything else is off
    pub fn from_value(value: u8) -> Self {
        if value == 0x01 {
            RelayState::On
        } else {
            RelayState::Off
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::On => write!(f, "ON"),
            RelayState::Off => write!(f, "OFF"),
        }
    }
}

/// Requests understood by the slave units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Read ultrasonic distance ('U')
    Ultrasonic,

    /// Read TCRT5000 proximity status ('T')
    Tcrt,

    /// Switch the relay ('R' + state byte)
    Relay(RelayState),
}

impl Command {
    /// Opcode byte that starts the request
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Ultrasonic => b'U',
            Command::Tcrt => b'T',
            Command::Relay(_) => b'R',
        }
    }

    /// Encode the request as it goes on the wire
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Relay(state) => vec![self.opcode(), state.as_byte()],
            _ => vec![self.opcode()],
        }
    }

    /// Address the answering slave must report
    pub fn expected_address(&self) -> u8 {
        match self {
            Command::Ultrasonic | Command::Tcrt => SENSOR_ADDRESS,
            Command::Relay(_) => ACTUATOR_ADDRESS,
        }
    }

    /// Function code the answering slave must report
    pub fn expected_function(&self) -> u8 {
        match self {
            Command::Ultrasonic => FC_ULTRASONIC,
            Command::Tcrt => FC_TCRT,
            Command::Relay(_) => FC_RELAY,
        }
    }

    /// Human name of the slave this command is addressed to
    pub fn slave_name(&self) -> &'static str {
        match self {
            Command::Ultrasonic | Command::Tcrt => "sensor",
            Command::Relay(_) => "actuator",
        }
    }

    /// Render a successfully received value for the communication log
    pub fn describe_value(&self, value: u8) -> String {
        match self {
            Command::Ultrasonic => format!("Ultrasonic: {} cm", value),
            Command::Tcrt if value == 0x01 => "TCRT: object DETECTED".to_string(),
            Command::Tcrt => "TCRT: no object".to_string(),
            Command::Relay(_) => format!("Relay: {}", RelayState::from_value(value)),
        }
    }
}
