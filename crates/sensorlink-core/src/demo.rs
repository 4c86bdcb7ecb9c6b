//! Demo Mode - in-process stand-in for the two slave units
//!
//! Answers the master's requests with well-formed frames so the engine and a
//! front end can be exercised without hardware. The distance wanders around
//! a set point and an object passes the TCRT sensor every few reads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::io;

use crate::protocol::{
    Command, RelayState, Transport, ACTUATOR_ADDRESS, FC_RELAY, FC_TCRT, FC_ULTRASONIC,
    SENSOR_ADDRESS,
};

/// Error frame the demo slaves send for requests they cannot parse
const MALFORMED_REPLY: [u8; 3] = [0xFF, 0xE1, 0x00];

/// Simulated sensor + actuator pair behind a [`Transport`]
pub struct DemoTransport {
    /// Bytes waiting to be read by the master
    rx: VecDeque<u8>,
    /// Current simulated distance (cm)
    distance_cm: u8,
    /// Reads left until the TCRT presence flips
    presence_countdown: u32,
    presence: bool,
    relay: RelayState,
    closed: bool,
    rng: StdRng,
}

impl Default for DemoTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoTransport {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic demo for tests
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let presence_countdown = rng.gen_range(3..8);
        Self {
            rx: VecDeque::new(),
            distance_cm: 80,
            presence_countdown,
            presence: false,
            relay: RelayState::Off,
            closed: false,
            rng,
        }
    }

    /// Relay state the simulated actuator holds
    pub fn relay(&self) -> RelayState {
        self.relay
    }

    fn next_distance(&mut self) -> u8 {
        let step: i16 = self.rng.gen_range(-3..=3);
        // Drift back toward 80 cm so the value never pins at a limit
        let pull: i16 = if self.distance_cm > 120 {
            -2
        } else if self.distance_cm < 40 {
            2
        } else {
            0
        };
        self.distance_cm = (self.distance_cm as i16 + step + pull).clamp(0, 255) as u8;
        self.distance_cm
    }

    fn next_presence(&mut self) -> u8 {
        self.presence_countdown = self.presence_countdown.saturating_sub(1);
        if self.presence_countdown == 0 {
            self.presence = !self.presence;
            self.presence_countdown = self.rng.gen_range(3..8);
        }
        u8::from(self.presence)
    }

    fn reply(&mut self, request: &[u8]) -> [u8; 3] {
        match request {
            [b'U'] => [SENSOR_ADDRESS, FC_ULTRASONIC, self.next_distance()],
            [b'T'] => [SENSOR_ADDRESS, FC_TCRT, self.next_presence()],
            [b'R', state @ (0 | 1)] => {
                self.relay = RelayState::from_value(*state);
                [ACTUATOR_ADDRESS, FC_RELAY, self.relay.as_byte()]
            }
            _ => MALFORMED_REPLY,
        }
    }
}

impl Transport for DemoTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "demo link closed"));
        }
        let reply = self.reply(data);
        tracing::trace!("demo {:?} -> {:02x?}", data, reply);
        self.rx.extend(reply);
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.rx.len())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn discard_all(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.rx.clear();
    }
}

/// Commands the demo slaves understand, in the order a demo UI lists them
pub fn supported_commands() -> [Command; 4] {
    [
        Command::Ultrasonic,
        Command::Tcrt,
        Command::Relay(RelayState::On),
        Command::Relay(RelayState::Off),
    ]
}
